//! An implementation of [Platform] backed by an x11rb [Connection]
use crate::{
    core::keys::{KeySym, ModMask},
    pure::geometry::{Point, Rect},
    x::{Platform, PointerState, XEvent},
    x11rb::{
        atom::{Atom, Atoms},
        event::convert_event,
        Result as X11Result, X11rbError,
    },
    Result, Xid,
};
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::{debug, warn};
use x11rb::{
    connection::Connection,
    protocol::xproto::{
        AtomEnum, AutoRepeatMode, ChangeKeyboardControlAux, ConfigureWindowAux, ConnectionExt as _,
        CreateWindowAux, EventMask, PropMode, Window, WindowClass,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    COPY_DEPTH_FROM_PARENT,
};

/// The keyboard mapping in use when the connection was established.
#[derive(Debug, Default)]
pub(crate) struct Keymap {
    min_keycode: u8,
    per_keycode: u8,
    keysyms: Vec<KeySym>,
}

impl Keymap {
    /// The keysym for a keycode, using the shifted column when Shift is held and there is one.
    pub(crate) fn keysym(&self, code: u8, shifted: bool) -> KeySym {
        if code < self.min_keycode || self.per_keycode == 0 {
            return 0;
        }

        let base = (code - self.min_keycode) as usize * self.per_keycode as usize;
        let plain = self.keysyms.get(base).copied().unwrap_or(0);
        let upper = self.keysyms.get(base + 1).copied().unwrap_or(0);

        match (shifted, upper) {
            (true, 0) => match char::from_u32(plain) {
                Some(c) if c.is_ascii_lowercase() => c.to_ascii_uppercase() as KeySym,
                _ => plain,
            },
            (true, upper) => upper,
            (false, _) => plain,
        }
    }
}

/// A [Platform] talking to a running X server through x11rb.
#[derive(Debug)]
pub struct X11rbPlatform<C: Connection> {
    conn: C,
    root: Window,
    root_visual: u32,
    background: u32,
    atoms: Atoms,
    keymap: Keymap,
}

impl<C: Connection> X11rbPlatform<C> {
    /// Wrap an existing connection, using the given screen for new windows.
    pub fn new_for_connection(conn: C, screen: usize) -> X11Result<Self> {
        let (root, root_visual, background) = match conn.setup().roots.get(screen) {
            Some(s) => (s.root, s.root_visual, s.white_pixel),
            None => return Err(X11rbError::UnknownScreen(screen)),
        };

        let atoms = Atoms::new(&conn)?;
        let keymap = Self::fetch_keymap(&conn)?;
        debug!(root, screen, "connected to X server");

        Ok(Self {
            conn,
            root,
            root_visual,
            background,
            atoms,
            keymap,
        })
    }

    fn fetch_keymap(conn: &C) -> X11Result<Keymap> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn.get_keyboard_mapping(min, max - min + 1)?.reply()?;

        Ok(Keymap {
            min_keycode: min,
            per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    /// A reference to the underlying x11rb [Connection].
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// The root window of the screen new forms are created on.
    pub fn root(&self) -> Xid {
        Xid(self.root)
    }

    pub(crate) fn known_atom(&self, atom: Atom) -> u32 {
        self.atoms.known_atom(atom)
    }

    pub(crate) fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    fn next_event(&self) -> X11Result<Option<XEvent>> {
        while let Some(event) = self.conn.poll_for_event()? {
            if let Some(e) = convert_event(self, event)? {
                return Ok(Some(e));
            }
        }

        Ok(None)
    }

    fn new_window(&self, r: Rect, title: &str) -> X11Result<Xid> {
        let id = self.conn.generate_id()?;
        let mask = EventMask::EXPOSURE
            | EventMask::KEY_PRESS
            | EventMask::KEY_RELEASE
            | EventMask::BUTTON_PRESS
            | EventMask::BUTTON_RELEASE
            | EventMask::POINTER_MOTION
            | EventMask::ENTER_WINDOW
            | EventMask::LEAVE_WINDOW
            | EventMask::STRUCTURE_NOTIFY
            | EventMask::FOCUS_CHANGE;
        let aux = CreateWindowAux::new()
            .event_mask(mask)
            .background_pixel(self.background);

        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            id,
            self.root,
            r.x as i16,
            r.y as i16,
            r.w.max(1) as u16,
            r.h.max(1) as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            self.root_visual,
            &aux,
        )?;

        let protocols = self.known_atom(Atom::WmProtocols);
        let delete = self.known_atom(Atom::WmDeleteWindow);
        self.conn
            .change_property32(PropMode::REPLACE, id, protocols, AtomEnum::ATOM, &[delete])?;
        self.write_title(id, title)?;

        Ok(Xid(id))
    }

    fn write_title(&self, id: Window, title: &str) -> X11Result<()> {
        let net_name = self.known_atom(Atom::NetWmName);
        let utf8 = self.known_atom(Atom::Utf8String);

        self.conn.change_property8(
            PropMode::REPLACE,
            id,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            title.as_bytes(),
        )?;
        self.conn
            .change_property8(PropMode::REPLACE, id, net_name, utf8, title.as_bytes())?;

        Ok(())
    }

    fn pointer(&self, id: Xid) -> X11Result<PointerState> {
        let reply = self.conn.query_pointer(*id)?.reply()?;

        Ok(PointerState {
            pos: Point::new(reply.win_x as i32, reply.win_y as i32),
            state: ModMask::from_bits_truncate(u16::from(reply.mask)),
        })
    }

    fn auto_repeat(&self, on: bool) -> X11Result<()> {
        let mode = if on {
            AutoRepeatMode::ON
        } else {
            AutoRepeatMode::OFF
        };
        let aux = ChangeKeyboardControlAux::new().auto_repeat_mode(mode);
        self.conn.change_keyboard_control(&aux)?;

        Ok(())
    }
}

impl Platform for X11rbPlatform<RustConnection> {
    fn connection_fd(&self) -> Option<RawFd> {
        Some(self.conn.stream().as_raw_fd())
    }

    fn poll_event(&self) -> Result<Option<XEvent>> {
        Ok(self.next_event()?)
    }

    fn query_pointer(&self, id: Xid) -> Result<PointerState> {
        Ok(self.pointer(id)?)
    }

    fn create_window(&self, r: Rect, title: &str) -> Result<Xid> {
        Ok(self.new_window(r, title)?)
    }

    fn destroy_window(&self, id: Xid) -> Result<()> {
        self.conn.destroy_window(*id).map_err(X11rbError::from)?;

        Ok(())
    }

    fn map(&self, id: Xid) -> Result<()> {
        self.conn.map_window(*id).map_err(X11rbError::from)?;

        Ok(())
    }

    fn unmap(&self, id: Xid) -> Result<()> {
        self.conn.unmap_window(*id).map_err(X11rbError::from)?;

        Ok(())
    }

    fn configure(&self, id: Xid, r: Rect) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(r.x)
            .y(r.y)
            .width(r.w.max(1) as u32)
            .height(r.h.max(1) as u32);
        self.conn
            .configure_window(*id, &aux)
            .map_err(X11rbError::from)?;

        Ok(())
    }

    fn set_title(&self, id: Xid, title: &str) -> Result<()> {
        Ok(self.write_title(*id, title)?)
    }

    fn set_auto_repeat(&self, on: bool) -> Result<()> {
        Ok(self.auto_repeat(on)?)
    }

    fn flush(&self) {
        if let Err(error) = self.conn.flush() {
            warn!(%error, "unable to flush X connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn keymap() -> Keymap {
        // keycode 10: a / A, keycode 11: 1 / !, keycode 12: b with no shifted column
        Keymap {
            min_keycode: 10,
            per_keycode: 2,
            keysyms: vec!['a' as u32, 'A' as u32, '1' as u32, '!' as u32, 'b' as u32, 0],
        }
    }

    #[test_case(10, false, 'a' as u32; "plain")]
    #[test_case(10, true, 'A' as u32; "shifted")]
    #[test_case(11, true, '!' as u32; "shifted symbol")]
    #[test_case(12, true, 'B' as u32; "shifted without column")]
    #[test_case(9, false, 0; "below minimum")]
    #[test_case(200, false, 0; "beyond mapping")]
    #[test]
    fn keysym_lookup(code: u8, shifted: bool, expected: KeySym) {
        assert_eq!(keymap().keysym(code, shifted), expected);
    }

    #[test]
    fn the_rust_connection_backend_can_drive_a_dispatcher() {
        fn assert_platform<P: Platform>() {}

        assert_platform::<X11rbPlatform<RustConnection>>();
    }
}
