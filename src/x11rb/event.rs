//! Conversions to xforms events from x11rb events
use crate::{
    core::keys::ModMask,
    pure::geometry::{Point, Rect},
    x::{KeyEvent, MouseButton, PointerEvent, XEvent},
    x11rb::{atom::Atom, xconn::X11rbPlatform, Result, X11rbError},
    Xid,
};
use tracing::{trace, warn};
use x11rb::{
    connection::Connection,
    protocol::{xproto::ClientMessageEvent, Event},
};

fn mods(state: impl Into<u16>) -> ModMask {
    ModMask::from_bits_truncate(state.into())
}

fn button(detail: u8) -> Option<MouseButton> {
    match MouseButton::try_from(detail) {
        Ok(b) => Some(b),
        Err(_) => {
            warn!(button = detail, "dropping unknown mouse button event");
            None
        }
    }
}

pub(crate) fn convert_event<C: Connection>(
    conn: &X11rbPlatform<C>,
    event: Event,
) -> Result<Option<XEvent>> {
    let e = match event {
        Event::ButtonPress(e) => button(e.detail).map(|b| {
            XEvent::ButtonPress(PointerEvent {
                id: Xid(e.event),
                pos: Point::new(e.event_x as i32, e.event_y as i32),
                button: Some(b),
                state: mods(e.state),
                time: e.time,
            })
        }),

        Event::ButtonRelease(e) => button(e.detail).map(|b| {
            XEvent::ButtonRelease(PointerEvent {
                id: Xid(e.event),
                pos: Point::new(e.event_x as i32, e.event_y as i32),
                button: Some(b),
                state: mods(e.state),
                time: e.time,
            })
        }),

        Event::MotionNotify(e) => Some(XEvent::Motion(PointerEvent {
            id: Xid(e.event),
            pos: Point::new(e.event_x as i32, e.event_y as i32),
            button: None,
            state: mods(e.state),
            time: e.time,
        })),

        Event::EnterNotify(e) => Some(XEvent::Enter(PointerEvent {
            id: Xid(e.event),
            pos: Point::new(e.event_x as i32, e.event_y as i32),
            button: None,
            state: mods(e.state),
            time: e.time,
        })),

        Event::LeaveNotify(e) => Some(XEvent::Leave(PointerEvent {
            id: Xid(e.event),
            pos: Point::new(e.event_x as i32, e.event_y as i32),
            button: None,
            state: mods(e.state),
            time: e.time,
        })),

        Event::KeyPress(e) => {
            let state = mods(e.state);
            Some(XEvent::KeyPress(KeyEvent {
                id: Xid(e.event),
                sym: conn.keymap().keysym(e.detail, state.contains(ModMask::SHIFT)),
                pos: Point::new(e.event_x as i32, e.event_y as i32),
                state,
                time: e.time,
            }))
        }

        Event::KeyRelease(e) => {
            let state = mods(e.state);
            Some(XEvent::KeyRelease(KeyEvent {
                id: Xid(e.event),
                sym: conn.keymap().keysym(e.detail, state.contains(ModMask::SHIFT)),
                pos: Point::new(e.event_x as i32, e.event_y as i32),
                state,
                time: e.time,
            }))
        }

        Event::Expose(e) => Some(XEvent::Expose {
            id: Xid(e.window),
            r: Rect::new(e.x as i32, e.y as i32, e.width as i32, e.height as i32),
            count: e.count as u32,
        }),

        Event::ConfigureNotify(e) => Some(XEvent::Configure {
            id: Xid(e.window),
            r: Rect::new(e.x as i32, e.y as i32, e.width as i32, e.height as i32),
        }),

        Event::FocusIn(e) => Some(XEvent::FocusIn(Xid(e.event))),
        Event::FocusOut(e) => Some(XEvent::FocusOut(Xid(e.event))),
        Event::MapNotify(e) => Some(XEvent::Map(Xid(e.window))),
        Event::UnmapNotify(e) => Some(XEvent::Unmap(Xid(e.window))),
        Event::DestroyNotify(e) => Some(XEvent::Destroy(Xid(e.window))),
        Event::ClientMessage(e) => to_client_message(conn, e),
        Event::Error(err) => return Err(X11rbError::X11Error(err)),

        // NOTE: Ignoring other event types
        _ => {
            trace!(?event, "ignoring unhandled X event");
            None
        }
    };

    Ok(e)
}

fn to_client_message<C: Connection>(
    conn: &X11rbPlatform<C>,
    event: ClientMessageEvent,
) -> Option<XEvent> {
    let protocols = conn.known_atom(Atom::WmProtocols);
    let delete = conn.known_atom(Atom::WmDeleteWindow);

    if event.format == 32 && event.type_ == protocols && event.data.as_data32()[0] == delete {
        Some(XEvent::WmClose(Xid(event.window)))
    } else {
        trace!(window = event.window, type_ = event.type_, "ignoring client message");
        None
    }
}
