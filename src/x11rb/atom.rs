//! The X atoms used when talking to the window manager
use crate::x11rb::Result;
use std::collections::HashMap;
use strum::{AsRefStr, EnumIter, IntoEnumIterator};
use x11rb::{connection::Connection, protocol::xproto::ConnectionExt};

/// Atoms interned when the connection is established.
#[derive(AsRefStr, EnumIter, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Atom {
    /// WM_PROTOCOLS
    #[strum(serialize = "WM_PROTOCOLS")]
    WmProtocols,
    /// WM_DELETE_WINDOW
    #[strum(serialize = "WM_DELETE_WINDOW")]
    WmDeleteWindow,
    /// _NET_WM_NAME
    #[strum(serialize = "_NET_WM_NAME")]
    NetWmName,
    /// UTF8_STRING
    #[strum(serialize = "UTF8_STRING")]
    Utf8String,
}

#[derive(Debug)]
pub(crate) struct Atoms {
    atoms: HashMap<Atom, u32>,
}

impl Atoms {
    pub(crate) fn new(conn: &impl Connection) -> Result<Self> {
        // First send all requests...
        let atom_requests = Atom::iter()
            .map(|atom| Ok((atom, conn.intern_atom(false, atom.as_ref().as_bytes())?)))
            .collect::<Result<Vec<_>>>()?;
        // ..then get all the replies
        let atoms = atom_requests
            .into_iter()
            .map(|(atom, cookie)| Ok((atom, cookie.reply()?.atom)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self { atoms })
    }

    pub(crate) fn known_atom(&self, atom: Atom) -> u32 {
        // Every variant is interned in `new`
        self.atoms.get(&atom).copied().unwrap_or(x11rb::NONE)
    }
}
