//! Helpers and utilities for using x11rb as a back end for xforms
use ::x11rb::rust_connection::RustConnection;

pub mod atom;
pub(crate) mod event;
pub mod xconn;

#[doc(inline)]
pub use xconn::X11rbPlatform;

/// Result type for fallible methods using x11rb
pub type Result<T> = std::result::Result<T, X11rbError>;

impl X11rbPlatform<RustConnection> {
    /// Connect to the X server named by `$DISPLAY` using the pure Rust x11rb connection.
    pub fn new() -> crate::Result<Self> {
        let (conn, screen) = RustConnection::connect(None).map_err(X11rbError::from)?;

        Ok(Self::new_for_connection(conn, screen)?)
    }
}

/// Enum to store the various ways that operations can fail inside of the
/// x11rb implementation of [Platform][crate::x::Platform].
#[derive(thiserror::Error, Debug)]
pub enum X11rbError {
    /// Unable to establish a connection to the X server
    #[error(transparent)]
    Connect(#[from] ::x11rb::errors::ConnectError),

    /// The X11 connection broke
    #[error(transparent)]
    Connection(#[from] ::x11rb::errors::ConnectionError),

    /// Could not get X11 request reply
    #[error(transparent)]
    Reply(#[from] ::x11rb::errors::ReplyError),

    /// Could not get X11 request reply or could not generate_id()
    #[error(transparent)]
    ReplyOrId(#[from] ::x11rb::errors::ReplyOrIdError),

    /// The X server reported an error for an earlier request
    #[error("X11 error: {0:?}")]
    X11Error(::x11rb::x11_utils::X11Error),

    /// The requested screen does not exist
    #[error("screen {0} does not exist")]
    UnknownScreen(usize),
}
