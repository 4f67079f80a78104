//! The window system façade used by the dispatcher
use crate::{
    core::keys::ModMask,
    pure::geometry::{Point, Rect},
    Result, Xid,
};
use std::os::unix::io::RawFd;

pub mod event;
pub mod mock;

pub use event::{EventMask, KeyEvent, MouseButton, PointerEvent, XEvent};

/// The current pointer position and button / modifier state as reported by the window system.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PointerState {
    /// Position relative to the window that was queried
    pub pos: Point,
    /// Held buttons and modifiers
    pub state: ModMask,
}

/// A handle on a running window system connection that the dispatcher can use for retrieving
/// events and managing the windows backing its forms.
///
/// Platform is intended as an abstraction layer so that the dispatcher never speaks to the X
/// server directly: the [x11rb][crate::x11rb] module provides a real implementation and
/// [mock] a scriptable one for tests.
pub trait Platform {
    /// A file descriptor that becomes readable when new events are available (if any).
    fn connection_fd(&self) -> Option<RawFd>;
    /// Return the next queued event if there is one, without blocking.
    fn poll_event(&self) -> Result<Option<XEvent>>;
    /// Ask the window system for the current pointer state relative to the given window.
    fn query_pointer(&self, id: Xid) -> Result<PointerState>;
    /// Create a new (unmapped) top level window with the given geometry and title.
    fn create_window(&self, r: Rect, title: &str) -> Result<Xid>;
    /// Destroy a window previously created with `create_window`.
    fn destroy_window(&self, id: Xid) -> Result<()>;
    /// Map the given window, making it visible.
    fn map(&self, id: Xid) -> Result<()>;
    /// Unmap the given window, hiding it.
    fn unmap(&self, id: Xid) -> Result<()>;
    /// Move and resize the given window.
    fn configure(&self, id: Xid, r: Rect) -> Result<()>;
    /// Set the title of the given window.
    fn set_title(&self, id: Xid, title: &str) -> Result<()>;
    /// Enable or disable keyboard auto-repeat.
    fn set_auto_repeat(&self, on: bool) -> Result<()>;
    /// Flush any pending requests to the window system.
    fn flush(&self);
}
