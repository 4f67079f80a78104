//! Platform level events as delivered by the window system
use crate::{
    core::keys::{KeySym, ModMask},
    pure::geometry::{Point, Rect},
    Error, Result, Xid,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Known mouse buttons
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MouseButton {
    /// 1
    Left,
    /// 2
    Middle,
    /// 3
    Right,
    /// 4
    ScrollUp,
    /// 5
    ScrollDown,
}

impl From<MouseButton> for u8 {
    fn from(b: MouseButton) -> u8 {
        match b {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
            MouseButton::ScrollUp => 4,
            MouseButton::ScrollDown => 5,
        }
    }
}

impl TryFrom<u8> for MouseButton {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Self::Left),
            2 => Ok(Self::Middle),
            3 => Ok(Self::Right),
            4 => Ok(Self::ScrollUp),
            5 => Ok(Self::ScrollDown),
            _ => Err(Error::Platform(format!("unknown mouse button {n}"))),
        }
    }
}

impl MouseButton {
    /// The state mask bit set while this button is held.
    pub fn mask(&self) -> ModMask {
        match self {
            Self::Left => ModMask::BUTTON1,
            Self::Middle => ModMask::BUTTON2,
            Self::Right => ModMask::BUTTON3,
            Self::ScrollUp => ModMask::BUTTON4,
            Self::ScrollDown => ModMask::BUTTON5,
        }
    }
}

/// A pointer related event: button press / release, motion or window crossing.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    /// The window the event was reported for
    pub id: Xid,
    /// Position relative to the top left of the window
    pub pos: Point,
    /// Button pressed or released (None for motion and crossing events)
    pub button: Option<MouseButton>,
    /// Modifier and button state at the time of the event
    pub state: ModMask,
    /// Server timestamp in milliseconds
    pub time: u32,
}

/// A key press or release.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The window the event was reported for
    pub id: Xid,
    /// The keysym after applying the current keyboard mapping
    pub sym: KeySym,
    /// Pointer position relative to the top left of the window
    pub pos: Point,
    /// Modifier and button state at the time of the event
    pub state: ModMask,
    /// Server timestamp in milliseconds
    pub time: u32,
}

/// The subset of window system events that the dispatcher understands.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XEvent {
    /// A mouse button was pressed
    ButtonPress(PointerEvent),
    /// A mouse button was released
    ButtonRelease(PointerEvent),
    /// The pointer moved
    Motion(PointerEvent),
    /// The pointer entered a window
    Enter(PointerEvent),
    /// The pointer left a window
    Leave(PointerEvent),
    /// A key was pressed
    KeyPress(KeyEvent),
    /// A key was released
    KeyRelease(KeyEvent),
    /// Part of a window needs redrawing
    Expose {
        /// The window
        id: Xid,
        /// The damaged region
        r: Rect,
        /// The number of expose events still to follow for this window
        count: u32,
    },
    /// A window changed size or position
    Configure {
        /// The window
        id: Xid,
        /// The new geometry
        r: Rect,
    },
    /// A window gained keyboard focus
    FocusIn(Xid),
    /// A window lost keyboard focus
    FocusOut(Xid),
    /// A window was mapped
    Map(Xid),
    /// A window was unmapped
    Unmap(Xid),
    /// A window was destroyed
    Destroy(Xid),
    /// The window manager asked for a window to be closed
    WmClose(Xid),
}

impl XEvent {
    /// The window this event was reported for.
    pub fn id(&self) -> Xid {
        match self {
            Self::ButtonPress(e)
            | Self::ButtonRelease(e)
            | Self::Motion(e)
            | Self::Enter(e)
            | Self::Leave(e) => e.id,
            Self::KeyPress(e) | Self::KeyRelease(e) => e.id,
            Self::Expose { id, .. } | Self::Configure { id, .. } => *id,
            Self::FocusIn(id)
            | Self::FocusOut(id)
            | Self::Map(id)
            | Self::Unmap(id)
            | Self::Destroy(id)
            | Self::WmClose(id) => *id,
        }
    }

    /// The class bit for this event, used to match against an [EventMask].
    pub fn class(&self) -> EventMask {
        match self {
            Self::ButtonPress(_) => EventMask::BUTTON_PRESS,
            Self::ButtonRelease(_) => EventMask::BUTTON_RELEASE,
            Self::Motion(_) => EventMask::POINTER_MOTION,
            Self::Enter(_) => EventMask::ENTER_WINDOW,
            Self::Leave(_) => EventMask::LEAVE_WINDOW,
            Self::KeyPress(_) => EventMask::KEY_PRESS,
            Self::KeyRelease(_) => EventMask::KEY_RELEASE,
            Self::Expose { .. } => EventMask::EXPOSURE,
            Self::FocusIn(_) | Self::FocusOut(_) => EventMask::FOCUS_CHANGE,
            Self::Configure { .. } | Self::Map(_) | Self::Unmap(_) | Self::Destroy(_) => {
                EventMask::STRUCTURE
            }
            Self::WmClose(_) => EventMask::CLIENT_MESSAGE,
        }
    }

    /// The pointer position carried by this event, if any.
    pub fn pos(&self) -> Option<Point> {
        match self {
            Self::ButtonPress(e)
            | Self::ButtonRelease(e)
            | Self::Motion(e)
            | Self::Enter(e)
            | Self::Leave(e) => Some(e.pos),
            Self::KeyPress(e) | Self::KeyRelease(e) => Some(e.pos),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Classes of [XEvent] used for selecting which events a raw event callback sees.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        /// Key presses
        const KEY_PRESS = 1 << 0;
        /// Key releases
        const KEY_RELEASE = 1 << 1;
        /// Mouse button presses
        const BUTTON_PRESS = 1 << 2;
        /// Mouse button releases
        const BUTTON_RELEASE = 1 << 3;
        /// Pointer entering a window
        const ENTER_WINDOW = 1 << 4;
        /// Pointer leaving a window
        const LEAVE_WINDOW = 1 << 5;
        /// Pointer motion
        const POINTER_MOTION = 1 << 6;
        /// Exposure
        const EXPOSURE = 1 << 7;
        /// Configure, map, unmap and destroy
        const STRUCTURE = 1 << 8;
        /// Focus in and out
        const FOCUS_CHANGE = 1 << 9;
        /// Messages from the window manager
        const CLIENT_MESSAGE = 1 << 10;

        /// All key events
        const KEY = Self::KEY_PRESS.bits() | Self::KEY_RELEASE.bits();
        /// All button events
        const BUTTON = Self::BUTTON_PRESS.bits() | Self::BUTTON_RELEASE.bits();
        /// Enter and leave
        const CROSSING = Self::ENTER_WINDOW.bits() | Self::LEAVE_WINDOW.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn pointer(id: u32) -> PointerEvent {
        PointerEvent {
            id: Xid(id),
            pos: Point::new(1, 2),
            button: None,
            state: ModMask::empty(),
            time: 0,
        }
    }

    #[test_case(XEvent::Motion(pointer(3)), EventMask::POINTER_MOTION; "motion")]
    #[test_case(XEvent::Leave(pointer(3)), EventMask::LEAVE_WINDOW; "leave")]
    #[test_case(XEvent::Map(Xid(3)), EventMask::STRUCTURE; "map")]
    #[test_case(XEvent::WmClose(Xid(3)), EventMask::CLIENT_MESSAGE; "close")]
    #[test]
    fn class_and_id(e: XEvent, class: EventMask) {
        assert_eq!(e.class(), class);
        assert_eq!(e.id(), Xid(3));
    }

    #[test]
    fn mouse_buttons_round_trip_through_u8() {
        for n in 1..=5u8 {
            let b = MouseButton::try_from(n).unwrap();
            assert_eq!(u8::from(b), n);
        }

        assert!(MouseButton::try_from(9).is_err());
    }
}
