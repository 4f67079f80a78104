//! Object level events and the results objects report back to the dispatcher
use crate::{
    core::keys::{KeySym, ModMask},
    pure::geometry::Point,
    x::XEvent,
};
use strum::{AsRefStr, Display, EnumIter};

/// The kinds of event an object's handler can be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter)]
pub enum EventKind {
    /// The object should render itself
    Draw,
    /// A mouse button was pressed over the object
    Push,
    /// The mouse button that pushed the object was released
    Release,
    /// The pointer moved onto the object
    Enter,
    /// The pointer moved off of the object
    Leave,
    /// The pointer moved while over (or while capturing) the object
    Motion,
    /// The object gained keyboard focus
    Focus,
    /// The object lost keyboard focus
    Unfocus,
    /// A key was pressed
    KeyPress,
    /// A key was released
    KeyRelease,
    /// One of the object's shortcut keys was pressed
    Shortcut,
    /// Periodic tick for automatic objects
    Step,
    /// Periodic tick for a capturing object while a button is held
    Update,
    /// The object was pushed twice in quick succession
    DblClick,
    /// The object was pushed three times in quick succession
    TripleClick,
    /// The object's geometry was recomputed after its form was resized
    Resized,
    /// The object is about to be destroyed
    FreeMem,
}

/// An event sent to an object's handler along with the pointer and key state at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// What happened
    pub kind: EventKind,
    /// Pointer position relative to the form
    pub pos: Point,
    /// Keysym for key events, button number for button events, zero otherwise
    pub key: KeySym,
    /// Modifier and button state
    pub state: ModMask,
    /// The platform event that triggered this one, if any
    pub raw: Option<XEvent>,
}

impl Event {
    /// Construct a new synthetic event carrying no key or platform event.
    pub fn new(kind: EventKind, pos: Point) -> Self {
        Self {
            kind,
            pos,
            key: 0,
            state: ModMask::empty(),
            raw: None,
        }
    }

    /// Set the key (or button number) for this event.
    pub fn with_key(self, key: KeySym) -> Self {
        Self { key, ..self }
    }

    /// Set the modifier state for this event.
    pub fn with_state(self, state: ModMask) -> Self {
        Self { state, ..self }
    }

    /// Attach the platform event that triggered this one.
    pub fn with_raw(self, raw: XEvent) -> Self {
        Self {
            raw: Some(raw),
            ..self
        }
    }

    /// The same event with a different kind.
    pub fn as_kind(self, kind: EventKind) -> Self {
        Self { kind, ..self }
    }
}

bitflags::bitflags! {
    /// What happened as a result of an object handling an event.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Outcome: u8 {
        /// The value of the object changed
        const CHANGED = 1 << 0;
        /// The current interaction sequence with the object has ended
        const END = 1 << 1;
    }
}

impl Outcome {
    /// Nothing to report
    pub const NONE: Outcome = Outcome::empty();
}

bitflags::bitflags! {
    /// When an object should be reported to the application after handling an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReturnWhen: u8 {
        /// Whenever the value changes
        const CHANGED = 1 << 0;
        /// Whenever an interaction ends
        const END = 1 << 1;
        /// When an interaction ends, but only if the value changed during it
        const END_CHANGED = 1 << 2;
        /// Whenever the value changes and at the end of every interaction
        const ALWAYS = Self::CHANGED.bits() | Self::END.bits();
    }
}

impl ReturnWhen {
    /// Never report the object
    pub const NONE: ReturnWhen = ReturnWhen::empty();

    /// Decide whether an object with this policy should be reported given the outcome of the
    /// event just handled and whether its value changed at any point during the interaction.
    pub fn should_report(&self, outcome: Outcome, changed_during: bool) -> bool {
        (self.contains(Self::CHANGED) && outcome.contains(Outcome::CHANGED))
            || (self.contains(Self::END) && outcome.contains(Outcome::END))
            || (self.contains(Self::END_CHANGED) && outcome.contains(Outcome::END) && changed_during)
    }
}

impl Default for ReturnWhen {
    fn default() -> Self {
        Self::END_CHANGED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case(ReturnWhen::NONE, Outcome::all(), true, false; "none never reports")]
    #[test_case(ReturnWhen::CHANGED, Outcome::CHANGED, false, true; "changed")]
    #[test_case(ReturnWhen::CHANGED, Outcome::END, true, false; "changed ignores end")]
    #[test_case(ReturnWhen::END, Outcome::END, false, true; "end without change")]
    #[test_case(ReturnWhen::END_CHANGED, Outcome::END, false, false; "end changed needs a change")]
    #[test_case(ReturnWhen::END_CHANGED, Outcome::END, true, true; "end changed after change")]
    #[test_case(ReturnWhen::END_CHANGED, Outcome::CHANGED, true, false; "end changed waits for end")]
    #[test_case(ReturnWhen::ALWAYS, Outcome::CHANGED, false, true; "always on change")]
    #[test_case(ReturnWhen::ALWAYS, Outcome::END, false, true; "always on end")]
    #[test]
    fn should_report(when: ReturnWhen, outcome: Outcome, changed: bool, expected: bool) {
        assert_eq!(when.should_report(outcome, changed), expected);
    }
}
