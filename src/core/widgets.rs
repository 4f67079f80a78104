//! Stock widgets
//!
//! Drawing is left to the embedding toolkit: these widgets only implement the interaction side
//! of the [Widget] contract.
use crate::core::{
    event::{Event, EventKind, Outcome, ReturnWhen},
    keys::{KeySym, ModMask, Shortcut, SpecialKey},
    object::{KeyInterest, ObjClass, ObjFlags, ObjectState, Widget},
};
use std::{cell::RefCell, rc::Rc};
use strum::{AsRefStr, Display};

/// A static box: never interacts and is created inactive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StaticBox;

impl StaticBox {
    /// Create a new StaticBox
    pub fn new() -> Self {
        Self
    }
}

impl Widget for StaticBox {
    fn handle(&mut self, _: &mut ObjectState, _: &Event) -> Outcome {
        Outcome::NONE
    }

    fn class(&self) -> ObjClass {
        ObjClass::Box
    }

    fn init(&mut self, obj: &mut ObjectState) {
        obj.active = false;
    }
}

/// The behaviour of a [Button].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[repr(u32)]
pub enum ButtonKind {
    /// Reports when released over the button
    Normal = 0,
    /// Toggles on each push
    Push = 1,
    /// Member of a radio group: pushing it releases the others
    Radio = 2,
    /// Reports when released but is never drawn
    Hidden = 3,
    /// Reports continuously while held down
    Touch = 4,
    /// A normal button that is also triggered by the Return key
    Return = 6,
}

/// The button family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    kind: ButtonKind,
}

impl Button {
    /// Create a new button of the given kind.
    pub fn new(kind: ButtonKind) -> Self {
        Self { kind }
    }

    /// A button that reports when released over it.
    pub fn normal() -> Self {
        Self::new(ButtonKind::Normal)
    }

    /// A button that toggles between pushed and released.
    pub fn push() -> Self {
        Self::new(ButtonKind::Push)
    }

    /// A button in a radio group.
    pub fn radio() -> Self {
        Self::new(ButtonKind::Radio)
    }

    /// A button that reports repeatedly while held.
    pub fn touch() -> Self {
        Self::new(ButtonKind::Touch)
    }

    /// A normal button also bound to the Return key.
    pub fn return_button() -> Self {
        Self::new(ButtonKind::Return)
    }

    /// An invisible button, typically used as a hot area or shortcut target.
    pub fn hidden() -> Self {
        Self::new(ButtonKind::Hidden)
    }

    /// The kind of this button.
    pub fn kind(&self) -> ButtonKind {
        self.kind
    }

    fn release(&self, obj: &mut ObjectState, e: &Event) -> Outcome {
        match self.kind {
            // Radio values only change through pushes and sibling releases
            ButtonKind::Radio => Outcome::NONE,

            ButtonKind::Push => {
                if obj.rect().contains_point(e.pos) {
                    Outcome::CHANGED | Outcome::END
                } else {
                    obj.pushed = !obj.pushed;
                    obj.request_redraw();
                    Outcome::END
                }
            }

            ButtonKind::Touch => {
                obj.pushed = false;
                obj.request_redraw();
                Outcome::END
            }

            ButtonKind::Normal | ButtonKind::Hidden | ButtonKind::Return => {
                let was_pushed = obj.pushed;
                obj.pushed = false;
                obj.request_redraw();

                if was_pushed && obj.rect().contains_point(e.pos) {
                    Outcome::CHANGED | Outcome::END
                } else {
                    Outcome::END
                }
            }
        }
    }
}

impl Widget for Button {
    fn handle(&mut self, obj: &mut ObjectState, e: &Event) -> Outcome {
        match e.kind {
            EventKind::Push => match self.kind {
                ButtonKind::Radio => {
                    if obj.pushed {
                        Outcome::END
                    } else {
                        obj.pushed = true;
                        obj.request_redraw();
                        Outcome::CHANGED | Outcome::END
                    }
                }
                ButtonKind::Push => {
                    obj.pushed = !obj.pushed;
                    obj.request_redraw();
                    Outcome::NONE
                }
                ButtonKind::Touch => {
                    obj.pushed = true;
                    obj.request_redraw();
                    Outcome::CHANGED
                }
                _ => {
                    obj.pushed = true;
                    obj.request_redraw();
                    Outcome::NONE
                }
            },

            EventKind::Release => self.release(obj, e),

            EventKind::Update if self.kind == ButtonKind::Touch && obj.pushed => Outcome::CHANGED,

            EventKind::Shortcut => {
                if self.kind == ButtonKind::Push {
                    obj.pushed = !obj.pushed;
                }
                obj.request_redraw();
                Outcome::CHANGED | Outcome::END
            }

            EventKind::Enter | EventKind::Leave => {
                obj.request_redraw();
                Outcome::NONE
            }

            _ => Outcome::NONE,
        }
    }

    fn class(&self) -> ObjClass {
        ObjClass::Button
    }

    fn obj_type(&self) -> u32 {
        self.kind as u32
    }

    fn init(&mut self, obj: &mut ObjectState) {
        match self.kind {
            ButtonKind::Radio => obj.flags |= ObjFlags::RADIO,
            ButtonKind::Touch => {
                obj.flags |= ObjFlags::WANT_UPDATE;
                obj.how_return = ReturnWhen::CHANGED;
            }
            ButtonKind::Return => obj
                .shortcuts
                .push(Shortcut::new(SpecialKey::Return.keysym(), ModMask::empty())),
            ButtonKind::Normal | ButtonKind::Push | ButtonKind::Hidden => (),
        }
    }
}

/// A single line text input field.
///
/// The current text is shared through the handle returned by [Input::text] so that it can be
/// read back after the widget has been handed over to a form.
#[derive(Debug, Default, Clone)]
pub struct Input {
    text: Rc<RefCell<String>>,
    cursor: usize,
}

impl Input {
    /// Create a new empty Input
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Input holding some initial text.
    pub fn with_text(s: &str) -> Self {
        Self {
            text: Rc::new(RefCell::new(s.to_string())),
            cursor: s.chars().count(),
        }
    }

    /// A shared handle on the text of this input.
    pub fn text(&self) -> Rc<RefCell<String>> {
        self.text.clone()
    }

    fn byte_offset(s: &str, char_ix: usize) -> usize {
        s.char_indices().nth(char_ix).map(|(i, _)| i).unwrap_or(s.len())
    }

    fn key(&mut self, obj: &mut ObjectState, sym: KeySym) -> Outcome {
        let mut text = self.text.borrow_mut();
        let len = text.chars().count();

        let outcome = match SpecialKey::from_keysym(sym) {
            Some(SpecialKey::Return) => return Outcome::END,
            Some(SpecialKey::BackSpace) if self.cursor > 0 => {
                self.cursor -= 1;
                let ix = Self::byte_offset(&text, self.cursor);
                text.remove(ix);
                Outcome::CHANGED
            }
            Some(SpecialKey::Delete) if self.cursor < len => {
                let ix = Self::byte_offset(&text, self.cursor);
                text.remove(ix);
                Outcome::CHANGED
            }
            Some(SpecialKey::Left) => {
                self.cursor = self.cursor.saturating_sub(1);
                Outcome::NONE
            }
            Some(SpecialKey::Right) => {
                self.cursor = (self.cursor + 1).min(len);
                Outcome::NONE
            }
            Some(SpecialKey::Home) => {
                self.cursor = 0;
                Outcome::NONE
            }
            Some(SpecialKey::End) => {
                self.cursor = len;
                Outcome::NONE
            }
            Some(_) => return Outcome::NONE,

            None => match char::from_u32(sym).filter(|c| !c.is_control()) {
                Some(c) if sym < 0xff00 => {
                    let ix = Self::byte_offset(&text, self.cursor);
                    text.insert(ix, c);
                    self.cursor += 1;
                    Outcome::CHANGED
                }
                _ => Outcome::NONE,
            },
        };

        obj.request_redraw();

        outcome
    }
}

impl Widget for Input {
    fn handle(&mut self, obj: &mut ObjectState, e: &Event) -> Outcome {
        match e.kind {
            EventKind::KeyPress => self.key(obj, e.key),
            EventKind::Focus => {
                self.cursor = self.text.borrow().chars().count();
                obj.request_redraw();
                Outcome::NONE
            }
            EventKind::Unfocus => {
                obj.request_redraw();
                Outcome::END
            }
            _ => Outcome::NONE,
        }
    }

    fn class(&self) -> ObjClass {
        ObjClass::Input
    }

    fn init(&mut self, obj: &mut ObjectState) {
        obj.flags |= ObjFlags::INPUT;
        obj.keys = KeyInterest::NORMAL | KeyInterest::SPECIAL;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::object::Object,
        pure::geometry::{Point, Rect},
    };
    use simple_test_case::test_case;

    fn ev(kind: EventKind, x: i32, y: i32) -> Event {
        Event::new(kind, Point::new(x, y))
    }

    fn key(sym: KeySym) -> Event {
        ev(EventKind::KeyPress, 0, 0).with_key(sym)
    }

    fn object(w: impl Widget + 'static) -> Object {
        Object::new(Rect::new(0, 0, 10, 10), "", w.boxed())
    }

    #[test_case(5, 5, Outcome::CHANGED | Outcome::END; "released inside")]
    #[test_case(50, 5, Outcome::END; "released outside")]
    #[test]
    fn normal_button_reports_on_release(x: i32, y: i32, expected: Outcome) {
        let mut b = object(Button::normal());

        assert_eq!(b.dispatch(&ev(EventKind::Push, 5, 5)), Outcome::NONE);
        assert!(b.state.pushed);
        assert_eq!(b.dispatch(&ev(EventKind::Release, x, y)), expected);
        assert!(!b.state.pushed);
    }

    #[test]
    fn push_button_toggles() {
        let mut b = object(Button::push());

        b.dispatch(&ev(EventKind::Push, 5, 5));
        b.dispatch(&ev(EventKind::Release, 5, 5));
        assert!(b.state.pushed);

        b.dispatch(&ev(EventKind::Push, 5, 5));
        b.dispatch(&ev(EventKind::Release, 5, 5));
        assert!(!b.state.pushed);
    }

    #[test]
    fn push_button_released_outside_reverts() {
        let mut b = object(Button::push());

        b.dispatch(&ev(EventKind::Push, 5, 5));
        assert_eq!(b.dispatch(&ev(EventKind::Release, 50, 50)), Outcome::END);
        assert!(!b.state.pushed);
    }

    #[test]
    fn radio_button_ignores_release() {
        let mut b = object(Button::radio());

        assert_eq!(
            b.dispatch(&ev(EventKind::Push, 5, 5)),
            Outcome::CHANGED | Outcome::END
        );
        assert_eq!(b.dispatch(&ev(EventKind::Release, 5, 5)), Outcome::NONE);
        assert!(b.state.pushed);
        assert!(b.state.flags().contains(ObjFlags::RADIO));
    }

    #[test]
    fn touch_button_reports_updates_while_held() {
        let mut b = object(Button::touch());

        assert_eq!(b.dispatch(&ev(EventKind::Update, 5, 5)), Outcome::NONE);
        b.dispatch(&ev(EventKind::Push, 5, 5));
        assert_eq!(b.dispatch(&ev(EventKind::Update, 5, 5)), Outcome::CHANGED);
        assert_eq!(b.dispatch(&ev(EventKind::Release, 5, 5)), Outcome::END);
    }

    #[test]
    fn touch_button_returns_on_every_change() {
        let b = object(Button::touch());

        assert_eq!(b.state.how_return, ReturnWhen::CHANGED);
        assert_eq!(object(Button::normal()).state.how_return, ReturnWhen::default());
    }

    #[test]
    fn return_button_has_a_return_shortcut() {
        let b = object(Button::return_button());

        assert!(b.state.shortcuts()[0].matches(SpecialKey::Return.keysym(), ModMask::empty()));
    }

    #[test]
    fn static_box_starts_inactive() {
        let b = object(StaticBox::new());

        assert!(!b.state.is_active());
        assert_eq!(b.state.class(), ObjClass::Box);
    }

    #[test]
    fn input_editing() {
        let input = Input::with_text("ac");
        let text = input.text();
        let mut obj = object(input);

        obj.dispatch(&key(SpecialKey::Left.keysym()));
        assert_eq!(obj.dispatch(&key('b' as KeySym)), Outcome::CHANGED);
        assert_eq!(*text.borrow(), "abc");

        obj.dispatch(&key(SpecialKey::End.keysym()));
        obj.dispatch(&key(SpecialKey::BackSpace.keysym()));
        assert_eq!(*text.borrow(), "ab");

        obj.dispatch(&key(SpecialKey::Home.keysym()));
        obj.dispatch(&key(SpecialKey::Delete.keysym()));
        assert_eq!(*text.borrow(), "b");

        assert_eq!(obj.dispatch(&key(SpecialKey::Return.keysym())), Outcome::END);
    }

    #[test]
    fn input_reports_end_on_unfocus() {
        let mut obj = object(Input::new());

        assert!(obj.state.flags().contains(ObjFlags::INPUT));
        assert_eq!(obj.dispatch(&ev(EventKind::Unfocus, 0, 0)), Outcome::END);
    }
}
