//! Objects: the widgets contained in a form
//!
//! An [Object] pairs the state that the dispatcher needs to know about ([ObjectState]: geometry,
//! capability flags, focus and capture markers, shortcuts...) with a boxed [Widget] that provides
//! all class specific behaviour. The dispatcher never looks inside of a widget: everything it
//! learns comes back through the [Outcome] returned from [Widget::handle].
use crate::{
    core::{
        event::{Event, EventKind, Outcome, ReturnWhen},
        keys::Shortcut,
    },
    pure::geometry::{Gravity, Placement, Point, Rect, Resize, Size},
    FormId, ObjectId,
};
use std::fmt;
use strum::{AsRefStr, Display};

/// The class of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
pub enum ObjClass {
    /// Marker opening a group
    BeginGroup,
    /// Marker closing a group
    EndGroup,
    /// A static box
    Box,
    /// Static text
    Text,
    /// Any of the button family
    Button,
    /// A text input field
    Input,
    /// A slider or scrollbar
    Slider,
    /// A counter
    Counter,
    /// A drop down choice
    Choice,
    /// A scrolling browser
    Browser,
    /// A canvas window
    Canvas,
    /// A countdown timer
    Timer,
    /// A clock
    Clock,
    /// Anything else
    Custom(u32),
}

impl ObjClass {
    /// Group markers take part in ordering only: they never receive events.
    pub fn is_group_marker(&self) -> bool {
        matches!(self, Self::BeginGroup | Self::EndGroup)
    }
}

bitflags::bitflags! {
    /// Capabilities that change how the dispatcher treats an object.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjFlags: u16 {
        /// May hold keyboard focus
        const INPUT = 1 << 0;
        /// Member of a radio group
        const RADIO = 1 << 1;
        /// Wants periodic STEP events
        const AUTOMATIC = 1 << 2;
        /// Wants MOTION events even when not capturing the pointer
        const WANT_MOTION = 1 << 3;
        /// Wants UPDATE events while capturing the pointer with a button held
        const WANT_UPDATE = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Which keys an object wants to receive.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyInterest: u8 {
        /// Printable keys
        const NORMAL = 1 << 0;
        /// Tab and Shift-Tab rather than using them to move focus
        const TAB = 1 << 1;
        /// Cursor movement keys (arrows, Home, End, Page Up / Down)
        const SPECIAL = 1 << 2;
        /// Everything
        const ALL = Self::NORMAL.bits() | Self::TAB.bits() | Self::SPECIAL.bits();
    }
}

/// Visual attributes that widgets consult when drawing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Appearance {
    /// Box style index
    pub boxtype: u32,
    /// Primary color index
    pub col1: u32,
    /// Secondary color index
    pub col2: u32,
    /// Label color index
    pub lcol: u32,
    /// Label alignment bits
    pub align: u32,
    /// Label font style
    pub lstyle: u32,
    /// Label font size
    pub lsize: u32,
}

/// The state of an object that is shared between the dispatcher and its widget.
#[derive(Debug, Clone)]
pub struct ObjectState {
    pub(crate) id: ObjectId,
    pub(crate) form: Option<FormId>,
    pub(crate) class: ObjClass,
    pub(crate) obj_type: u32,
    pub(crate) rect: Rect,
    pub(crate) placement: Placement,
    pub(crate) flags: ObjFlags,
    pub(crate) keys: KeyInterest,
    pub(crate) active: bool,
    pub(crate) visible: bool,
    pub(crate) focused: bool,
    pub(crate) belowmouse: bool,
    pub(crate) flashing: bool,
    pub(crate) how_return: ReturnWhen,
    pub(crate) changed_during: bool,
    pub(crate) group: u32,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: Vec<ObjectId>,
    pub(crate) shortcuts: Vec<Shortcut>,
    pub(crate) redraw: bool,
    pub(crate) keep_focus: bool,
    /// The label drawn for this object
    pub label: String,
    /// Visual attributes
    pub appearance: Appearance,
    /// Whether the object is currently "on": the value maintained for radio groups and the
    /// pressed state of buttons
    pub pushed: bool,
}

impl ObjectState {
    fn new(class: ObjClass, obj_type: u32, rect: Rect, label: &str) -> Self {
        Self {
            id: ObjectId(0),
            form: None,
            class,
            obj_type,
            rect,
            placement: Placement::new(rect, rect.size()),
            flags: ObjFlags::empty(),
            keys: KeyInterest::empty(),
            active: true,
            visible: true,
            focused: false,
            belowmouse: false,
            flashing: false,
            how_return: ReturnWhen::default(),
            changed_during: false,
            group: 0,
            parent: None,
            children: Vec::new(),
            shortcuts: Vec::new(),
            redraw: false,
            keep_focus: false,
            label: label.to_string(),
            appearance: Appearance::default(),
            pushed: false,
        }
    }

    /// The id of this object.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The form this object is attached to (if any).
    pub fn form(&self) -> Option<FormId> {
        self.form
    }

    /// The class of this object.
    pub fn class(&self) -> ObjClass {
        self.class
    }

    /// The class specific type of this object.
    pub fn obj_type(&self) -> u32 {
        self.obj_type
    }

    /// The current bounding box of this object relative to its form.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// The stored placement used when the form is resized.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// The capability flags for this object.
    pub fn flags(&self) -> ObjFlags {
        self.flags
    }

    /// The keys this object wants to receive.
    pub fn key_interest(&self) -> KeyInterest {
        self.keys
    }

    /// Set which keys this object wants to receive.
    pub fn set_key_interest(&mut self, keys: KeyInterest) {
        self.keys = keys;
    }

    /// Whether or not the object reacts to user interaction.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether or not the object is shown.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether or not this object currently holds keyboard focus.
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Whether or not the pointer is currently over this object.
    pub fn is_below_mouse(&self) -> bool {
        self.belowmouse
    }

    /// True while the object is being flashed in response to one of its shortcuts.
    pub fn is_flashing(&self) -> bool {
        self.flashing
    }

    /// The explicit group id of this object (0 if it is not in a group).
    pub fn group(&self) -> u32 {
        self.group
    }

    /// The parent of this object if it is a child of a composite object.
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// The children of this object if it is a composite object.
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// The shortcuts registered for this object.
    pub fn shortcuts(&self) -> &[Shortcut] {
        &self.shortcuts
    }

    /// Set or clear the given capability flags.
    ///
    /// [ObjFlags::AUTOMATIC] changes must go through the dispatcher so that the automatic form
    /// count stays correct: any attempt to change it here is ignored.
    pub fn set_flags(&mut self, flags: ObjFlags, on: bool) {
        let flags = flags - ObjFlags::AUTOMATIC;
        self.flags.set(flags, on);
    }

    /// Ask for this object to be redrawn at the next opportunity.
    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    /// Refuse to give up keyboard focus: only meaningful while handling
    /// [Unfocus][crate::core::event::EventKind::Unfocus], after which focus is handed straight
    /// back to this object.
    pub fn refuse_unfocus(&mut self) {
        self.keep_focus = true;
    }

    pub(crate) fn wants(&self, flags: ObjFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Can this object be the target of pointer and key events at all?
    pub(crate) fn is_interactive(&self) -> bool {
        self.visible && self.active && !self.class.is_group_marker()
    }

    pub(crate) fn rescale(&mut self, old: Size, new: Size) {
        self.placement.rescale(old, new);
        self.rect = self.placement.rect();
    }

    pub(crate) fn set_rect(&mut self, r: Rect, form: Size) {
        self.rect = r;
        self.placement.set_rect(r, form);
    }

    pub(crate) fn set_gravity(&mut self, nw: Gravity, se: Gravity) {
        self.placement.nw_gravity = nw;
        self.placement.se_gravity = se;
    }

    pub(crate) fn set_resize(&mut self, resize: Resize) {
        self.placement.resize = resize;
    }
}

/// Class specific behaviour for an object.
pub trait Widget {
    /// Handle an event, returning what (if anything) changed as a result.
    fn handle(&mut self, obj: &mut ObjectState, event: &Event) -> Outcome;

    /// The class of objects created for this widget.
    fn class(&self) -> ObjClass {
        ObjClass::Custom(0)
    }

    /// The class specific type of objects created for this widget.
    fn obj_type(&self) -> u32 {
        0
    }

    #[allow(unused_variables)]
    /// Set up the initial flags and key interest for a newly created object.
    fn init(&mut self, obj: &mut ObjectState) {}

    #[allow(unused_variables)]
    /// Render the current state of the object.
    fn draw(&mut self, obj: &ObjectState) {}

    #[allow(unused_variables)]
    /// Release any class specific resources: called exactly once, immediately before the
    /// object is destroyed.
    fn on_free(&mut self, obj: &mut ObjectState) {}

    /// Convert to a trait object
    fn boxed(self) -> Box<dyn Widget>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl fmt::Debug for Box<dyn Widget> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget").finish()
    }
}

/// Run before or after an object's own handler. A pre-handler returning `true` preempts the
/// object's handler for that event.
pub trait ObjectHook {
    /// Run this hook
    fn call(&mut self, obj: &mut ObjectState, event: &Event) -> bool;
}

impl<F> ObjectHook for F
where
    F: FnMut(&mut ObjectState, &Event) -> bool,
{
    fn call(&mut self, obj: &mut ObjectState, event: &Event) -> bool {
        (self)(obj, event)
    }
}

impl fmt::Debug for Box<dyn ObjectHook> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHook").finish()
    }
}

/// A widget instance together with the state the dispatcher maintains for it.
#[derive(Debug)]
pub struct Object {
    pub(crate) state: ObjectState,
    pub(crate) widget: Option<Box<dyn Widget>>,
    pub(crate) prehandler: Option<Box<dyn ObjectHook>>,
    pub(crate) posthandler: Option<Box<dyn ObjectHook>>,
}

impl Object {
    /// Create a new object backed by the given widget.
    pub fn new(rect: Rect, label: &str, mut widget: Box<dyn Widget>) -> Self {
        let mut state = ObjectState::new(widget.class(), widget.obj_type(), rect, label);
        widget.init(&mut state);

        Self {
            state,
            widget: Some(widget),
            prehandler: None,
            posthandler: None,
        }
    }

    pub(crate) fn marker(class: ObjClass, group: u32) -> Self {
        let mut state = ObjectState::new(class, 0, Rect::default(), "");
        state.group = group;
        state.active = false;

        Self {
            state,
            widget: None,
            prehandler: None,
            posthandler: None,
        }
    }

    /// The dispatcher visible state of this object.
    pub fn state(&self) -> &ObjectState {
        &self.state
    }

    /// Deliver an event: pre-handler, widget, post-handler.
    pub(crate) fn dispatch(&mut self, event: &Event) -> Outcome {
        let Self {
            state,
            widget,
            prehandler,
            posthandler,
        } = self;

        if let Some(h) = prehandler {
            if h.call(state, event) {
                return Outcome::NONE;
            }
        }

        let outcome = match widget {
            Some(w) => w.handle(state, event),
            None => Outcome::NONE,
        };

        if let Some(h) = posthandler {
            h.call(state, event);
        }

        outcome
    }

    /// Render the object: hooks see a [Draw][EventKind::Draw] event and a pre-handler may
    /// replace the widget's own drawing entirely.
    pub(crate) fn draw(&mut self) {
        let Self {
            state,
            widget,
            prehandler,
            posthandler,
        } = self;

        state.redraw = false;
        if !state.visible {
            return;
        }

        let event = Event::new(EventKind::Draw, Point::default());
        if let Some(h) = prehandler {
            if h.call(state, &event) {
                return;
            }
        }
        if let Some(w) = widget {
            w.draw(state);
        }
        if let Some(h) = posthandler {
            h.call(state, &event);
        }
    }

    pub(crate) fn free(mut self) {
        if let Some(mut w) = self.widget.take() {
            w.on_free(&mut self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Debug, Default)]
    struct Recorder {
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl Widget for Recorder {
        fn handle(&mut self, _: &mut ObjectState, e: &Event) -> Outcome {
            self.seen.borrow_mut().push(format!("handle:{}", e.kind));
            Outcome::CHANGED
        }

        fn draw(&mut self, _: &ObjectState) {
            self.seen.borrow_mut().push("draw".to_string());
        }

        fn on_free(&mut self, _: &mut ObjectState) {
            self.seen.borrow_mut().push("free".to_string());
        }
    }

    fn push() -> Event {
        Event::new(EventKind::Push, Point::new(0, 0))
    }

    #[test]
    fn prehandler_can_preempt() {
        let seen = Rc::new(RefCell::new(vec![]));
        let mut obj = Object::new(Rect::new(0, 0, 10, 10), "", Recorder { seen: seen.clone() }.boxed());
        obj.prehandler = Some(Box::new(|_: &mut ObjectState, _: &Event| true));

        assert_eq!(obj.dispatch(&push()), Outcome::NONE);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn posthandler_runs_after_widget() {
        let seen = Rc::new(RefCell::new(vec![]));
        let s = seen.clone();
        let mut obj = Object::new(Rect::new(0, 0, 10, 10), "", Recorder { seen: seen.clone() }.boxed());
        obj.posthandler = Some(Box::new(move |_: &mut ObjectState, e: &Event| {
            s.borrow_mut().push(format!("post:{}", e.kind));
            false
        }));

        assert_eq!(obj.dispatch(&push()), Outcome::CHANGED);
        assert_eq!(*seen.borrow(), vec!["handle:Push", "post:Push"]);
    }

    #[test]
    fn free_calls_on_free_once() {
        let seen = Rc::new(RefCell::new(vec![]));
        let obj = Object::new(Rect::new(0, 0, 10, 10), "", Recorder { seen: seen.clone() }.boxed());
        obj.free();

        assert_eq!(*seen.borrow(), vec!["free"]);
    }

    #[test]
    fn hidden_objects_are_not_drawn() {
        let seen = Rc::new(RefCell::new(vec![]));
        let mut obj = Object::new(Rect::new(0, 0, 10, 10), "", Recorder { seen: seen.clone() }.boxed());
        obj.state.redraw = true;
        obj.state.visible = false;
        obj.draw();

        assert!(!obj.state.redraw);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn draw_prehandler_can_replace_widget_drawing() {
        let seen = Rc::new(RefCell::new(vec![]));
        let mut obj = Object::new(Rect::new(0, 0, 10, 10), "", Recorder { seen: seen.clone() }.boxed());
        obj.prehandler = Some(Box::new(|_: &mut ObjectState, e: &Event| e.kind == EventKind::Draw));
        obj.draw();

        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn automatic_cannot_be_set_directly() {
        let mut state = ObjectState::new(ObjClass::Box, 0, Rect::default(), "");
        state.set_flags(ObjFlags::AUTOMATIC | ObjFlags::WANT_MOTION, true);

        assert_eq!(state.flags(), ObjFlags::WANT_MOTION);
    }
}
