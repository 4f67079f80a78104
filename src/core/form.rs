//! Forms: top level window backed containers of objects
use crate::{
    pure::{
        geometry::{Point, Rect, Size},
        registry::Entry,
    },
    x::{EventMask, XEvent},
    FormId, ObjectId, Xid,
};
use std::fmt;
use tracing::trace;

/// The visibility state of a form.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Not shown: the form has no live window
    #[default]
    Invisible,
    /// Shown on screen
    Visible,
    /// In the process of being hidden: objects are being sent their final events
    BeingHidden,
}

/// Intercept platform events for a form before the dispatcher sees them.
///
/// Returning `true` marks the event as consumed and the dispatcher will not process it further.
pub trait RawCallback {
    /// Run this callback
    fn call(&mut self, form: FormId, event: &XEvent) -> bool;
}

impl<F> RawCallback for F
where
    F: FnMut(FormId, &XEvent) -> bool,
{
    fn call(&mut self, form: FormId, event: &XEvent) -> bool {
        (self)(form, event)
    }
}

impl fmt::Debug for Box<dyn RawCallback> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCallback").finish()
    }
}

/// A top level container for objects.
#[derive(Debug)]
pub struct Form {
    pub(crate) id: FormId,
    pub(crate) title: String,
    pub(crate) win: Option<Xid>,
    pub(crate) pos: Point,
    pub(crate) size: Size,
    pub(crate) visibility: Visibility,
    pub(crate) deactivated: u32,
    pub(crate) objects: Vec<ObjectId>,
    pub(crate) focusobj: Option<ObjectId>,
    pub(crate) parent: Option<FormId>,
    pub(crate) child: Option<FormId>,
    pub(crate) raw_callbacks: Vec<(EventMask, Box<dyn RawCallback>)>,
    pub(crate) frozen: u32,
    pub(crate) needs_redraw: bool,
    pub(crate) n_automatic: usize,
}

impl Form {
    pub(crate) fn new(id: FormId, w: i32, h: i32) -> Self {
        Self {
            id,
            title: String::new(),
            win: None,
            pos: Point::default(),
            size: Size::new(w as f64, h as f64),
            visibility: Visibility::Invisible,
            deactivated: 0,
            objects: Vec::new(),
            focusobj: None,
            parent: None,
            child: None,
            raw_callbacks: Vec::new(),
            frozen: 0,
            needs_redraw: false,
            n_automatic: 0,
        }
    }

    /// The id of this form.
    pub fn id(&self) -> FormId {
        self.id
    }

    /// The window title of this form.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The window backing this form while it is shown.
    pub fn win(&self) -> Option<Xid> {
        self.win
    }

    /// The integer position and size of this form.
    pub fn rect(&self) -> Rect {
        let (w, h) = self.size.rounded();

        Rect::new(self.pos.x, self.pos.y, w, h)
    }

    /// The high resolution size of this form.
    pub fn size(&self) -> Size {
        self.size
    }

    /// The current visibility state of this form.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether or not this form is currently shown.
    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    /// Whether or not this form currently accepts user interaction.
    pub fn is_active(&self) -> bool {
        self.deactivated == 0
    }

    /// Whether or not redraws for this form are currently suspended.
    pub fn is_frozen(&self) -> bool {
        self.frozen > 0
    }

    /// The objects contained in this form in stacking order (bottom first).
    pub fn objects(&self) -> &[ObjectId] {
        &self.objects
    }

    /// The object currently holding keyboard focus in this form.
    pub fn focus(&self) -> Option<ObjectId> {
        self.focusobj
    }

    /// The form this one is embedded in, if any.
    pub fn parent(&self) -> Option<FormId> {
        self.parent
    }

    /// The form embedded in this one, if any.
    pub fn child(&self) -> Option<FormId> {
        self.child
    }

    /// Run any raw callbacks registered for the class of the given event, stopping at the first
    /// one that consumes it.
    pub(crate) fn intercept(&mut self, event: &XEvent) -> bool {
        let class = event.class();
        let id = self.id;

        for (mask, cb) in self.raw_callbacks.iter_mut() {
            if mask.intersects(class) && cb.call(id, event) {
                trace!(form = %id, ?event, "event consumed by raw callback");
                return true;
            }
        }

        false
    }
}

impl Entry for Form {
    type Key = FormId;

    fn key(&self) -> FormId {
        self.id
    }

    fn has_automatic(&self) -> bool {
        self.n_automatic > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_callbacks_only_see_their_classes() {
        let mut f = Form::new(FormId(1), 100, 100);
        f.raw_callbacks
            .push((EventMask::EXPOSURE, Box::new(|_: FormId, _: &XEvent| true)));

        assert!(!f.intercept(&XEvent::Map(Xid(1))));
        assert!(f.intercept(&XEvent::Expose {
            id: Xid(1),
            r: Rect::default(),
            count: 0
        }));
    }

    #[test]
    fn rect_rounds_high_resolution_size() {
        let mut f = Form::new(FormId(1), 100, 100);
        f.size = Size::new(100.5, 99.4);

        assert_eq!(f.rect(), Rect::new(0, 0, 101, 99));
    }
}
