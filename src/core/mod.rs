//! Core data structures and user facing functionality for the dispatcher
use crate::{
    core::{
        event::{Event, EventKind, ReturnWhen},
        form::{Form, RawCallback, Visibility},
        hooks::{CloseCallback, EventCallback, ObjectCallback},
        interaction::InteractionContext,
        io::{HasIoWatches, IoId, IoMask, IoWatches},
        keys::parse_shortcuts,
        object::{ObjClass, ObjFlags, Object, ObjectHook, ObjectState, Widget},
        timeout::{HasTimers, IdleSlot, TimeoutId, Timeouts},
        widgets::StaticBox,
    },
    pure::{
        geometry::{Gravity, Point, Rect, Resize, Size},
        registry::Registry,
    },
    x::{EventMask, Platform, XEvent},
    Error, FormId, ObjectId, Result, Xid,
};
use std::{
    collections::{HashMap, VecDeque},
    fmt,
    mem::take,
    os::unix::io::RawFd,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, trace, warn};

pub mod config;
pub mod event;
pub mod form;
pub(crate) mod handle;
pub mod hooks;
pub mod interaction;
pub mod io;
pub mod keys;
pub mod object;
pub mod timeout;
pub mod widgets;

#[doc(inline)]
pub use config::Config;

/// Platform events for windows that are not forms are dropped once this many are queued.
const MAX_FOREIGN_EVENTS: usize = 256;

/// The interaction core: owns every form and object along with the state used to route
/// platform events to them.
///
/// All work happens on the calling thread inside of [Dispatcher::do_forms] (or
/// [Dispatcher::check_forms]): platform events are handled one at a time and, when there is
/// nothing pending, the dispatcher sleeps on the window system connection and any registered
/// file descriptors before running a single idle pass.
pub struct Dispatcher<P>
where
    P: Platform,
{
    pub(crate) config: Config,
    pub(crate) platform: P,
    pub(crate) forms: Registry<Form>,
    pub(crate) objects: HashMap<ObjectId, Object>,
    pub(crate) ix: InteractionContext,
    pub(crate) io: IoWatches<Self>,
    pub(crate) timeouts: Timeouts<Self>,
    pub(crate) idle: IdleSlot<Self>,
    pub(crate) object_callbacks: HashMap<ObjectId, Option<Box<dyn ObjectCallback<P>>>>,
    pub(crate) form_callbacks: HashMap<FormId, Option<Box<dyn ObjectCallback<P>>>>,
    pub(crate) close_callbacks: HashMap<FormId, Option<Box<dyn CloseCallback<P>>>>,
    pub(crate) event_callbacks: HashMap<Xid, Option<Box<dyn EventCallback<P>>>>,
    pub(crate) foreign: VecDeque<XEvent>,
    pub(crate) lookahead: VecDeque<XEvent>,
    pub(crate) returned: VecDeque<ObjectId>,
    pub(crate) pending_free: Vec<ObjectId>,
    pub(crate) depth: usize,
    pub(crate) since_idle: usize,
    pub(crate) open_form: Option<FormId>,
    pub(crate) open_group: Option<u32>,
    next_form: u32,
    next_object: u32,
    next_group: u32,
}

impl<P: Platform> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("forms", &self.forms)
            .field("n_objects", &self.objects.len())
            .field("ix", &self.ix)
            .field("io", &self.io)
            .field("timeouts", &self.timeouts)
            .field("idle", &self.idle)
            .field("returned", &self.returned)
            .field("pending_free", &self.pending_free)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<P: Platform> HasIoWatches for Dispatcher<P> {
    fn io_watches(&mut self) -> &mut IoWatches<Self> {
        &mut self.io
    }
}

impl<P: Platform> HasTimers for Dispatcher<P> {
    fn timeouts(&mut self) -> &mut Timeouts<Self> {
        &mut self.timeouts
    }

    fn idle(&mut self) -> &mut IdleSlot<Self> {
        &mut self.idle
    }
}

impl<P: Platform> Dispatcher<P> {
    /// Create a new Dispatcher that will use the given platform connection.
    pub fn new(config: Config, platform: P) -> Result<Self> {
        config.validate().map_err(Error::InvalidConfig)?;

        Ok(Self {
            config,
            platform,
            forms: Registry::new(),
            objects: HashMap::new(),
            ix: InteractionContext::default(),
            io: IoWatches::new(),
            timeouts: Timeouts::new(),
            idle: IdleSlot::default(),
            object_callbacks: HashMap::new(),
            form_callbacks: HashMap::new(),
            close_callbacks: HashMap::new(),
            event_callbacks: HashMap::new(),
            foreign: VecDeque::new(),
            lookahead: VecDeque::new(),
            returned: VecDeque::new(),
            pending_free: Vec::new(),
            depth: 0,
            since_idle: 0,
            open_form: None,
            open_group: None,
            next_form: 1,
            next_object: 1,
            next_group: 1,
        })
    }

    /// The configuration this dispatcher is running with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The platform connection used by this dispatcher.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The current pointer and keyboard ownership.
    pub fn interaction(&self) -> &InteractionContext {
        &self.ix
    }

    /// The registry of known forms.
    pub fn forms(&self) -> &Registry<Form> {
        &self.forms
    }

    /// Look up a form by id.
    pub fn form(&self, id: FormId) -> Option<&Form> {
        self.forms.get(id)
    }

    /// Look up an object by id. Objects that have been freed (including those waiting for the
    /// end of the current dispatch pass to be destroyed) are not returned.
    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        if self.pending_free.contains(&id) {
            return None;
        }

        self.objects.get(&id)
    }

    /// Mutable access to the widget visible state of an object.
    pub fn object_state_mut(&mut self, id: ObjectId) -> Option<&mut ObjectState> {
        if self.pending_free.contains(&id) {
            return None;
        }

        self.objects.get_mut(&id).map(|o| &mut o.state)
    }

    /// Whether platform events have been read ahead and are waiting to be handled.
    pub fn has_pending_events(&self) -> bool {
        !self.lookahead.is_empty()
    }

    pub(crate) fn form_mut(&mut self, id: FormId) -> Result<&mut Form> {
        match self.forms.get_mut(id) {
            Some(f) => Ok(f),
            None => {
                error!(%id, "unknown form");
                Err(Error::UnknownForm(id))
            }
        }
    }

    pub(crate) fn obj_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        if self.pending_free.contains(&id) {
            error!(%id, "object has already been freed");
            return Err(Error::UnknownObject(id));
        }

        match self.objects.get_mut(&id) {
            Some(o) => Ok(o),
            None => {
                error!(%id, "unknown object");
                Err(Error::UnknownObject(id))
            }
        }
    }

    pub(crate) fn form_of(&self, id: ObjectId) -> Option<FormId> {
        self.objects.get(&id).and_then(|o| o.state.form)
    }

    /*
     * Forms
     */

    /// Create a new (hidden) form of the given size and open it for adding objects.
    ///
    /// The form starts out with a single inactive background box covering its full area.
    pub fn begin_form(&mut self, w: i32, h: i32) -> Result<FormId> {
        if let Some(open) = self.open_form {
            error!(%open, "begin_form called without closing the previous form");
            return Err(Error::FormAlreadyOpen(open));
        }

        let id = FormId(self.next_form);
        self.next_form += 1;
        debug!(%id, w, h, "creating form");

        self.forms.insert(Form::new(id, w, h));
        self.open_form = Some(id);

        let bg = Object::new(Rect::new(0, 0, w, h), "", StaticBox::new().boxed());
        self.attach(id, bg);

        Ok(id)
    }

    /// Close the currently open form. Any group left open is closed as well.
    pub fn end_form(&mut self) -> Result<FormId> {
        let id = match self.open_form {
            Some(id) => id,
            None => {
                error!("end_form called without a matching begin_form");
                return Err(Error::NoOpenForm);
            }
        };

        if self.open_group.is_some() {
            warn!(%id, "closing group left open at end_form");
            self.end_group()?;
        }
        self.open_form = None;

        Ok(id)
    }

    /// Open a new radio group in the current form: radio buttons added until the matching
    /// [Dispatcher::end_group] are mutually exclusive with one another.
    pub fn begin_group(&mut self) -> Result<ObjectId> {
        let form = self.open_form.ok_or_else(|| {
            error!("begin_group called outside of begin_form / end_form");
            Error::NoOpenForm
        })?;

        if self.open_group.is_some() {
            error!(%form, "begin_group called without closing the previous group");
            return Err(Error::GroupAlreadyOpen);
        }

        let group = self.next_group;
        self.next_group += 1;
        let id = self.attach(form, Object::marker(ObjClass::BeginGroup, group));
        self.open_group = Some(group);

        Ok(id)
    }

    /// Close the currently open group.
    pub fn end_group(&mut self) -> Result<ObjectId> {
        let form = self.open_form.ok_or(Error::NoOpenForm)?;
        let group = match self.open_group.take() {
            Some(g) => g,
            None => {
                error!(%form, "end_group called without a matching begin_group");
                return Err(Error::NoOpenGroup);
            }
        };

        Ok(self.attach(form, Object::marker(ObjClass::EndGroup, group)))
    }

    /// Show a hidden form in a new top level window with the given title.
    pub fn show_form(&mut self, id: FormId, title: &str) -> Result<Xid> {
        let form = self.form_mut(id)?;
        if let (Visibility::Visible, Some(win)) = (form.visibility, form.win) {
            debug!(%id, "form is already visible");
            return Ok(win);
        }

        if self.open_form == Some(id) {
            warn!(%id, "showing a form that is still open: closing it");
            self.open_form = None;
            self.open_group = None;
        }

        let r = self.form_mut(id)?.rect();
        let win = self.platform.create_window(r, title)?;
        info!(%id, %win, title, "showing form");

        let form = self.form_mut(id)?;
        form.win = Some(win);
        form.title = title.to_string();
        form.visibility = Visibility::Visible;
        self.forms.show(id);

        self.platform.map(win)?;
        self.draw_form(id);
        self.platform.flush();

        Ok(win)
    }

    /// Hide a visible form, destroying its window.
    ///
    /// Objects in the form holding the pointer or keyboard are sent the LEAVE, RELEASE and
    /// UNFOCUS events they would otherwise never see. Any visible child form is hidden first.
    pub fn hide_form(&mut self, id: FormId) -> Result<()> {
        let form = self.form_mut(id)?;
        if form.visibility != Visibility::Visible {
            error!(%id, "hide_form called for a form that is not visible");
            return Err(Error::FormNotVisible(id));
        }

        if let Some(child) = form.child {
            if self.forms.is_visible(child) {
                self.hide_form(child)?;
            }
        }

        let form = self.form_mut(id)?;
        form.visibility = Visibility::BeingHidden;
        let focus = form.focusobj;
        let held = [self.ix.mouseobj, self.ix.pushobj, focus];

        for obj in held.into_iter().flatten() {
            if self.form_of(obj) == Some(id) {
                handle::withdraw(self, obj);
            }
        }

        self.ix.forget_form(id);
        self.forms.hide(id);

        let form = self.form_mut(id)?;
        form.visibility = Visibility::Invisible;
        let win = form.win.take();
        debug!(%id, "hiding form");

        if let Some(win) = win {
            self.platform.unmap(win)?;
            self.platform.destroy_window(win)?;
        }
        self.platform.flush();

        Ok(())
    }

    /// Destroy a hidden form along with every object it contains.
    pub fn free_form(&mut self, id: FormId) -> Result<()> {
        let form = self.form_mut(id)?;
        if form.visibility != Visibility::Invisible {
            error!(%id, "free_form called for a visible form");
            return Err(Error::FormIsVisible(id));
        }

        let objects = take(&mut form.objects);
        let (parent, child) = (form.parent, form.child);

        if self.open_form == Some(id) {
            self.open_form = None;
            self.open_group = None;
        }

        debug!(%id, n_objects = objects.len(), "freeing form");
        for obj in objects {
            self.returned.retain(|&r| r != obj);
            self.ix.forget_object(obj);
            if let Some(o) = self.objects.get_mut(&obj) {
                o.state.form = None;
            }
            self.destroy_or_defer(obj);
        }

        if let Some(p) = parent.and_then(|p| self.forms.get_mut(p)) {
            p.child = None;
        }
        if let Some(c) = child.and_then(|c| self.forms.get_mut(c)) {
            c.parent = None;
        }

        self.form_callbacks.remove(&id);
        self.close_callbacks.remove(&id);
        self.ix.forget_form(id);
        self.forms.remove(id);

        Ok(())
    }

    /// Link `child` as embedded in `parent`: hiding the parent hides the child as well.
    pub fn link_forms(&mut self, parent: FormId, child: FormId) -> Result<()> {
        self.form_mut(child)?.parent = Some(parent);
        self.form_mut(parent)?.child = Some(child);

        Ok(())
    }

    /// Resize a form, recomputing the geometry of every object it contains.
    pub fn set_form_size(&mut self, id: FormId, w: i32, h: i32) -> Result<()> {
        self.resize_form(id, Size::new(w as f64, h as f64), true)
    }

    /// Scale a form by the given factors. The high resolution size is kept so that repeated
    /// scaling does not accumulate rounding errors.
    pub fn scale_form(&mut self, id: FormId, xsc: f64, ysc: f64) -> Result<()> {
        if xsc <= 0.0 || ysc <= 0.0 {
            error!(%id, xsc, ysc, "form scale factors must be positive");
            return Ok(());
        }

        let new = self.form_mut(id)?.size.scaled(xsc, ysc);
        self.resize_form(id, new, true)
    }

    pub(crate) fn resize_form(&mut self, id: FormId, new: Size, configure: bool) -> Result<()> {
        let form = self.form_mut(id)?;
        let old = form.size;
        if old == new {
            return Ok(());
        }

        trace!(%id, ?old, ?new, "rescaling form");
        form.size = new;
        let objects = form.objects.clone();
        let (win, r) = (form.win, form.rect());

        self.frozen(id, |d| {
            for obj in objects {
                if let Some(o) = d.objects.get_mut(&obj) {
                    o.state.rescale(old, new);
                }
                let pos = d.ix.pointer.pos;
                handle::send(d, obj, Event::new(EventKind::Resized, pos));
            }
            d.draw_form(id);
        })?;

        if let (true, Some(win)) = (configure, win) {
            self.platform.configure(win, r)?;
        }

        Ok(())
    }

    /// Move a form to the given position.
    pub fn set_form_position(&mut self, id: FormId, x: i32, y: i32) -> Result<()> {
        let form = self.form_mut(id)?;
        form.pos = Point::new(x, y);
        let (win, r) = (form.win, form.rect());

        if let Some(win) = win {
            self.platform.configure(win, r)?;
        }

        Ok(())
    }

    /// Set the window title of a form.
    pub fn set_form_title(&mut self, id: FormId, title: &str) -> Result<()> {
        let form = self.form_mut(id)?;
        form.title = title.to_string();

        if let Some(win) = form.win {
            self.platform.set_title(win, title)?;
        }

        Ok(())
    }

    /// Undo one call to [Dispatcher::deactivate_form].
    pub fn activate_form(&mut self, id: FormId) -> Result<()> {
        let form = self.form_mut(id)?;
        if form.deactivated == 0 {
            error!(%id, "activate_form called for a form that is already active");
            return Ok(());
        }

        form.deactivated -= 1;
        if form.deactivated == 0 {
            self.draw_form(id);
        }

        Ok(())
    }

    /// Stop a form from reacting to user interaction. Calls nest: the form becomes active again
    /// once [Dispatcher::activate_form] has been called as many times.
    pub fn deactivate_form(&mut self, id: FormId) -> Result<()> {
        let form = self.form_mut(id)?;
        form.deactivated += 1;
        if form.deactivated > 1 {
            return Ok(());
        }

        if let Some(obj) = self.ix.mouseobj.filter(|&o| self.form_of(o) == Some(id)) {
            handle::leave(self, obj);
        }
        if let Some(obj) = self.ix.pushobj.filter(|&o| self.form_of(o) == Some(id)) {
            handle::release_capture(self, obj);
        }
        self.draw_form(id);

        Ok(())
    }

    /// Intercept platform events of the given classes for a form before they are routed to its
    /// objects.
    pub fn register_raw_callback<F>(&mut self, id: FormId, mask: EventMask, f: F) -> Result<()>
    where
        F: RawCallback + 'static,
    {
        self.form_mut(id)?.raw_callbacks.push((mask, Box::new(f)));

        Ok(())
    }

    /// Set the callback run for objects in this form that have something to report and no
    /// callback of their own.
    pub fn set_form_callback<F>(&mut self, id: FormId, f: F) -> Result<()>
    where
        F: ObjectCallback<P> + 'static,
    {
        self.form_mut(id)?;
        self.form_callbacks.insert(id, Some(f.boxed()));

        Ok(())
    }

    /// Set the callback consulted when the window manager asks for this form to be closed.
    /// Without one the form is simply hidden.
    pub fn set_close_callback<F>(&mut self, id: FormId, f: F) -> Result<()>
    where
        F: CloseCallback<P> + 'static,
    {
        self.form_mut(id)?;
        self.close_callbacks.insert(id, Some(f.boxed()));

        Ok(())
    }

    /// Suspend drawing of a form for the duration of `f`, running a single redraw at the end if
    /// anything was drawn in the meantime. Calls nest: only the outermost exit redraws.
    pub fn frozen<T, F>(&mut self, id: FormId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> T,
    {
        self.form_mut(id)?.frozen += 1;
        let res = f(self);

        if let Some(form) = self.forms.get_mut(id) {
            form.frozen = form.frozen.saturating_sub(1);
            if form.frozen == 0 && form.needs_redraw {
                form.needs_redraw = false;
                self.draw_form(id);
            }
        }

        Ok(res)
    }

    /// Redraw every object in a form.
    pub fn redraw_form(&mut self, id: FormId) -> Result<()> {
        self.form_mut(id)?;
        self.draw_form(id);

        Ok(())
    }

    pub(crate) fn draw_form(&mut self, id: FormId) {
        let form = match self.forms.get_mut(id) {
            Some(f) if f.visibility == Visibility::Visible => f,
            _ => return,
        };

        if form.is_frozen() {
            form.needs_redraw = true;
            return;
        }

        form.needs_redraw = false;
        for obj in form.objects.iter() {
            if let Some(o) = self.objects.get_mut(obj) {
                o.draw();
            }
        }
    }

    pub(crate) fn draw_object(&mut self, id: ObjectId) {
        let form = match self.form_of(id).and_then(|f| self.forms.get_mut(f)) {
            Some(f) if f.visibility == Visibility::Visible => f,
            _ => return,
        };

        if form.is_frozen() {
            form.needs_redraw = true;
            return;
        }

        if let Some(o) = self.objects.get_mut(&id) {
            o.draw();
        }
    }

    /*
     * Objects
     */

    /// Add a new object to the currently open form.
    pub fn add_object(&mut self, obj: Object) -> Result<ObjectId> {
        match self.open_form {
            Some(form) => Ok(self.attach(form, obj)),
            None => {
                error!("add_object called outside of begin_form / end_form");
                Err(Error::NoOpenForm)
            }
        }
    }

    /// Create an object for the given widget and add it to the currently open form.
    pub fn add_widget<W>(&mut self, r: Rect, label: &str, widget: W) -> Result<ObjectId>
    where
        W: Widget + 'static,
    {
        self.add_object(Object::new(r, label, widget.boxed()))
    }

    /// Add a new object to a specific form.
    pub fn add_object_to(&mut self, form: FormId, obj: Object) -> Result<ObjectId> {
        self.form_mut(form)?;

        Ok(self.attach(form, obj))
    }

    /// Re-attach an object previously removed with [Dispatcher::delete_object].
    pub fn attach_object(&mut self, form: FormId, id: ObjectId) -> Result<()> {
        self.form_mut(form)?;
        let obj = self.obj_mut(id)?;
        if let Some(current) = obj.state.form {
            error!(%id, %current, "object is already attached to a form");
            return Ok(());
        }

        let size = self.form_mut(form)?.size;
        let obj = self.obj_mut(id)?;
        let r = obj.state.rect;
        obj.state.set_rect(r, size);
        self.link(form, id);

        Ok(())
    }

    fn attach(&mut self, form: FormId, mut obj: Object) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;

        obj.state.id = id;
        if self.open_form == Some(form) && !obj.state.class.is_group_marker() {
            obj.state.group = self.open_group.unwrap_or(0);
        }
        if let Some(f) = self.forms.get(form) {
            let r = obj.state.rect;
            obj.state.set_rect(r, f.size);
        }

        trace!(%id, %form, class = %obj.state.class, "adding object");
        self.objects.insert(id, obj);
        self.link(form, id);

        id
    }

    fn link(&mut self, form: FormId, id: ObjectId) {
        let automatic = match self.objects.get_mut(&id) {
            Some(o) => {
                o.state.form = Some(form);
                o.state.wants(ObjFlags::AUTOMATIC)
            }
            None => return,
        };

        if let Some(f) = self.forms.get_mut(form) {
            f.objects.push(id);
        }
        if automatic {
            self.adjust_automatic(form, true);
        }

        self.draw_object(id);
    }

    pub(crate) fn adjust_automatic(&mut self, form: FormId, gained: bool) {
        let f = match self.forms.get_mut(form) {
            Some(f) => f,
            None => return,
        };
        let visible = f.visibility == Visibility::Visible;

        if gained {
            f.n_automatic += 1;
            if visible && f.n_automatic == 1 {
                self.forms.acquire_auto();
            }
        } else if f.n_automatic == 0 {
            error!(%form, "automatic object count would go negative: clamping at zero");
        } else {
            f.n_automatic -= 1;
            if visible && f.n_automatic == 0 {
                self.forms.release_auto();
            }
        }
    }

    /// Remove an object from its form without destroying it. The object may be added back to a
    /// form later with [Dispatcher::attach_object].
    pub fn delete_object(&mut self, id: ObjectId) -> Result<()> {
        self.obj_mut(id)?;
        self.detach(id);

        Ok(())
    }

    fn detach(&mut self, id: ObjectId) {
        let form = match self.form_of(id) {
            Some(f) => f,
            None => return,
        };

        handle::withdraw(self, id);
        self.returned.retain(|&r| r != id);

        let automatic = match self.objects.get_mut(&id) {
            Some(o) => {
                o.state.form = None;
                o.state.wants(ObjFlags::AUTOMATIC)
            }
            None => false,
        };

        if let Some(f) = self.forms.get_mut(form) {
            f.objects.retain(|&o| o != id);
            if f.focusobj == Some(id) {
                f.focusobj = None;
            }
        }
        if automatic {
            self.adjust_automatic(form, false);
        }

        trace!(%id, %form, "detached object");
        self.draw_form(form);
    }

    /// Destroy an object and any children it has.
    ///
    /// The object is removed from its form immediately. If this is called from inside of a
    /// dispatch pass (from any callback) the object's widget is only sent
    /// [FreeMem][EventKind::FreeMem] once the pass completes.
    pub fn free_object(&mut self, id: ObjectId) -> Result<()> {
        let obj = self.obj_mut(id)?;
        let children = obj.state.children.clone();
        let parent = obj.state.parent.take();

        for child in children {
            if self.object(child).is_some() {
                self.free_object(child)?;
            }
        }

        if let Some(p) = parent.and_then(|p| self.objects.get_mut(&p)) {
            p.state.children.retain(|&c| c != id);
        }

        self.detach(id);
        self.ix.forget_object(id);
        self.destroy_or_defer(id);

        Ok(())
    }

    fn destroy_or_defer(&mut self, id: ObjectId) {
        if self.depth > 0 {
            trace!(%id, "deferring object destruction to the end of the dispatch pass");
            if !self.pending_free.contains(&id) {
                self.pending_free.push(id);
            }
        } else {
            self.destroy(id);
        }
    }

    fn destroy(&mut self, id: ObjectId) {
        self.object_callbacks.remove(&id);
        if let Some(obj) = self.objects.remove(&id) {
            trace!(%id, "destroying object");
            obj.free();
        }
    }

    pub(crate) fn sweep_pending_free(&mut self) {
        for id in take(&mut self.pending_free) {
            self.destroy(id);
        }
    }

    /// Make a composite child of `parent`. The child is added to the parent's form if it is not
    /// already in it and then follows the parent when it is shown, hidden or freed.
    pub fn add_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<()> {
        let form = self.obj_mut(parent)?.state.form.ok_or(Error::Orphan(parent))?;
        let c = self.obj_mut(child)?;
        match c.state.form {
            Some(f) if f != form => {
                error!(%child, %parent, "child and parent are in different forms");
                return Err(Error::Orphan(child));
            }
            Some(_) => (),
            None => self.attach_object(form, child)?,
        }

        self.obj_mut(child)?.state.parent = Some(parent);
        let p = self.obj_mut(parent)?;
        if !p.state.children.contains(&child) {
            p.state.children.push(child);
        }

        Ok(())
    }

    /// Show an object (and its children).
    pub fn show_object(&mut self, id: ObjectId) -> Result<()> {
        let obj = self.obj_mut(id)?;
        obj.state.visible = true;
        let children = obj.state.children.clone();

        for child in children {
            self.show_object(child)?;
        }
        self.draw_object(id);

        Ok(())
    }

    /// Hide an object (and its children). An object holding the pointer or keyboard is sent
    /// the events needed to give them up first.
    pub fn hide_object(&mut self, id: ObjectId) -> Result<()> {
        let children = self.obj_mut(id)?.state.children.clone();
        for child in children {
            self.hide_object(child)?;
        }

        handle::withdraw(self, id);
        self.obj_mut(id)?.state.visible = false;
        if let Some(form) = self.form_of(id) {
            self.draw_form(form);
        }

        Ok(())
    }

    /// Allow an object to react to user interaction.
    pub fn activate_object(&mut self, id: ObjectId) -> Result<()> {
        self.obj_mut(id)?.state.active = true;
        self.draw_object(id);

        Ok(())
    }

    /// Stop an object from reacting to user interaction.
    pub fn deactivate_object(&mut self, id: ObjectId) -> Result<()> {
        self.obj_mut(id)?;
        handle::withdraw(self, id);
        self.obj_mut(id)?.state.active = false;
        self.draw_object(id);

        Ok(())
    }

    /// Give keyboard focus to an object. Objects that are not input capable, active and visible
    /// are refused.
    pub fn set_focus_object(&mut self, id: ObjectId) -> Result<()> {
        let obj = self.obj_mut(id)?;
        if !obj.state.wants(ObjFlags::INPUT) || !obj.state.is_interactive() {
            warn!(%id, "refusing to focus an object that cannot take input");
            return Ok(());
        }

        let form = obj.state.form.ok_or(Error::Orphan(id))?;
        handle::set_focus(self, form, id);

        Ok(())
    }

    /// Move and resize an object, refreshing the distances to each form edge used when the form
    /// is resized.
    pub fn set_object_geometry(&mut self, id: ObjectId, r: Rect) -> Result<()> {
        let form = self.form_of(id);
        let size = form
            .and_then(|f| self.forms.get(f))
            .map(|f| f.size)
            .unwrap_or_else(|| r.size());

        self.obj_mut(id)?.state.set_rect(r, size);
        let pos = self.ix.pointer.pos;
        handle::send(self, id, Event::new(EventKind::Resized, pos));
        if let Some(form) = form {
            self.draw_form(form);
        }

        Ok(())
    }

    /// Set how the corners of an object follow the edges of its form when the form is resized.
    pub fn set_object_gravity(&mut self, id: ObjectId, nw: Gravity, se: Gravity) -> Result<()> {
        self.obj_mut(id)?.state.set_gravity(nw, se);

        Ok(())
    }

    /// Set the directions in which an object may be resized along with its form.
    pub fn set_object_resize(&mut self, id: ObjectId, resize: Resize) -> Result<()> {
        self.obj_mut(id)?.state.set_resize(resize);

        Ok(())
    }

    /// Replace the shortcuts of an object using the `^x` (control), `#x` (alt) and `&n`
    /// (function key) notation.
    pub fn set_object_shortcut(&mut self, id: ObjectId, spec: &str) -> Result<()> {
        let obj = self.obj_mut(id)?;
        obj.state.shortcuts = parse_shortcuts(spec).map_err(|e| {
            error!(%id, spec, "invalid shortcut");
            e
        })?;

        Ok(())
    }

    /// Set the callback run when an object has something to report.
    pub fn set_object_callback<F>(&mut self, id: ObjectId, f: F) -> Result<()>
    where
        F: ObjectCallback<P> + 'static,
    {
        self.obj_mut(id)?;
        self.object_callbacks.insert(id, Some(f.boxed()));

        Ok(())
    }

    /// Set when an object is reported to the application.
    pub fn set_object_return(&mut self, id: ObjectId, when: ReturnWhen) -> Result<()> {
        self.obj_mut(id)?.state.how_return = when;

        Ok(())
    }

    /// Mark an object as wanting (or no longer wanting) periodic STEP events.
    pub fn set_object_automatic(&mut self, id: ObjectId, automatic: bool) -> Result<()> {
        let obj = self.obj_mut(id)?;
        if obj.state.wants(ObjFlags::AUTOMATIC) == automatic {
            return Ok(());
        }

        obj.state.flags.set(ObjFlags::AUTOMATIC, automatic);
        if let Some(form) = obj.state.form {
            self.adjust_automatic(form, automatic);
        }

        Ok(())
    }

    /// Run `hook` before the object's own handler. Returning `true` from the hook preempts the
    /// handler for that event.
    pub fn set_object_prehandler<H>(&mut self, id: ObjectId, hook: H) -> Result<()>
    where
        H: ObjectHook + 'static,
    {
        self.obj_mut(id)?.prehandler = Some(Box::new(hook));

        Ok(())
    }

    /// Run `hook` after the object's own handler.
    pub fn set_object_posthandler<H>(&mut self, id: ObjectId, hook: H) -> Result<()>
    where
        H: ObjectHook + 'static,
    {
        self.obj_mut(id)?.posthandler = Some(Box::new(hook));

        Ok(())
    }

    /// Set the pushed state of an object. Pushing a radio object releases the other members of
    /// its group.
    pub fn set_object_pushed(&mut self, id: ObjectId, pushed: bool) -> Result<()> {
        let obj = self.obj_mut(id)?;
        if pushed && obj.state.wants(ObjFlags::RADIO) {
            handle::release_radio_siblings(self, id);
        }

        let obj = self.obj_mut(id)?;
        obj.state.pushed = pushed;
        self.draw_object(id);

        Ok(())
    }

    /// Queue an object to be reported as if the user had interacted with it.
    pub fn trigger_object(&mut self, id: ObjectId) -> Result<()> {
        self.obj_mut(id)?;
        self.returned.push_back(id);

        Ok(())
    }

    /// Redraw a single object.
    pub fn redraw_object(&mut self, id: ObjectId) -> Result<()> {
        self.obj_mut(id)?;
        self.draw_object(id);

        Ok(())
    }

    /*
     * Idle, timeouts, I/O and foreign windows
     */

    /// Set the idle callback, replacing any previous one.
    ///
    /// It is run at most once per idle pass and no more often than every `delta`. A zero `delta`
    /// runs it on every idle pass, with the loop waking at least every [Config::idle_delta].
    pub fn set_idle_callback<F>(&mut self, delta: Duration, f: F)
    where
        F: FnMut(&mut Self) + 'static,
    {
        self.idle.set_cadence(delta);
        self.idle.set(Some(Box::new(f)));
    }

    /// Remove the idle callback.
    pub fn clear_idle_callback(&mut self) {
        self.idle.set(None);
    }

    /// Run `f` once after `delay` has elapsed.
    pub fn add_timeout<F>(&mut self, delay: Duration, f: F) -> TimeoutId
    where
        F: FnMut(&mut Self, TimeoutId) + 'static,
    {
        self.timeouts.add(Instant::now(), delay, Box::new(f))
    }

    /// Cancel a pending timeout.
    pub fn remove_timeout(&mut self, id: TimeoutId) -> bool {
        self.timeouts.remove(id)
    }

    /// Run `f` whenever `fd` is ready for any of the conditions in `mask`. Returns `None` without
    /// registering anything if `fd` is negative.
    pub fn add_io_callback<F>(&mut self, fd: RawFd, mask: IoMask, f: F) -> Option<IoId>
    where
        F: FnMut(&mut Self, RawFd, IoMask) + 'static,
    {
        self.io.register(fd, mask, Box::new(f))
    }

    /// Stop watching `fd` for the conditions in `mask` on behalf of the callback `id`.
    pub fn remove_io_callback(&mut self, fd: RawFd, mask: IoMask, id: IoId) -> bool {
        self.io.unregister(fd, mask, id)
    }

    /// Handle platform events for a window that does not belong to any form.
    pub fn add_event_callback<F>(&mut self, win: Xid, f: F)
    where
        F: EventCallback<P> + 'static,
    {
        self.event_callbacks.insert(win, Some(f.boxed()));
    }

    /// Remove the event callback for a window.
    pub fn remove_event_callback(&mut self, win: Xid) {
        self.event_callbacks.remove(&win);
    }

    /// The oldest queued platform event for a window that has no form and no event callback.
    pub fn next_foreign_event(&mut self) -> Option<XEvent> {
        self.foreign.pop_front()
    }

    /*
     * Running
     */

    /// Run the interaction loop until an object has something to report, returning its id.
    ///
    /// Objects with a callback (or in a form with a form callback) have that run instead of
    /// being returned. `None` is returned if there is nothing left that could ever produce an
    /// event: no visible forms, timeouts, idle callback or I/O watches.
    pub fn do_forms(&mut self) -> Result<Option<ObjectId>> {
        self.run(true)
    }

    /// Run a single non-blocking step of the interaction loop, returning an object that has
    /// something to report if there is one.
    pub fn check_forms(&mut self) -> Result<Option<ObjectId>> {
        self.run(false)
    }

    fn run(&mut self, block: bool) -> Result<Option<ObjectId>> {
        let max = self.config.max_dispatch_depth;
        if self.depth >= max {
            error!(depth = self.depth, "interaction loop re-entered too deeply");
            return Err(Error::DispatchTooDeep(max));
        }

        self.depth += 1;
        let res = self.run_inner(block);
        if self.depth == 1 {
            self.sweep_pending_free();
        }
        self.depth -= 1;

        res
    }

    fn run_inner(&mut self, block: bool) -> Result<Option<ObjectId>> {
        loop {
            if let Some(id) = self.next_returned() {
                return Ok(Some(id));
            }

            if !block {
                self.interaction_step(false)?;
                return Ok(self.next_returned());
            }

            if self.nothing_can_happen() {
                warn!("no visible forms or pending callbacks: nothing left to wait for");
                return Ok(None);
            }

            self.interaction_step(true)?;
        }
    }

    fn nothing_can_happen(&self) -> bool {
        self.forms.n_visible() == 0
            && self.io.is_empty()
            && self.timeouts.is_empty()
            && !self.idle.is_set()
            && self.lookahead.is_empty()
    }

    /// Pop reported objects, running their callbacks, until one is found that should be handed
    /// back to the caller.
    fn next_returned(&mut self) -> Option<ObjectId> {
        while let Some(id) = self.returned.pop_front() {
            let form = match self.object(id) {
                Some(o) => o.state.form,
                None => continue,
            };

            let cb = self.object_callbacks.get_mut(&id).and_then(Option::take);
            if let Some(mut cb) = cb {
                trace!(%id, "running object callback");
                if let Err(e) = cb.call(self, id) {
                    error!(%e, %id, "error running object callback");
                }
                if let Some(slot @ None) = self.object_callbacks.get_mut(&id) {
                    *slot = Some(cb);
                }
                if self.depth == 1 {
                    self.sweep_pending_free();
                }
                continue;
            }

            let cb = form
                .and_then(|f| self.form_callbacks.get_mut(&f))
                .and_then(Option::take);
            if let (Some(mut cb), Some(form)) = (cb, form) {
                trace!(%id, %form, "running form callback");
                if let Err(e) = cb.call(self, id) {
                    error!(%e, %id, %form, "error running form callback");
                }
                if let Some(slot @ None) = self.form_callbacks.get_mut(&form) {
                    *slot = Some(cb);
                }
                if self.depth == 1 {
                    self.sweep_pending_free();
                }
                continue;
            }

            return Some(id);
        }

        None
    }

    /// Handle a single platform event or, if there is none (or too many have been handled in a
    /// row), wait for I/O and run an idle pass.
    fn interaction_step(&mut self, block: bool) -> Result<()> {
        if self.since_idle < self.config.event_priority {
            if let Some(e) = self.next_platform_event()? {
                self.since_idle += 1;
                handle::platform_event(self, e)?;
                self.platform.flush();
                return Ok(());
            }
        } else if self.lookahead.is_empty() {
            if let Some(e) = self.platform.poll_event()? {
                self.lookahead.push_back(e);
            }
        }

        self.since_idle = 0;
        let timeout = if block && self.lookahead.is_empty() {
            self.sleep_duration(Instant::now())
        } else {
            Duration::ZERO
        };

        let fd = self.platform.connection_fd();
        IoWatches::wait(self, timeout, fd);
        handle::idle_pass(self);
        self.platform.flush();

        Ok(())
    }

    fn sleep_duration(&self, now: Instant) -> Duration {
        let wants_update = self
            .ix
            .pushobj
            .and_then(|id| self.objects.get(&id))
            .map(|o| o.state.wants(ObjFlags::WANT_UPDATE))
            .unwrap_or(false);

        let mut d = self.config.max_sleep;
        if self.forms.auto_count() > 0 || wants_update {
            d = d.min(self.config.idle_delta);
        }
        if let Some(due) = self.idle.due_in(now) {
            d = d.min(if self.idle.cadence().is_zero() {
                self.config.idle_delta
            } else {
                due
            });
        }
        if let Some(deadline) = self.timeouts.next_deadline() {
            d = d.min(deadline.saturating_duration_since(now));
        }

        d
    }

    /// The next platform event with consecutive motion and expose events for the same window
    /// coalesced.
    fn next_platform_event(&mut self) -> Result<Option<XEvent>> {
        let mut ev = match self.lookahead.pop_front() {
            Some(e) => e,
            None => match self.platform.poll_event()? {
                Some(e) => e,
                None => return Ok(None),
            },
        };

        loop {
            let next = match self.lookahead.pop_front() {
                Some(e) => e,
                None => match self.platform.poll_event()? {
                    Some(e) => e,
                    None => break,
                },
            };

            match (ev, next) {
                (XEvent::Motion(a), XEvent::Motion(b))
                    if self.config.compress_motion && a.id == b.id =>
                {
                    ev = next;
                }

                (XEvent::Expose { id, r, .. }, XEvent::Expose { id: id2, r: r2, count })
                    if self.config.compress_expose && id == id2 =>
                {
                    ev = XEvent::Expose {
                        id,
                        r: r.union(&r2),
                        count,
                    };
                }

                _ => {
                    self.lookahead.push_front(next);
                    break;
                }
            }
        }

        Ok(Some(ev))
    }

    pub(crate) fn queue_foreign(&mut self, e: XEvent) {
        if self.foreign.len() >= MAX_FOREIGN_EVENTS {
            warn!(dropped = ?self.foreign.front(), "foreign event queue full: dropping oldest");
            self.foreign.pop_front();
        }

        self.foreign.push_back(e);
    }

    pub(crate) fn report(&mut self, id: ObjectId) {
        trace!(%id, "queueing object for the application");
        self.returned.push_back(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::widgets::Button,
        x::mock::{Op, ScriptedPlatform},
    };

    fn dispatcher() -> Dispatcher<ScriptedPlatform> {
        Dispatcher::new(Config::default(), ScriptedPlatform::new()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config {
            event_priority: 0,
            ..Config::default()
        };

        assert!(Dispatcher::new(config, ScriptedPlatform::new()).is_err());
    }

    #[test]
    fn begin_form_adds_a_background_box() {
        let mut d = dispatcher();
        let f = d.begin_form(200, 100).unwrap();
        d.end_form().unwrap();

        let form = d.form(f).unwrap();
        assert_eq!(form.objects().len(), 1);
        let bg = d.object(form.objects()[0]).unwrap().state();
        assert_eq!(bg.rect(), Rect::new(0, 0, 200, 100));
        assert!(!bg.is_active());
    }

    #[test]
    fn begin_form_twice_is_an_error() {
        let mut d = dispatcher();
        d.begin_form(10, 10).unwrap();

        assert!(matches!(d.begin_form(10, 10), Err(Error::FormAlreadyOpen(_))));
    }

    #[test]
    fn end_form_without_begin_is_an_error() {
        let mut d = dispatcher();

        assert!(matches!(d.end_form(), Err(Error::NoOpenForm)));
        assert!(matches!(d.end_group(), Err(Error::NoOpenForm)));
    }

    #[test]
    fn groups_do_not_nest() {
        let mut d = dispatcher();
        d.begin_form(10, 10).unwrap();
        d.begin_group().unwrap();

        assert!(matches!(d.begin_group(), Err(Error::GroupAlreadyOpen)));
    }

    #[test]
    fn objects_in_a_group_get_its_id() {
        let mut d = dispatcher();
        d.begin_form(100, 100).unwrap();
        let outside = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::radio()).unwrap();
        d.begin_group().unwrap();
        let inside = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::radio()).unwrap();
        d.end_group().unwrap();
        d.end_form().unwrap();

        assert_eq!(d.object(outside).unwrap().state().group(), 0);
        assert_ne!(d.object(inside).unwrap().state().group(), 0);
    }

    #[test]
    fn show_and_hide_move_between_partitions() {
        let mut d = dispatcher();
        let f = d.begin_form(100, 50).unwrap();
        d.end_form().unwrap();

        let win = d.show_form(f, "test").unwrap();
        assert!(d.forms().is_visible(f));
        assert_eq!(
            &d.platform().ops()[..3],
            &[
                Op::Create(win, Rect::new(0, 0, 100, 50)),
                Op::Title(win, "test".to_string()),
                Op::Map(win)
            ]
        );

        d.hide_form(f).unwrap();
        assert!(!d.forms().is_visible(f));
        assert_eq!(d.form(f).unwrap().win(), None);
        assert!(d.platform().ops().contains(&Op::Destroy(win)));
    }

    #[test]
    fn visible_forms_cannot_be_freed() {
        let mut d = dispatcher();
        let f = d.begin_form(100, 50).unwrap();
        d.end_form().unwrap();
        d.show_form(f, "test").unwrap();

        assert!(matches!(d.free_form(f), Err(Error::FormIsVisible(_))));
        d.hide_form(f).unwrap();
        assert!(d.free_form(f).is_ok());
        assert!(d.form(f).is_none());
    }

    #[test]
    fn hiding_a_hidden_form_is_an_error() {
        let mut d = dispatcher();
        let f = d.begin_form(100, 50).unwrap();
        d.end_form().unwrap();

        assert!(matches!(d.hide_form(f), Err(Error::FormNotVisible(_))));
    }

    #[test]
    fn automatic_count_follows_visibility() {
        let mut d = dispatcher();
        let f = d.begin_form(100, 50).unwrap();
        let b = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::normal()).unwrap();
        d.end_form().unwrap();
        d.set_object_automatic(b, true).unwrap();
        assert_eq!(d.forms().auto_count(), 0);

        d.show_form(f, "").unwrap();
        assert_eq!(d.forms().auto_count(), 1);

        d.set_object_automatic(b, false).unwrap();
        assert_eq!(d.forms().auto_count(), 0);

        d.set_object_automatic(b, true).unwrap();
        d.hide_form(f).unwrap();
        assert_eq!(d.forms().auto_count(), 0);
    }

    #[test]
    fn deleted_objects_can_be_reattached() {
        let mut d = dispatcher();
        let f = d.begin_form(100, 50).unwrap();
        let b = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::normal()).unwrap();
        d.end_form().unwrap();

        d.delete_object(b).unwrap();
        assert!(!d.form(f).unwrap().objects().contains(&b));
        assert_eq!(d.object(b).unwrap().state().form(), None);

        d.attach_object(f, b).unwrap();
        assert_eq!(d.form(f).unwrap().objects().last(), Some(&b));
    }

    #[test]
    fn freeing_a_parent_frees_its_children() {
        let mut d = dispatcher();
        d.begin_form(100, 50).unwrap();
        let p = d.add_widget(Rect::new(0, 0, 50, 50), "", Button::normal()).unwrap();
        let c = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::normal()).unwrap();
        d.end_form().unwrap();
        d.add_child(p, c).unwrap();

        d.free_object(p).unwrap();

        assert!(d.object(p).is_none());
        assert!(d.object(c).is_none());
    }

    #[test]
    fn focus_is_refused_for_non_input_objects() {
        let mut d = dispatcher();
        let f = d.begin_form(100, 50).unwrap();
        let b = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::normal()).unwrap();
        d.end_form().unwrap();

        d.set_focus_object(b).unwrap();

        assert_eq!(d.form(f).unwrap().focus(), None);
    }

    #[test]
    fn shortcuts_are_validated() {
        let mut d = dispatcher();
        d.begin_form(100, 50).unwrap();
        let b = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::normal()).unwrap();

        assert!(d.set_object_shortcut(b, "^").is_err());
        assert!(d.set_object_shortcut(b, "^q").is_ok());
    }

    #[test]
    fn do_forms_returns_none_when_nothing_can_happen() {
        let mut d = dispatcher();

        assert_eq!(d.do_forms().unwrap(), None);
    }

    #[test]
    fn triggered_objects_are_returned() {
        let mut d = dispatcher();
        d.begin_form(100, 50).unwrap();
        let b = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::normal()).unwrap();
        d.end_form().unwrap();

        d.trigger_object(b).unwrap();

        assert_eq!(d.do_forms().unwrap(), Some(b));
    }

    #[test]
    fn reentering_too_deeply_is_an_error() {
        let config = Config {
            max_dispatch_depth: 1,
            ..Config::default()
        };
        let mut d = Dispatcher::new(config, ScriptedPlatform::new()).unwrap();
        d.begin_form(100, 50).unwrap();
        let b = d.add_widget(Rect::new(0, 0, 10, 10), "", Button::normal()).unwrap();
        d.end_form().unwrap();

        let errors = std::rc::Rc::new(std::cell::RefCell::new(vec![]));
        let e = errors.clone();
        d.set_object_callback(b, move |d: &mut Dispatcher<ScriptedPlatform>, _: ObjectId| -> Result<()> {
            if let Err(err) = d.check_forms() {
                e.borrow_mut().push(err.to_string());
            }
            Ok(())
        })
        .unwrap();

        d.trigger_object(b).unwrap();
        d.check_forms().unwrap();

        assert_eq!(errors.borrow().len(), 1);
    }
}
