//! Traits for writing and composing application callbacks
use crate::{core::Dispatcher, x::Platform, x::XEvent, FormId, ObjectId, Result};
use std::fmt;

/// Called when an object has something to report to the application.
///
/// Object callbacks are run from [Dispatcher::do_forms] in place of returning the object to the
/// caller. They are free to make any changes to the dispatcher they like, including freeing the
/// object they were called for.
pub trait ObjectCallback<P>
where
    P: Platform,
{
    /// Run this callback
    fn call(&mut self, d: &mut Dispatcher<P>, id: ObjectId) -> Result<()>;

    /// Convert to a trait object
    fn boxed(self) -> Box<dyn ObjectCallback<P>>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }

    /// Compose this callback with another [ObjectCallback]. The second callback is skipped if
    /// this one returns an error.
    fn then<C>(self, next: C) -> ComposedObjectCallback<P>
    where
        C: ObjectCallback<P> + 'static,
        Self: Sized + 'static,
    {
        ComposedObjectCallback {
            first: Box::new(self),
            second: Box::new(next),
        }
    }
}

impl<P: Platform> fmt::Debug for Box<dyn ObjectCallback<P>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCallback").finish()
    }
}

/// The result of composing two object callbacks using `then`
#[derive(Debug)]
pub struct ComposedObjectCallback<P>
where
    P: Platform,
{
    first: Box<dyn ObjectCallback<P>>,
    second: Box<dyn ObjectCallback<P>>,
}

impl<P> ObjectCallback<P> for ComposedObjectCallback<P>
where
    P: Platform,
{
    fn call(&mut self, d: &mut Dispatcher<P>, id: ObjectId) -> Result<()> {
        self.first.call(d, id)?;
        self.second.call(d, id)
    }
}

impl<F, P> ObjectCallback<P> for F
where
    F: FnMut(&mut Dispatcher<P>, ObjectId) -> Result<()>,
    P: Platform,
{
    fn call(&mut self, d: &mut Dispatcher<P>, id: ObjectId) -> Result<()> {
        (self)(d, id)
    }
}

/// Called with platform events for windows that do not belong to any form.
pub trait EventCallback<P>
where
    P: Platform,
{
    /// Run this callback
    fn call(&mut self, d: &mut Dispatcher<P>, event: &XEvent) -> Result<()>;

    /// Convert to a trait object
    fn boxed(self) -> Box<dyn EventCallback<P>>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl<P: Platform> fmt::Debug for Box<dyn EventCallback<P>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCallback").finish()
    }
}

impl<F, P> EventCallback<P> for F
where
    F: FnMut(&mut Dispatcher<P>, &XEvent) -> Result<()>,
    P: Platform,
{
    fn call(&mut self, d: &mut Dispatcher<P>, event: &XEvent) -> Result<()> {
        (self)(d, event)
    }
}

/// Called when the window manager asks for a form to be closed. Return `true` to allow the
/// form to be hidden.
pub trait CloseCallback<P>
where
    P: Platform,
{
    /// Run this callback
    fn call(&mut self, d: &mut Dispatcher<P>, form: FormId) -> Result<bool>;

    /// Convert to a trait object
    fn boxed(self) -> Box<dyn CloseCallback<P>>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl<P: Platform> fmt::Debug for Box<dyn CloseCallback<P>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseCallback").finish()
    }
}

impl<F, P> CloseCallback<P> for F
where
    F: FnMut(&mut Dispatcher<P>, FormId) -> Result<bool>,
    P: Platform,
{
    fn call(&mut self, d: &mut Dispatcher<P>, form: FormId) -> Result<bool> {
        (self)(d, form)
    }
}
