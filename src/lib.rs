//! # xforms: the interaction core of an X11 forms toolkit
//!
//! This crate provides the parts of a forms toolkit that are not drawing: a registry of forms
//! split into visible and hidden partitions, the objects (widgets) those forms contain, a
//! geometry engine that keeps objects anchored correctly when a form is resized, and the event
//! dispatcher that routes one platform event at a time to exactly one object while tracking
//! mouse capture and keyboard focus. I/O watches, timeouts and a single idle callback are
//! multiplexed alongside the X event queue on a single thread.
//!
//! Widgets plug in through the [Widget][core::object::Widget] trait and never need to know
//! anything about the dispatcher beyond the events they are sent.
//!
//! ## Getting started
//! ```no_run
//! use xforms::{
//!     core::{widgets::Button, Config, Dispatcher},
//!     pure::geometry::Rect,
//!     x11rb::X11rbPlatform,
//! };
//!
//! fn main() -> xforms::Result<()> {
//!     let mut d = Dispatcher::new(Config::default(), X11rbPlatform::new()?)?;
//!
//!     let form = d.begin_form(200, 100)?;
//!     let ok = d.add_widget(Rect::new(50, 30, 100, 40), "Ok", Button::normal())?;
//!     d.end_form()?;
//!     d.show_form(form, "hello")?;
//!
//!     while let Some(id) = d.do_forms()? {
//!         if id == ok {
//!             break;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
#![warn(
    clippy::complexity,
    clippy::correctness,
    clippy::style,
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    rustdoc::all
)]

use std::{fmt, ops::Deref};

pub mod core;
pub mod pure;
pub mod x;
#[cfg(feature = "x11rb")]
pub mod x11rb;

#[doc(inline)]
pub use crate::core::{Config, Dispatcher};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
        pub struct $name(pub(crate) u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Deref for $name {
            type Target = u32;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// An X11 ID for a given window
    Xid
);
id_type!(
    /// A handle on a [Form][crate::core::form::Form] known to a [Dispatcher]
    FormId
);
id_type!(
    /// A handle on an [Object][crate::core::object::Object] known to a [Dispatcher]
    ObjectId
);

/// Error variants from the core xforms library.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The synthetic event dispatch chain recursed further than the configured limit
    #[error("dispatch recursion limit of {0} exceeded")]
    DispatchTooDeep(usize),

    /// `begin_form` was called while another form was still being populated
    #[error("form {0} is already open: call end_form first")]
    FormAlreadyOpen(FormId),

    /// The requested operation is only valid for hidden forms
    #[error("form {0} is currently visible")]
    FormIsVisible(FormId),

    /// The requested operation is only valid for visible forms
    #[error("form {0} is not visible")]
    FormNotVisible(FormId),

    /// `begin_group` was called while another group was still open
    #[error("a group is already open in the current form")]
    GroupAlreadyOpen,

    /// The supplied [Config] failed validation
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A shortcut specification could not be parsed
    #[error("invalid shortcut specification: '{0}'")]
    InvalidShortcut(String),

    /// An operation requiring an open form was called outside of begin_form / end_form
    #[error("there is no form currently open")]
    NoOpenForm,

    /// `end_group` was called without a matching `begin_group`
    #[error("there is no group currently open")]
    NoOpenGroup,

    /// The object is not attached to any form
    #[error("object {0} is not attached to a form")]
    Orphan(ObjectId),

    /// A generic error from a [Platform][crate::x::Platform] implementation
    #[error("platform error: {0}")]
    Platform(String),

    /// Waiting on the registered file descriptors failed
    #[error("unable to poll file descriptors: {0}")]
    Poll(#[from] nix::errno::Errno),

    /// An attempt was made to reference a form that is not known to the dispatcher
    #[error("{0} is not a known form")]
    UnknownForm(FormId),

    /// An attempt was made to reference an object that is not known to the dispatcher
    #[error("{0} is not a known object")]
    UnknownObject(ObjectId),

    /// Something went wrong using the [x11rb][crate::x11rb] module.
    ///
    /// See [X11rbError][crate::x11rb::X11rbError] for variants.
    #[cfg(feature = "x11rb")]
    #[error(transparent)]
    X11rb(#[from] crate::x11rb::X11rbError),
}

/// A Result where the error type is an xforms [Error]
pub type Result<T> = std::result::Result<T, Error>;
