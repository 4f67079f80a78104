//! Side effect free state used by the dispatcher
pub mod geometry;
pub mod registry;

#[doc(inline)]
pub use geometry::{Gravity, Placement, Point, Rect, Resize, Size};
#[doc(inline)]
pub use registry::Registry;
