//! Geometry primitives and the gravity engine used when forms are resized
//!
//! Every object remembers, in floating point, how far each of its two defining corners sits from
//! all four edges of its form. When the form changes size, each corner on each axis is asked
//! independently whether it is pinned to the near edge, the far edge or neither, and the new
//! position is derived from whichever distance is being held constant. Working from the stored
//! distances rather than the rounded integer boxes means that repeated rescaling does not
//! accumulate rounding error.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::cmp::{max, min};
use strum::{AsRefStr, EnumIter};

/// An x,y coordinate pair
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Point {
    /// An x coordinate relative to the containing window
    pub x: i32,
    /// A y coordinate relative to the containing window
    pub y: i32,
}

impl Point {
    /// Create a new Point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from(raw: (i32, i32)) -> Self {
        let (x, y) = raw;

        Self { x, y }
    }
}

/// A window or object position: top left corner + extent
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Rect {
    /// The x-coordinate of the top left corner of this rect
    pub x: i32,
    /// The y-coordinate of the top left corner of this rect
    pub y: i32,
    /// The width of this rect
    pub w: i32,
    /// The height of this rect
    pub h: i32,
}

impl Rect {
    /// Create a new Rect.
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Rect {
        Rect { x, y, w, h }
    }

    /// Check whether a given [Point] lies within this Rect.
    ///
    /// The right and bottom edges are exclusive so that adjacent objects never both claim the
    /// same pixel.
    /// ```
    /// # use xforms::pure::geometry::{Rect, Point};
    /// let r = Rect::new(10, 10, 20, 20);
    ///
    /// assert!(r.contains_point(Point::new(10, 10)));
    /// assert!(!r.contains_point(Point::new(30, 30)));
    /// ```
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.w && p.y >= self.y && p.y < self.y + self.h
    }

    /// The smallest Rect containing both this Rect and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = min(self.x, other.x);
        let y = min(self.y, other.y);
        let x2 = max(self.x + self.w, other.x + other.w);
        let y2 = max(self.y + self.h, other.y + other.h);

        Rect::new(x, y, x2 - x, y2 - y)
    }

    /// The width and height of this Rect as a high resolution [Size].
    pub fn size(&self) -> Size {
        Size::new(self.w as f64, self.h as f64)
    }
}

/// A high resolution form size used to track incremental scaling without accumulating rounding
/// error.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Debug, PartialEq, Clone, Copy)]
pub struct Size {
    /// The width in (fractional) pixels
    pub w: f64,
    /// The height in (fractional) pixels
    pub h: f64,
}

impl Size {
    /// Create a new Size.
    pub const fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }

    /// This size multiplied by the given scale factors.
    pub fn scaled(&self, xsc: f64, ysc: f64) -> Self {
        Self::new(self.w * xsc, self.h * ysc)
    }

    /// The integer width and height obtained by rounding half away from zero.
    pub fn rounded(&self) -> (i32, i32) {
        (self.w.round() as i32, self.h.round() as i32)
    }
}

/// Anchoring rule for one corner of an object.
///
/// Mirrors the X11 window gravity values: a corner with `NorthWest` gravity stays a fixed
/// distance from the top and left edges of its form, `SouthEast` from the bottom and right
/// edges and so on. `NoGravity` leaves the corner free on both axes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
pub enum Gravity {
    /// Not anchored to any edge
    #[default]
    NoGravity,
    /// Anchored to the top and left edges
    NorthWest,
    /// Anchored to the top edge
    North,
    /// Anchored to the top and right edges
    NorthEast,
    /// Anchored to the left edge
    West,
    /// Not anchored to any edge (kept for parity with X11 gravity values)
    Center,
    /// Anchored to the right edge
    East,
    /// Anchored to the bottom and left edges
    SouthWest,
    /// Anchored to the bottom edge
    South,
    /// Anchored to the bottom and right edges
    SouthEast,
}

impl Gravity {
    fn horizontal(&self) -> Anchor {
        match self {
            Self::NorthWest | Self::West | Self::SouthWest => Anchor::Near,
            Self::NorthEast | Self::East | Self::SouthEast => Anchor::Far,
            _ => Anchor::Free,
        }
    }

    fn vertical(&self) -> Anchor {
        match self {
            Self::NorthWest | Self::North | Self::NorthEast => Anchor::Near,
            Self::SouthWest | Self::South | Self::SouthEast => Anchor::Far,
            _ => Anchor::Free,
        }
    }
}

bitflags::bitflags! {
    /// The axes along which an object is permitted to change size when its form is resized.
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Resize: u8 {
        /// Never change size
        const NONE = 0;
        /// Stretch horizontally
        const X = 1 << 0;
        /// Stretch vertically
        const Y = 1 << 1;
        /// Stretch along both axes
        const ALL = Self::X.bits() | Self::Y.bits();
    }
}

impl Default for Resize {
    fn default() -> Self {
        Self::ALL
    }
}

/// Which edge (if any) a single corner is pinned to along a single axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Near,
    Far,
    Free,
}

/// The distances of a pair of corners from the near edge of a form along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    start: f64,
    end: f64,
}

impl Span {
    fn rescale(self, old_len: f64, new_len: f64, a1: Anchor, a2: Anchor, stretch: bool) -> Self {
        let s = if old_len > 0.0 { new_len / old_len } else { 1.0 };
        let size = self.end - self.start;
        let new_size = if stretch { size * s } else { size };

        // Distance of each corner from the far edge before the resize
        let far1 = old_len - self.start;
        let far2 = old_len - self.end;

        let pinned = |a: Anchor, near: f64, far: f64| match a {
            Anchor::Near => Some(near),
            Anchor::Far => Some(new_len - far),
            Anchor::Free => None,
        };

        let (start, end) = match (
            pinned(a1, self.start, far1),
            pinned(a2, self.end, far2),
        ) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, start + new_size),
            (None, Some(end)) => (end - new_size, end),
            (None, None) if stretch => (self.start * s, self.end * s),
            (None, None) => {
                let centre = (self.start + self.end) / 2.0 * s;
                (centre - size / 2.0, centre + size / 2.0)
            }
        };

        Self { start, end }
    }
}

/// The placement of an object within its form: distances of the upper left and lower right
/// corners from the form edges, plus the gravity and resize rules used to update them.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    left1: f64,
    top1: f64,
    left2: f64,
    top2: f64,
    right1: f64,
    bottom1: f64,
    right2: f64,
    bottom2: f64,
    /// Gravity of the upper left corner
    pub nw_gravity: Gravity,
    /// Gravity of the lower right corner
    pub se_gravity: Gravity,
    /// Axes along which the object may stretch
    pub resize: Resize,
}

impl Placement {
    /// Record the position of `r` inside of a form of the given size.
    pub fn new(r: Rect, form: Size) -> Self {
        let mut p = Self {
            left1: 0.0,
            top1: 0.0,
            left2: 0.0,
            top2: 0.0,
            right1: 0.0,
            bottom1: 0.0,
            right2: 0.0,
            bottom2: 0.0,
            nw_gravity: Gravity::NoGravity,
            se_gravity: Gravity::NoGravity,
            resize: Resize::ALL,
        };
        p.set_rect(r, form);

        p
    }

    /// Explicitly move the object to `r`, refreshing all stored edge distances.
    pub fn set_rect(&mut self, r: Rect, form: Size) {
        self.left1 = r.x as f64;
        self.top1 = r.y as f64;
        self.left2 = (r.x + r.w) as f64;
        self.top2 = (r.y + r.h) as f64;
        self.sync_far_edges(form);
    }

    fn sync_far_edges(&mut self, form: Size) {
        self.right1 = form.w - self.left1;
        self.bottom1 = form.h - self.top1;
        self.right2 = form.w - self.left2;
        self.bottom2 = form.h - self.top2;
    }

    /// Distances of the upper left corner from the (left, top, right, bottom) form edges.
    pub fn upper_left_distances(&self) -> (f64, f64, f64, f64) {
        (self.left1, self.top1, self.right1, self.bottom1)
    }

    /// Distances of the lower right corner from the (left, top, right, bottom) form edges.
    pub fn lower_right_distances(&self) -> (f64, f64, f64, f64) {
        (self.left2, self.top2, self.right2, self.bottom2)
    }

    /// Recompute the stored edge distances after the containing form changed size from `old`
    /// to `new`.
    pub fn rescale(&mut self, old: Size, new: Size) {
        let (nw, se) = (self.nw_gravity, self.se_gravity);

        let h = Span {
            start: self.left1,
            end: self.left2,
        }
        .rescale(
            old.w,
            new.w,
            nw.horizontal(),
            se.horizontal(),
            self.resize.contains(Resize::X),
        );

        let v = Span {
            start: self.top1,
            end: self.top2,
        }
        .rescale(
            old.h,
            new.h,
            nw.vertical(),
            se.vertical(),
            self.resize.contains(Resize::Y),
        );

        self.left1 = h.start;
        self.left2 = h.end;
        self.top1 = v.start;
        self.top2 = v.end;
        self.sync_far_edges(new);
    }

    /// The integer bounding box for this placement, rounding half away from zero.
    pub fn rect(&self) -> Rect {
        let x = self.left1.round() as i32;
        let y = self.top1.round() as i32;

        Rect {
            x,
            y,
            w: (self.left2 - self.left1).round() as i32,
            h: (self.top2 - self.top1).round() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use simple_test_case::test_case;
    use strum::IntoEnumIterator;

    use Gravity::*;

    fn r(x: i32, y: i32, w: i32, h: i32) -> Rect {
        Rect::new(x, y, w, h)
    }

    fn scaled(rect: Rect, nw: Gravity, se: Gravity, resize: Resize, to: (f64, f64)) -> Rect {
        let form = Size::new(400.0, 300.0);
        let mut p = Placement::new(rect, form);
        p.nw_gravity = nw;
        p.se_gravity = se;
        p.resize = resize;
        p.rescale(form, Size::new(to.0, to.1));

        p.rect()
    }

    #[test_case(NorthWest, NorthWest, r(100, 100, 50, 50); "pinned top left")]
    #[test_case(SouthEast, SouthEast, r(500, 100, 50, 50); "pinned bottom right")]
    #[test_case(NorthWest, SouthEast, r(100, 100, 450, 50); "stretched between corners")]
    #[test_case(NorthWest, NoGravity, r(100, 100, 100, 50); "left pinned and free right")]
    #[test_case(NoGravity, NorthEast, r(450, 100, 100, 50); "right pinned and free left")]
    #[test]
    fn gravity_under_horizontal_growth(nw: Gravity, se: Gravity, expected: Rect) {
        let res = scaled(r(100, 100, 50, 50), nw, se, Resize::ALL, (800.0, 300.0));

        assert_eq!(res, expected);
    }

    #[test_case(Resize::ALL, (800.0, 300.0), r(200, 100, 100, 50); "stretch scales edges")]
    #[test_case(Resize::NONE, (800.0, 300.0), r(225, 100, 50, 50); "fixed size keeps centre")]
    #[test_case(Resize::NONE, (200.0, 150.0), r(38, 38, 50, 50); "fixed size shrinking")]
    #[test_case(Resize::X, (800.0, 600.0), r(200, 225, 100, 50); "stretch x only")]
    #[test]
    fn no_gravity(resize: Resize, to: (f64, f64), expected: Rect) {
        let res = scaled(r(100, 100, 50, 50), NoGravity, NoGravity, resize, to);

        assert_eq!(res, expected);
    }

    #[test]
    fn far_edge_distance_is_preserved() {
        let form = Size::new(400.0, 300.0);
        let mut p = Placement::new(r(100, 100, 50, 50), form);
        p.nw_gravity = SouthEast;
        p.se_gravity = SouthEast;
        let (_, _, right_before, bottom_before) = p.lower_right_distances();

        p.rescale(form, Size::new(800.0, 300.0));
        let (_, _, right_after, bottom_after) = p.lower_right_distances();

        assert_eq!(right_before, right_after);
        assert_eq!(bottom_before, bottom_after);
    }

    #[test_case(Point::new(9, 10), false; "left of")]
    #[test_case(Point::new(10, 10), true; "top left")]
    #[test_case(Point::new(29, 29), true; "bottom right")]
    #[test_case(Point::new(30, 29), false; "right edge is exclusive")]
    #[test]
    fn contains_point(p: Point, expected: bool) {
        assert_eq!(r(10, 10, 20, 20).contains_point(p), expected);
    }

    #[test]
    fn union_covers_both() {
        assert_eq!(r(0, 0, 10, 10).union(&r(5, 20, 10, 10)), r(0, 0, 15, 30));
    }

    #[derive(Debug, Clone)]
    struct Case {
        rect: Rect,
        nw: Gravity,
        se: Gravity,
        resize: Resize,
    }

    impl Arbitrary for Case {
        fn arbitrary(g: &mut Gen) -> Self {
            let gravities: Vec<Gravity> = Gravity::iter().collect();
            let resizes = [Resize::NONE, Resize::X, Resize::Y, Resize::ALL];

            // keep the object inside of a 400x300 form
            let x = (u16::arbitrary(g) % 300) as i32;
            let y = (u16::arbitrary(g) % 200) as i32;

            Case {
                rect: Rect::new(x, y, 1 + (u8::arbitrary(g) % 99) as i32, 1 + (u8::arbitrary(g) % 99) as i32),
                nw: *g.choose(&gravities).unwrap_or(&NoGravity),
                se: *g.choose(&gravities).unwrap_or(&NoGravity),
                resize: *g.choose(&resizes).unwrap_or(&Resize::ALL),
            }
        }
    }

    #[quickcheck]
    fn scaling_there_and_back_is_within_a_pixel(case: Case, factor: u8) -> bool {
        let s = 0.25 + (factor % 16) as f64 * 0.25;
        let form = Size::new(400.0, 300.0);
        let bigger = form.scaled(s, s);

        let mut p = Placement::new(case.rect, form);
        p.nw_gravity = case.nw;
        p.se_gravity = case.se;
        p.resize = case.resize;

        p.rescale(form, bigger);
        p.rescale(bigger, form);
        let res = p.rect();

        (res.x - case.rect.x).abs() <= 1
            && (res.y - case.rect.y).abs() <= 1
            && (res.w - case.rect.w).abs() <= 1
            && (res.h - case.rect.h).abs() <= 1
    }
}
