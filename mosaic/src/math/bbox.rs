//! Axis-aligned integer bounding box for pixel regions.

use glam::{DVec2, IVec2};
use serde::{Deserialize, Serialize};

use super::snap_to_grid;

/// Axis-aligned box on the integer pixel grid.
///
/// Uses half-open bounds: a pixel at `p` is inside if
/// `min.x <= p.x < max.x` and `min.y <= p.y < max.y`. A box whose max is not
/// strictly greater than its min on both axes is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aabb {
    pub min: IVec2,
    pub max: IVec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    #[inline]
    pub const fn new(min: IVec2, max: IVec2) -> Self {
        Self { min, max }
    }

    /// Box at `(x, y)` with the given size.
    #[inline]
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(IVec2::new(x, y), IVec2::new(x + width, y + height))
    }

    /// Box anchored at the origin, covering a `width` x `height` raster.
    #[inline]
    pub fn from_size(width: i32, height: i32) -> Self {
        Self::from_xywh(0, 0, width, height)
    }

    /// Create an empty box (for accumulation).
    ///
    /// The empty box has inverted bounds so that the first call to
    /// [`Aabb::union`] or [`Aabb::grow_point`] sets the initial bounds.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            min: IVec2::new(i32::MAX, i32::MAX),
            max: IVec2::new(i32::MIN, i32::MIN),
        }
    }

    /// Smallest box on the pixel grid that covers every continuous point.
    ///
    /// Coordinates within a tiny epsilon of an integer are snapped first, so
    /// round-off from composed transforms does not widen the box by a pixel.
    pub fn covering(points: &[DVec2]) -> Self {
        if points.is_empty() {
            return Self::empty();
        }
        let mut lo = DVec2::splat(f64::INFINITY);
        let mut hi = DVec2::splat(f64::NEG_INFINITY);
        for p in points {
            lo = lo.min(*p);
            hi = hi.max(*p);
        }
        Self::new(
            IVec2::new(
                snap_to_grid(lo.x).floor() as i32,
                snap_to_grid(lo.y).floor() as i32,
            ),
            IVec2::new(
                snap_to_grid(hi.x).ceil() as i32,
                snap_to_grid(hi.y).ceil() as i32,
            ),
        )
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    /// Number of columns, zero for an empty box.
    #[inline]
    pub fn width(&self) -> i32 {
        if self.is_empty() {
            0
        } else {
            self.max.x - self.min.x
        }
    }

    /// Number of rows, zero for an empty box.
    #[inline]
    pub fn height(&self) -> i32 {
        if self.is_empty() {
            0
        } else {
            self.max.y - self.min.y
        }
    }

    #[inline]
    pub fn size(&self) -> IVec2 {
        IVec2::new(self.width(), self.height())
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    #[inline]
    pub fn contains(&self, p: IVec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// True if `other` lies entirely inside this box. Empty boxes are
    /// contained in everything.
    #[inline]
    pub fn contains_box(&self, other: &Aabb) -> bool {
        other.is_empty()
            || (other.min.x >= self.min.x
                && other.min.y >= self.min.y
                && other.max.x <= self.max.x
                && other.max.y <= self.max.y)
    }

    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Overlap of two boxes. Disjoint boxes produce an empty result.
    #[inline]
    pub fn intersection(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.max(other.min), self.max.min(other.max))
    }

    /// Smallest box containing both. Empty operands are ignored.
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => *other,
            (_, true) => *self,
            _ => Aabb::new(self.min.min(other.min), self.max.max(other.max)),
        }
    }

    /// Grow the box so that pixel `p` is inside it.
    #[inline]
    pub fn grow_point(&mut self, p: IVec2) {
        if self.is_empty() {
            *self = Aabb::new(p, p + IVec2::ONE);
        } else {
            self.min = self.min.min(p);
            self.max = self.max.max(p + IVec2::ONE);
        }
    }

    #[inline]
    pub fn translate(&self, offset: IVec2) -> Aabb {
        Aabb::new(self.min + offset, self.max + offset)
    }

    /// Grow the box by `margin` pixels on every side.
    #[inline]
    pub fn expand(&self, margin: i32) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb::new(self.min - IVec2::splat(margin), self.max + IVec2::splat(margin))
    }

    /// The four corners of the continuous rectangle spanned by the box.
    #[inline]
    pub fn corners(&self) -> [DVec2; 4] {
        let min = self.min.as_dvec2();
        let max = self.max.as_dvec2();
        [
            min,
            DVec2::new(max.x, min.y),
            DVec2::new(min.x, max.y),
            max,
        ]
    }

    /// Iterate the pixels of the box in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = IVec2> + '_ {
        let (x0, x1) = (self.min.x, self.min.x + self.width());
        (self.min.y..self.min.y + self.height())
            .flat_map(move |y| (x0..x1).map(move |x| IVec2::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_and_area() {
        let b = Aabb::from_xywh(-3, 2, 10, 4);
        assert_eq!(b.width(), 10);
        assert_eq!(b.height(), 4);
        assert_eq!(b.area(), 40);
        assert!(!b.is_empty());
    }

    #[test]
    fn test_empty_box() {
        let e = Aabb::empty();
        assert!(e.is_empty());
        assert_eq!(e.width(), 0);
        assert_eq!(e.area(), 0);
        assert!(Aabb::from_xywh(0, 0, 0, 5).is_empty());
    }

    #[test]
    fn test_contains_is_half_open() {
        let b = Aabb::from_size(4, 4);
        assert!(b.contains(IVec2::new(0, 0)));
        assert!(b.contains(IVec2::new(3, 3)));
        assert!(!b.contains(IVec2::new(4, 3)));
        assert!(!b.contains(IVec2::new(-1, 0)));
    }

    #[test]
    fn test_intersection() {
        let a = Aabb::from_size(10, 10);
        let b = Aabb::from_xywh(5, -2, 10, 5);
        let i = a.intersection(&b);
        assert_eq!(i, Aabb::from_xywh(5, 0, 5, 3));
        assert!(a.intersects(&b));

        let far = Aabb::from_xywh(20, 20, 2, 2);
        assert!(a.intersection(&far).is_empty());
        assert!(!a.intersects(&far));
    }

    #[test]
    fn test_touching_boxes_do_not_intersect() {
        let a = Aabb::from_size(10, 10);
        let b = Aabb::from_xywh(10, 0, 10, 10);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_union_ignores_empty() {
        let a = Aabb::from_xywh(2, 2, 3, 3);
        assert_eq!(Aabb::empty().union(&a), a);
        assert_eq!(a.union(&Aabb::empty()), a);
        let b = Aabb::from_xywh(-1, 4, 2, 6);
        assert_eq!(a.union(&b), Aabb::new(IVec2::new(-1, 2), IVec2::new(5, 10)));
    }

    #[test]
    fn test_grow_point_from_empty() {
        let mut b = Aabb::empty();
        b.grow_point(IVec2::new(3, 4));
        assert_eq!(b, Aabb::from_xywh(3, 4, 1, 1));
        b.grow_point(IVec2::new(0, 6));
        assert_eq!(b, Aabb::new(IVec2::new(0, 4), IVec2::new(4, 7)));
    }

    #[test]
    fn test_expand_and_translate() {
        let b = Aabb::from_xywh(5, 5, 2, 2);
        assert_eq!(b.expand(1), Aabb::from_xywh(4, 4, 4, 4));
        assert_eq!(b.translate(IVec2::new(-5, 1)), Aabb::from_xywh(0, 6, 2, 2));
        assert!(Aabb::empty().expand(3).is_empty());
    }

    #[test]
    fn test_covering_snaps_round_off() {
        let pts = [DVec2::new(79.9999999999, 0.0), DVec2::new(180.0000000001, 100.0)];
        assert_eq!(Aabb::covering(&pts), Aabb::from_xywh(80, 0, 100, 100));

        let pts = [DVec2::new(0.4, -0.5), DVec2::new(9.5, 3.2)];
        assert_eq!(
            Aabb::covering(&pts),
            Aabb::new(IVec2::new(0, -1), IVec2::new(10, 4))
        );
    }

    #[test]
    fn test_contains_box() {
        let outer = Aabb::from_size(10, 10);
        assert!(outer.contains_box(&Aabb::from_xywh(2, 2, 8, 8)));
        assert!(!outer.contains_box(&Aabb::from_xywh(2, 2, 9, 8)));
        assert!(outer.contains_box(&Aabb::empty()));
    }

    #[test]
    fn test_pixels_row_major() {
        let b = Aabb::from_xywh(1, 1, 2, 2);
        let px: Vec<IVec2> = b.pixels().collect();
        assert_eq!(
            px,
            vec![
                IVec2::new(1, 1),
                IVec2::new(2, 1),
                IVec2::new(1, 2),
                IVec2::new(2, 2)
            ]
        );
        assert_eq!(Aabb::empty().pixels().count(), 0);
    }
}
