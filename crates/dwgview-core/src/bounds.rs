//! Axis-aligned bounding extents

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// World-space axis-aligned box. Derived per framing pass, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Extent {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Extent {
    /// Inverted box that any union replaces
    pub const EMPTY: Extent = Extent {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box centered at `center` with edge lengths `size`
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut extent = Self::EMPTY;
        for p in points {
            extent.include_point(p);
        }
        extent
    }

    /// True when nothing has been added yet
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// True when both corners hold finite numbers
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn include_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Extent) -> Extent {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        Extent {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        (self.min + self.max) * 0.5
    }

    /// Edge lengths; zero for an empty extent
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.max - self.min
    }

    /// Bounding sphere radius: half the box diagonal
    pub fn radius(&self) -> f32 {
        self.size().length() * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Axis-aligned box enclosing this box after an affine transform
    pub fn transformed(&self, matrix: &Mat4) -> Extent {
        if self.is_empty() {
            return *self;
        }
        Extent::from_points(self.corners().into_iter().map(|c| matrix.transform_point3(c)))
    }

    pub fn translated(&self, offset: Vec3) -> Extent {
        if self.is_empty() {
            return *self;
        }
        Extent {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Uniform scale about the world origin
    pub fn scaled(&self, factor: f32) -> Extent {
        if self.is_empty() {
            return *self;
        }
        Extent::new(self.min * factor, self.max * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_extent() {
        let e = Extent::EMPTY;
        assert!(e.is_empty());
        assert_eq!(e.size(), Vec3::ZERO);
        assert_eq!(e.center(), Vec3::ZERO);
        assert_eq!(e.radius(), 0.0);
    }

    #[test]
    fn test_union_and_center() {
        let a = Extent::new(Vec3::ZERO, Vec3::ONE);
        let b = Extent::new(Vec3::splat(2.0), Vec3::splat(4.0));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::splat(4.0));
        assert_eq!(u.center(), Vec3::splat(2.0));
        assert_eq!(Extent::EMPTY.union(&a), a);
    }

    #[test]
    fn test_radius_is_half_diagonal() {
        let e = Extent::from_center_size(Vec3::splat(5.0), Vec3::splat(10.0));
        assert!((e.radius() - 8.660254).abs() < 1e-4);
    }

    #[test]
    fn test_transformed_rotation_grows_box() {
        let e = Extent::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let rot = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let t = e.transformed(&rot);
        assert!(t.max.x > 1.4 && t.max.x < 1.42);
        assert!((t.max.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_point_is_degenerate() {
        let e = Extent::from_points([Vec3::new(3.0, 4.0, 5.0)]);
        assert!(!e.is_empty());
        assert_eq!(e.size().length(), 0.0);
    }
}
