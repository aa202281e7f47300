//! Collision shapes and scalar helpers on top of `glam`.
//!
//! Fighters move in a 2D plane ([`Vec2`]) while collision volumes live in the
//! 3D model space of the skeleton ([`Vec3`], [`Affine3A`]). Everything is
//! `f32` so identical inputs produce identical bits on every run.

pub use glam::{Affine3A, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Model matrix for a fighter standing at `position` with `facing` of `+1`
/// or `-1`. Facing left is a half turn about the vertical axis.
pub fn model_matrix(position: Vec2, facing: i8) -> Affine3A {
    let f = if facing < 0 { -1.0 } else { 1.0 };
    Affine3A::from_cols(
        Vec3::new(f, 0.0, 0.0).into(),
        Vec3::Y.into(),
        Vec3::new(0.0, 0.0, f).into(),
        Vec3::new(position.x, position.y, 0.0).into(),
    )
}

// ---------------------------------------------------------------------------
// Capsule
// ---------------------------------------------------------------------------

/// A swept sphere between two points. A sphere is a capsule with `a == b`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub a: Vec3,
    pub b: Vec3,
    pub radius: f32,
}

impl Capsule {
    /// A sphere at `centre`.
    pub fn sphere(centre: Vec3, radius: f32) -> Self {
        Self {
            a: centre,
            b: centre,
            radius,
        }
    }

    /// Exact discrete overlap test: closest distance between the two core
    /// segments is no greater than the sum of radii.
    pub fn intersects(&self, other: &Capsule) -> bool {
        let reach = self.radius + other.radius;
        segment_distance_squared(self.a, self.b, other.a, other.b) <= reach * reach
    }
}

/// Squared distance between segments `p1-q1` and `p2-q2`.
///
/// Handles degenerate (point) segments, so sphere-sphere and sphere-capsule
/// fall out of the same routine.
pub fn segment_distance_squared(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> f32 {
    const EPS: f32 = 1e-12;

    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (s, t) = if a <= EPS && e <= EPS {
        (0.0, 0.0)
    } else if a <= EPS {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= EPS {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > EPS {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    let c1 = p1 + d1 * s;
    let c2 = p2 + d2 * t;
    c1.distance_squared(c2)
}

// ---------------------------------------------------------------------------
// Scalar helpers
// ---------------------------------------------------------------------------

/// Move `value` toward `target` by at most `step`, never overshooting.
#[inline]
pub fn approach(value: f32, target: f32, step: f32) -> f32 {
    if value < target {
        (value + step).min(target)
    } else {
        (value - step).max(target)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spheres_touching_intersect() {
        let a = Capsule::sphere(Vec3::ZERO, 1.0);
        let b = Capsule::sphere(Vec3::new(2.0, 0.0, 0.0), 1.0);
        assert!(a.intersects(&b));
        let c = Capsule::sphere(Vec3::new(2.01, 0.0, 0.0), 1.0);
        assert!(!a.intersects(&c));
    }

    #[test]
    fn sphere_against_capsule_middle() {
        let cap = Capsule {
            a: Vec3::new(-5.0, 0.0, 0.0),
            b: Vec3::new(5.0, 0.0, 0.0),
            radius: 0.5,
        };
        let s = Capsule::sphere(Vec3::new(0.0, 1.0, 0.0), 0.6);
        assert!(cap.intersects(&s));
        let far = Capsule::sphere(Vec3::new(0.0, 1.2, 0.0), 0.6);
        assert!(!cap.intersects(&far));
    }

    #[test]
    fn crossing_segments_have_zero_distance() {
        let d = segment_distance_squared(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        assert!(d.abs() < 1e-10, "expected 0, got {d}");
    }

    #[test]
    fn parallel_segments_distance() {
        let d = segment_distance_squared(
            Vec3::ZERO,
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(1.0, 3.0, 0.0),
            Vec3::new(2.0, 3.0, 0.0),
        );
        assert!((d - 9.0).abs() < 1e-5, "expected 9, got {d}");
    }

    #[test]
    fn facing_left_mirrors_x() {
        let m = model_matrix(Vec2::new(3.0, 1.0), -1);
        let p = m.transform_point3(Vec3::new(1.0, 2.0, 0.5));
        assert_eq!(p, Vec3::new(2.0, 3.0, -0.5));
    }

    #[test]
    fn bone_applies_before_model() {
        let model = model_matrix(Vec2::new(10.0, 0.0), 1);
        let bone = Affine3A::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let world = model * bone;
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(10.0, 2.0, 0.0));
    }

    #[test]
    fn approach_never_overshoots() {
        assert_eq!(approach(0.0, 1.0, 0.3), 0.3);
        assert_eq!(approach(0.9, 1.0, 0.3), 1.0);
        assert_eq!(approach(-0.1, -1.0, 2.0), -1.0);
    }
}
