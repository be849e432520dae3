use std::fmt;

use num_complex::Complex64;

use crate::geometry::{Point3, Transform, Vector3};
use crate::shapes::Plane;

/// A traced ray: position, direction, accumulated parameter along direction,
/// liveness, wavelength and polarisation (spec §3, §4.1).
///
/// Invariant upheld by every public method: `direction` is unit-norm and
/// `position_at(0.0) == origin`.
#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vector3,
    /// Accumulated parameter along `direction` since the last `rebase`.
    pub distance: f64,
    pub alive: bool,
    pub wavelength: f64,
    /// (s, p) complex polarisation amplitudes.
    pub amplitude_s: Complex64,
    pub amplitude_p: Complex64,
    /// Unit vector defining the local S-polarisation axis.
    pub s_ref: Vector3,
}

impl Ray {
    pub fn new(origin: Point3, direction: Vector3, wavelength: f64) -> Ray {
        let mut r = Ray {
            origin,
            direction,
            distance: 0.0,
            alive: true,
            wavelength,
            amplitude_s: Complex64::new(1.0, 0.0),
            amplitude_p: Complex64::new(0.0, 0.0),
            s_ref: Vector3::x_axis(),
        };
        r.normalize();
        r
    }

    /// Force `direction` back to unit norm. Called after every construction
    /// and after any transform that could perturb its length.
    pub fn normalize(&mut self) {
        let len = self.direction.length();
        if len > 0.0 {
            self.direction = self.direction / len;
        } else {
            self.alive = false;
        }
    }

    pub fn position_at(&self, offset: f64) -> Point3 {
        self.origin + (self.distance + offset) * self.direction
    }

    /// Move the origin to the point currently `distance` ahead and reset the
    /// accumulated parameter to zero (spec §4.1).
    pub fn rebase(&mut self) {
        self.origin = self.position_at(0.0);
        self.distance = 0.0;
    }

    /// Translate the origin by a lab-frame vector, leaving `distance`
    /// untouched.
    pub fn translate(&mut self, v: Vector3) {
        self.origin = self.origin + v;
    }

    /// Advance the accumulated parameter by `t` along `direction`.
    pub fn advance(&mut self, t: f64) {
        self.distance += t;
    }

    pub fn apply_affine(&mut self, t: &Transform) {
        self.origin = t.apply_point(&self.origin);
        self.direction = t.apply_vector(&self.direction);
        self.s_ref = t.apply_vector(&self.s_ref);
        self.normalize();
    }

    /// Intersect with a plane; sets `distance` to the unique intersection
    /// parameter, or marks the ray lost if it runs parallel to the plane.
    pub fn move_to_plane(&mut self, plane: &Plane) {
        let denom = plane.normal.dot(&self.direction);
        if denom.abs() < 1e-15 {
            self.alive = false;
            return;
        }
        let t = -(plane.normal.dot(&self.origin.to_vector()) + plane.d) / denom;
        self.distance = t;
    }

    /// Intersect with a quadric surface given in homogeneous coordinates
    /// (spec §4.1): choose the root of smaller absolute parameter, mark the
    /// ray lost if the discriminant is negative.
    pub fn move_to_quadric(&mut self, q: &crate::geometry::Matrix4x4) {
        let o = self.origin.to_vector();
        let d = self.direction;
        let qm = &q.m;

        // Symmetric bilinear form of the homogeneous quadric: B(u, v) = u^T Q v.
        let bilinear = |u: &[f64; 4], v: &[f64; 4]| -> f64 {
            let mut acc = 0.0;
            for i in 0..4 {
                for j in 0..4 {
                    acc += u[i] * qm[i][j] * v[j];
                }
            }
            acc
        };
        let oh = [o.x, o.y, o.z, 1.0];
        let dh = [d.x, d.y, d.z, 0.0];

        // p(t) = o + t*d, homogeneous p(t)_h = oh + t*dh exactly (dh's last
        // coordinate is zero), so Q(p(t)) expands as a plain quadratic in t.
        let a = bilinear(&dh, &dh);
        let b = 2.0 * bilinear(&oh, &dh);
        let c = bilinear(&oh, &oh);

        if a.abs() < 1e-18 {
            if b.abs() < 1e-18 {
                self.alive = false;
                return;
            }
            self.distance = -c / b;
            return;
        }
        let discr = b * b - 4.0 * a * c;
        if discr < 0.0 {
            self.alive = false;
            return;
        }
        let root = discr.sqrt();
        let t0 = (-b - root) / (2.0 * a);
        let t1 = (-b + root) / (2.0 * a);
        self.distance = if t0.abs() <= t1.abs() { t0 } else { t1 };
    }

    /// Shortest distance between `self` and `other`, and the two ray
    /// parameters at the points of closest approach. Returns `+inf`
    /// parameters if the rays are nearly parallel (spec §4.1 threshold
    /// `1 - 1e-10`).
    pub fn minimum_distance_to(&self, other: &Ray) -> (Vector3, f64, f64) {
        let d1 = self.direction;
        let d2 = other.direction;
        let cos_angle = d1.dot(&d2).abs();
        if cos_angle > 1.0 - 1e-10 {
            return (Vector3::zero(), f64::INFINITY, f64::INFINITY);
        }
        let w0 = self.position_at(0.0) - other.position_at(0.0);
        let a = d1.dot(&d1);
        let b = d1.dot(&d2);
        let c = d2.dot(&d2);
        let d = d1.dot(&w0);
        let e = d2.dot(&w0);
        let denom = a * c - b * b;
        let t1 = (b * e - c * d) / denom;
        let t2 = (a * e - b * d) / denom;
        let p1 = self.position_at(t1);
        let p2 = other.position_at(t2);
        (p1 - p2, t1, t2)
    }
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[o=({:.6},{:.6},{:.6}), d=({:.6},{:.6},{:.6}), dist={:.6}, alive={}]",
            self.origin.x,
            self.origin.y,
            self.origin.z,
            self.direction.x,
            self.direction.y,
            self.direction.z,
            self.distance,
            self.alive
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_clears_distance() {
        let mut r = Ray::new(Point3::origin(), Vector3::z_axis(), 500e-9);
        r.advance(2.0);
        r.rebase();
        assert_eq!(r.distance, 0.0);
        assert!((r.origin.z - 2.0).abs() < 1e-12);
    }

    #[test]
    fn direction_stays_unit_norm() {
        let r = Ray::new(Point3::origin(), Vector3::new(0.0, 3.0, 4.0), 500e-9);
        assert!((r.direction.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_rays_report_infinite_parameters() {
        let r1 = Ray::new(Point3::origin(), Vector3::z_axis(), 500e-9);
        let r2 = Ray::new(Point3::new(1.0, 0.0, 0.0), Vector3::z_axis(), 500e-9);
        let (_, t1, t2) = r1.minimum_distance_to(&r2);
        assert!(t1.is_infinite() && t2.is_infinite());
    }
}
