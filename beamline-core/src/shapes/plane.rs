use crate::geometry::{Point3, Vector3};
use crate::ray::Ray;

/// `normal . p + d = 0`. The base case of `Shape::intercept` (spec §4.2):
/// `origin_z + t * direction_z = 0` is the `normal = Z, d = 0` instance.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vector3,
    pub d: f64,
}

impl Plane {
    pub fn z_plane() -> Plane {
        Plane {
            normal: Vector3::z_axis(),
            d: 0.0,
        }
    }
}

/// Intersect `ray` with the canonical `z = 0` plane; returns the intercept
/// point and the (constant) surface normal, or marks the ray lost.
pub fn intercept(ray: &mut Ray) -> Vector3 {
    let plane = Plane::z_plane();
    ray.move_to_plane(&plane);
    plane.normal
}

pub fn intercept_point(ray: &Ray) -> Point3 {
    ray.position_at(0.0)
}
