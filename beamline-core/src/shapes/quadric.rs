//! Sphere, cylinder, conic-base cylinder, revolution quadric and cone are all
//! expressed as homogeneous quadric forms and solved via `Ray::move_to_quadric`
//! (spec §4.2: "treated as quadrics via `move_to_quadric`").

use crate::geometry::{Matrix4x4, Point3, Vector3};
use crate::ray::Ray;

fn diag(a: f64, b: f64, c: f64, k: f64) -> Matrix4x4 {
    Matrix4x4::from_rows([
        [a, 0.0, 0.0, 0.0],
        [0.0, b, 0.0, 0.0],
        [0.0, 0.0, c, 0.0],
        [0.0, 0.0, 0.0, k],
    ])
}

/// `x^2 + y^2 + z^2 - R^2 = 0`.
pub fn sphere_matrix(radius: f64) -> Matrix4x4 {
    diag(1.0, 1.0, 1.0, -radius * radius)
}

/// `x^2 + y^2 - R^2 = 0` (cylinder axis along Z).
pub fn cylinder_matrix(radius: f64) -> Matrix4x4 {
    diag(1.0, 1.0, 0.0, -radius * radius)
}

/// Conic of revolution about Z with vertex at the origin and apex curvature
/// `1/radius`: `(1+k) z^2 - 2 R z + x^2 + y^2 = 0`.
pub fn revolution_quadric_matrix(radius: f64, conic: f64) -> Matrix4x4 {
    Matrix4x4::from_rows([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0 + conic, -radius],
        [0.0, 0.0, -radius, 0.0],
    ])
}

/// Same conic cross-section as `revolution_quadric_matrix`, but extruded
/// along Y instead of revolved, i.e. independent of Y: `(1+k) z^2 - 2 R z + x^2 = 0`.
pub fn conic_cylinder_matrix(radius: f64, conic: f64) -> Matrix4x4 {
    Matrix4x4::from_rows([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 1.0 + conic, -radius],
        [0.0, 0.0, -radius, 0.0],
    ])
}

/// `x^2 + y^2 - (z * tan(half_angle))^2 = 0`, apex at the origin, axis Z.
pub fn cone_matrix(half_angle: f64) -> Matrix4x4 {
    let m = half_angle.tan();
    diag(1.0, 1.0, -m * m, 0.0)
}

/// Gradient of the quadric form at `p`, i.e. `2 (A p + b)` where `A` is the
/// upper-left 3x3 block and `b` is the last column of `q`.
pub fn gradient(q: &Matrix4x4, p: &Point3) -> Vector3 {
    let m = &q.m;
    let g = |i: usize| -> f64 {
        2.0 * (m[i][0] * p.x + m[i][1] * p.y + m[i][2] * p.z + m[i][3])
    };
    Vector3::new(g(0), g(1), g(2))
}

/// Solve the quadric and return the outward unit normal at the chosen
/// intercept (spec §4.2: pick the root of smaller `|t|`).
pub fn intercept(q: &Matrix4x4, ray: &mut Ray) -> Option<Vector3> {
    ray.move_to_quadric(q);
    if !ray.alive {
        return None;
    }
    let p = ray.position_at(0.0);
    let grad = gradient(q, &p);
    let len = grad.length();
    if len < 1e-15 {
        ray.alive = false;
        return None;
    }
    Some(grad / len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;

    #[test]
    fn sphere_hit_moves_ray_forward() {
        let q = sphere_matrix(1.0);
        let mut ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vector3::z_axis(), 500e-9);
        let n = intercept(&q, &mut ray).expect("should hit sphere");
        assert!(ray.alive);
        let hit = ray.position_at(0.0);
        assert!((hit.z + 1.0).abs() < 1e-9);
        assert!(n.dot(&Vector3::z_axis()) < 0.0); // normal points back toward the ray origin
    }

    #[test]
    fn cylinder_miss_marks_ray_lost() {
        let q = cylinder_matrix(1.0);
        let mut ray = Ray::new(Point3::new(5.0, 5.0, -5.0), Vector3::z_axis(), 500e-9);
        ray.move_to_quadric(&q);
        assert!(!ray.alive);
    }
}
