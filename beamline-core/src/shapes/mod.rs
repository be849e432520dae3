//! Shape solvers (spec §4.2, L1). Spec §9 replaces the source's deep
//! inheritance (`SShape` subclasses plus dynamic-cast identification) with an
//! enum of tagged variants; `Shape::intercept` dispatches on it the way
//! `Shape::intercept` would have been a virtual call in the source.

mod plane;
mod polynomial;
mod quadric;
pub(crate) mod quartic;
mod toroid;

pub use plane::Plane;
pub use polynomial::{Basis, PolySurface};
pub(crate) use polynomial::solve_linear_system;
pub use quadric::{cone_matrix, conic_cylinder_matrix, cylinder_matrix, revolution_quadric_matrix, sphere_matrix};
pub use toroid::Toroid;

use crate::geometry::Vector3;
use crate::ray::Ray;

#[derive(Debug, Clone)]
pub enum Shape {
    Plane,
    Sphere { radius: f64 },
    Cylinder { radius: f64 },
    Toroid(Toroid),
    ConicBaseCylinder { radius: f64, conic: f64 },
    RevolutionQuadric { radius: f64, conic: f64 },
    Cone { half_angle: f64 },
    NaturalPoly(PolySurface),
    LegendrePoly(PolySurface),
}

impl Shape {
    /// Intercept `ray` (already in the shape's local computation frame) and
    /// return the outward unit normal at the hit point, or `None` if the ray
    /// is marked lost.
    pub fn intercept(&self, ray: &mut Ray) -> Option<Vector3> {
        match self {
            Shape::Plane => {
                let n = plane::intercept(ray);
                if ray.alive {
                    Some(n)
                } else {
                    None
                }
            }
            Shape::Sphere { radius } => quadric::intercept(&sphere_matrix(*radius), ray),
            Shape::Cylinder { radius } => quadric::intercept(&cylinder_matrix(*radius), ray),
            Shape::ConicBaseCylinder { radius, conic } => {
                quadric::intercept(&conic_cylinder_matrix(*radius, *conic), ray)
            }
            Shape::RevolutionQuadric { radius, conic } => {
                quadric::intercept(&revolution_quadric_matrix(*radius, *conic), ray)
            }
            Shape::Cone { half_angle } => quadric::intercept(&cone_matrix(*half_angle), ray),
            Shape::Toroid(t) => t.intercept(ray),
            Shape::NaturalPoly(p) | Shape::LegendrePoly(p) => p.intercept(ray),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Shape::Plane => "Plane",
            Shape::Sphere { .. } => "Sphere",
            Shape::Cylinder { .. } => "Cylinder",
            Shape::Toroid(_) => "Toroid",
            Shape::ConicBaseCylinder { .. } => "ConicBaseCylinder",
            Shape::RevolutionQuadric { .. } => "RevolutionQuadric",
            Shape::Cone { .. } => "Cone",
            Shape::NaturalPoly(_) => "NaturalPoly",
            Shape::LegendrePoly(_) => "LegendrePoly",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;

    #[test]
    fn plane_variant_hits_z_zero() {
        let shape = Shape::Plane;
        let mut ray = Ray::new(Point3::new(0.1, 0.2, -3.0), Vector3::z_axis(), 500e-9);
        let n = shape.intercept(&mut ray).expect("plane should be hit");
        assert!(ray.alive);
        assert!((n.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sphere_variant_dispatches_to_quadric_solver() {
        let shape = Shape::Sphere { radius: 2.0 };
        let mut ray = Ray::new(Point3::new(0.0, 0.0, -10.0), Vector3::z_axis(), 500e-9);
        let n = shape.intercept(&mut ray).expect("sphere should be hit");
        assert!(ray.alive);
        assert!(n.dot(&Vector3::z_axis()) < 0.0);
    }
}
