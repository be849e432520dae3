//! Grating line-density patterns (spec §4.5, L4). Spec §9's enum-of-variants
//! redesign applies here too: `Pattern` replaces the source's `Holographic`/
//! `Polynomial1D` mixin classes.

use crate::geometry::{Point3, Vector3};
use crate::shapes::solve_linear_system;

/// A construction point given in (inverse-distance, elevation, azimuth)
/// spherical form, as the source's holographic-recording parameters are
/// specified (spec §4.5). Elevation is measured from the local XZ plane
/// toward +Y; azimuth is measured in the XZ plane from +Z toward +X.
#[derive(Debug, Clone, Copy)]
pub struct ConstructionPoint {
    pub inverse_distance: f64,
    pub elevation: f64,
    pub azimuth: f64,
}

impl ConstructionPoint {
    pub fn new(inverse_distance: f64, elevation: f64, azimuth: f64) -> Self {
        ConstructionPoint {
            inverse_distance,
            elevation,
            azimuth,
        }
    }

    pub fn to_point(&self) -> Point3 {
        let r = 1.0 / self.inverse_distance;
        let (el, az) = (self.elevation, self.azimuth);
        Point3::new(r * el.cos() * az.sin(), r * el.sin(), r * el.cos() * az.cos())
    }
}

#[derive(Debug, Clone)]
pub struct Holographic {
    pub recording_wavelength: f64,
    pub c1: ConstructionPoint,
    pub c2: ConstructionPoint,
    /// When set, substitutes a constant line-density direction along local
    /// X instead of computing it from the construction points.
    pub density_override: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Polynomial1D {
    pub degree: usize,
    pub central_density: f64,
    /// One coefficient per degree, `coeffs[k-1]` multiplies `x^(k-1)` in the
    /// density law (spec §4.5): `coeffs.len() == degree`.
    pub coeffs: Vec<f64>,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Holographic(Holographic),
    Polynomial1D(Polynomial1D),
}

/// Cubic fit of axial line density plus the central tilt and curvature
/// radius of the ruling, returned by [`Pattern::pattern_info`]. This is a
/// sampled-fit summary (spec §4.5), not a fundamental grating parameter.
#[derive(Debug, Clone, Copy)]
pub struct PatternInfo {
    /// `density(x) ~= a[0] + a[1]*x + a[2]*x^2 + a[3]*x^3`.
    pub axial_density_fit: [f64; 4],
    pub central_tilt: f64,
    pub curvature_radius: f64,
}

impl Pattern {
    /// Tangential line-density vector at surface point `p` with outward
    /// normal `normal`, in the surface-definition frame.
    pub fn line_density_vector(&self, p: Point3, normal: Vector3) -> Vector3 {
        match self {
            Pattern::Holographic(h) => h.line_density_vector(p, normal),
            Pattern::Polynomial1D(poly) => poly.line_density_vector(p),
        }
    }

    pub fn pattern_info(&self, half_length: f64, half_width: f64) -> PatternInfo {
        match self {
            Pattern::Holographic(h) => h.pattern_info(half_length, half_width),
            Pattern::Polynomial1D(poly) => poly.pattern_info(),
        }
    }
}

impl Holographic {
    pub fn line_density_vector(&self, p: Point3, normal: Vector3) -> Vector3 {
        if let Some(density) = self.density_override {
            return Vector3::x_axis() * density;
        }
        let p1 = self.c1.to_point();
        let p2 = self.c2.to_point();
        let u1 = (p1 - p).normalize();
        let u2 = (p2 - p).normalize();
        let diff = u2 - u1;
        let tangential = diff - normal * normal.dot(&diff);
        tangential / self.recording_wavelength
    }

    /// Samples the ruling over `[-half_length, half_length] x [-half_width,
    /// half_width]` on the nominal `z=0` surface plane, fits a cubic to the
    /// axial density along `y=0`, and estimates tilt/curvature from nearby
    /// samples.
    pub fn pattern_info(&self, half_length: f64, half_width: f64) -> PatternInfo {
        const N: usize = 21;
        let z_axis = Vector3::z_axis();

        let axial_density = |x: f64| -> f64 {
            self.line_density_vector(Point3::new(x, 0.0, 0.0), z_axis).dot(&Vector3::x_axis())
        };

        let mut ata = vec![vec![0.0; 4]; 4];
        let mut atb = vec![0.0; 4];
        for i in 0..N {
            let x = -half_length + 2.0 * half_length * i as f64 / (N - 1) as f64;
            let row = [1.0, x, x * x, x * x * x];
            let d = axial_density(x);
            for a in 0..4 {
                atb[a] += row[a] * d;
                for b in 0..4 {
                    ata[a][b] += row[a] * row[b];
                }
            }
        }
        let fit = solve_linear_system(ata, atb).unwrap_or([0.0; 4].to_vec());
        let axial_density_fit = [fit[0], fit[1], fit[2], fit[3]];

        let v0 = self.line_density_vector(Point3::origin(), z_axis);
        let central_tilt = v0.y.atan2(v0.x);

        let eps = half_width.max(1e-6) * 1e-3;
        let angle_at = |y: f64| -> f64 {
            let v = self.line_density_vector(Point3::new(0.0, y, 0.0), z_axis);
            v.y.atan2(v.x)
        };
        let dtheta = angle_at(eps) - angle_at(-eps);
        let curvature_radius = if dtheta.abs() > 1e-15 {
            (2.0 * eps / dtheta).abs()
        } else {
            f64::INFINITY
        };

        PatternInfo {
            axial_density_fit,
            central_tilt,
            curvature_radius,
        }
    }
}

impl Polynomial1D {
    pub fn line_density_vector(&self, p: Point3) -> Vector3 {
        let mut density = self.central_density;
        for (idx, coeff) in self.coeffs.iter().enumerate() {
            let k = (idx + 1) as f64;
            density += k * coeff * p.x.powf(k - 1.0);
        }
        Vector3::x_axis() * density
    }

    pub fn pattern_info(&self) -> PatternInfo {
        let mut axial_density_fit = [0.0; 4];
        axial_density_fit[0] = self.central_density;
        for (idx, coeff) in self.coeffs.iter().enumerate().take(3) {
            axial_density_fit[idx + 1] = (idx as f64 + 1.0) * coeff;
        }
        PatternInfo {
            axial_density_fit,
            central_tilt: 0.0,
            curvature_radius: f64::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynomial1d_density_matches_spec_formula() {
        let poly = Polynomial1D {
            degree: 2,
            central_density: 1200.0,
            coeffs: vec![0.5, -0.02],
        };
        let v = poly.line_density_vector(Point3::new(2.0, 0.0, 0.0));
        // central + 1*0.5*x^0 + 2*(-0.02)*x^1
        let expected = 1200.0 + 1.0 * 0.5 + 2.0 * -0.02 * 2.0;
        assert!((v.x - expected).abs() < 1e-9);
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn holographic_override_gives_constant_x_density() {
        let h = Holographic {
            recording_wavelength: 413e-9,
            c1: ConstructionPoint::new(1.0, 0.1, 0.0),
            c2: ConstructionPoint::new(1.0, -0.1, 0.0),
            density_override: Some(1000.0),
        };
        let v = h.line_density_vector(Point3::new(0.3, 0.1, 0.0), Vector3::z_axis());
        assert_eq!(v, Vector3::new(1000.0, 0.0, 0.0));
    }

    #[test]
    fn holographic_without_override_is_tangent_to_surface() {
        let h = Holographic {
            recording_wavelength: 413e-9,
            c1: ConstructionPoint::new(1.0, 0.2, 0.0),
            c2: ConstructionPoint::new(1.0, -0.2, 0.0),
            density_override: None,
        };
        let normal = Vector3::z_axis();
        let v = h.line_density_vector(Point3::new(0.1, 0.05, 0.0), normal);
        assert!(v.dot(&normal).abs() < 1e-12);
    }
}
