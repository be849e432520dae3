use crate::element::Element;
use crate::error::{Error, Result};
use crate::geometry::{Point3, Transform, Vector3};
use crate::pattern::Pattern;
use crate::shapes::Shape;
use crate::surface::Surface;

/// Diffractive element kind (spec §4.4 step 8, §4.5, L5): `Surface + Shape +
/// Pattern`. Can be transmissive or reflective.
#[derive(Debug, Clone)]
pub struct Grating {
    pub surface: Surface,
    pub shape: Shape,
    pub pattern: Pattern,
    /// Order used to define the alignment direction; never optimisable,
    /// default 1 (spec §4.5).
    pub order_align: f64,
    /// Order actually traced; never optimisable, default 1.
    pub order_use: f64,
    pub chi: f64,
    pub omega: f64,
}

impl Grating {
    pub fn new(element: Element, shape: Shape, pattern: Pattern) -> Grating {
        Grating {
            surface: Surface::new(element),
            shape,
            pattern,
            order_align: 1.0,
            order_use: 1.0,
            chi: 0.0,
            omega: 0.0,
        }
    }

    /// Spec §4.3: solves for `chi`/`omega` so the grating equation is
    /// satisfied at the chief-ray wavelength for `order_align`.
    pub fn align_chi_omega(&mut self, wavelength_align: f64) -> Result<()> {
        let g0 = self.pattern.line_density_vector(Point3::origin(), Vector3::z_axis());
        let psi = self
            .surface
            .element
            .params
            .get_scalar(&self.surface.element.name, "psi")?;
        let rotated = Transform::rot_z(psi).apply_vector(&g0);
        let gx = rotated.x * self.order_align * wavelength_align;
        let gz = rotated.z * self.order_align * wavelength_align;
        if gx.abs() > 1.0 || gz.abs() > 1.0 {
            return Err(Error::AlignmentFailure {
                element: self.surface.element.name.clone(),
                reason: format!(
                    "grating vector out of range for order {} at {:.3e} m (Gx={gx:.3}, Gz={gz:.3})",
                    self.order_align, wavelength_align
                ),
            });
        }
        self.chi = gx.asin();
        self.omega = gz.asin();
        Ok(())
    }

    /// Spec §4.3: aligns the underlying element, then inserts the
    /// `chi`/`omega` rotations (in the psi-rotated frame about its Z, and
    /// about the phi-rotated frame's X respectively) ahead of
    /// `surface_direct`.
    pub fn setup_transforms(&mut self, wavelength: f64, upstream: Option<&Transform>, wavelength_align: f64) -> Result<()> {
        self.align_chi_omega(wavelength_align)?;
        let rot = self.surface.element.base_rotation()?;
        self.surface.element.finish_surface_direct(wavelength, upstream, rot)?;
        let insert = Transform::rot_z(self.chi).compose(&Transform::rot_x(self.omega));
        self.surface.element.surface_direct = insert.compose(&self.surface.element.surface_direct);
        self.surface.element.surface_inverse = self.surface.element.surface_direct.inverse();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Polynomial1D;

    #[test]
    fn chi_omega_stay_within_plus_minus_half_pi() {
        let mut g = Grating::new(
            Element::new("G1", "Grating<Holo,Plane>", true),
            Shape::Plane,
            Pattern::Polynomial1D(Polynomial1D {
                degree: 1,
                central_density: 1200e3, // lines/m
                coeffs: vec![0.0],
            }),
        );
        g.align_chi_omega(25e-9).unwrap();
        assert!(g.chi.abs() <= std::f64::consts::FRAC_PI_2);
        assert!(g.omega.abs() <= std::f64::consts::FRAC_PI_2);
    }
}
