//! Element base (spec §4.3, L2): identity, chain links, parameter
//! dictionary, alignment transforms. Spec §9 replaces the source's raw
//! bidirectional pointers with arena-owned `ElementId` handles (see
//! `registry.rs`); `Element` here only stores the handles, never the
//! elements themselves — non-owning, matching the teacher's
//! `Primitive`/`Scene` split where the scene owns storage and primitives
//! reference each other by index.

use crate::error::{Error, Result};
use crate::geometry::{Point3, Transform, Vector3};
use crate::parameter::{install_alignment_params, ParameterDict};
use crate::ray::Ray;
use crate::registry::ElementId;

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub class_name: String,
    pub prev: Option<ElementId>,
    pub next: Option<ElementId>,
    pub parent: Option<ElementId>,
    pub params: ParameterDict,
    pub transmissive: bool,
    aligned: bool,

    pub exit_frame: Transform,
    pub surface_direct: Transform,
    pub surface_inverse: Transform,
    pub frame_direct: Transform,
    pub frame_inverse: Transform,
    pub translation_from_previous: Vector3,
}

impl Element {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>, transmissive: bool) -> Element {
        let mut params = ParameterDict::new();
        install_alignment_params(&mut params);
        Element {
            name: name.into(),
            class_name: class_name.into(),
            prev: None,
            next: None,
            parent: None,
            params,
            transmissive,
            aligned: false,
            exit_frame: Transform::identity(),
            surface_direct: Transform::identity(),
            surface_inverse: Transform::identity(),
            frame_direct: Transform::identity(),
            frame_inverse: Transform::identity(),
            translation_from_previous: Vector3::zero(),
        }
    }

    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    /// Spec §3: setting any parameter invalidates the aligned state.
    pub fn set_scalar(&mut self, name: &str, value: f64) -> Result<()> {
        self.params.set_scalar(&self.name, name, value)?;
        self.aligned = false;
        Ok(())
    }

    fn angle(&self, name: &str) -> Result<f64> {
        self.params.get_scalar(&self.name, name)
    }

    /// Spec §4.3. `upstream` is the previous element's `exit_frame`, or the
    /// lab identity for a chain head. Returns the rotation-only component of
    /// the alignment rotation (`Rz(phi) . [Ry(-2 theta) if reflective]`) so
    /// that grating alignment (which needs to insert `chi`/`omega` before
    /// `psi`) can call [`Element::finish_surface_direct`] instead of
    /// recomputing this step.
    pub fn setup_transforms(&mut self, wavelength: f64, upstream: Option<&Transform>) -> Result<()> {
        let rot = self.base_rotation()?;
        self.finish_surface_direct(wavelength, upstream, rot)
    }

    /// Step 2 of spec §4.3: the exit-frame rotation before grating-specific
    /// `chi`/`omega` insertion. Exposed so `kinds::grating` can compute the
    /// in-plane grating vector before deciding the final `surface_direct`.
    pub fn base_rotation(&self) -> Result<Transform> {
        let theta = self.angle("theta")?;
        let phi = self.angle("phi")?;
        let mut rot = Transform::rot_z(phi);
        if !self.transmissive {
            rot = rot.compose(&Transform::rot_y(-2.0 * theta));
        }
        Ok(rot)
    }

    /// Completes alignment given the exit-frame rotation computed by
    /// [`Element::base_rotation`] (or a grating-adjusted variant of it),
    /// advancing the chief ray, computing `exit_frame`, and building
    /// `surface_direct`/`surface_inverse`.
    pub fn finish_surface_direct(&mut self, wavelength: f64, upstream: Option<&Transform>, exit_rotation: Transform) -> Result<()> {
        let theta = self.angle("theta")?;
        let phi = self.angle("phi")?;
        let psi = self.angle("psi")?;
        let dtheta = self.angle("Dtheta")?;
        let dphi = self.angle("Dphi")?;
        let dpsi = self.angle("Dpsi")?;
        let dx = self.angle("DX")?;
        let dy = self.angle("DY")?;
        let dz = self.angle("DZ")?;
        let distance = self.angle("distance")?;

        let upstream_frame = upstream.copied().unwrap_or_else(Transform::identity);

        let mut chief = Ray::new(Point3::origin(), Vector3::z_axis(), wavelength);
        chief.apply_affine(&upstream_frame);
        chief.advance(distance);
        chief.rebase();
        self.translation_from_previous = (chief.origin - upstream_frame.apply_point(&Point3::origin())).to_vector();

        let upstream_rot_only = Transform {
            rot: upstream_frame.rot,
            t: Vector3::zero(),
        };
        let cumulative_rot = upstream_rot_only.compose(&exit_rotation);
        self.exit_frame = Transform {
            rot: cumulative_rot.rot,
            t: chief.origin.to_vector(),
        };
        self.frame_direct = Transform {
            rot: self.exit_frame.rot,
            t: Vector3::zero(),
        };
        self.frame_inverse = self.frame_direct.inverse();

        let mut sd = Transform::rot_z(phi + dphi).compose(&Transform::rot_x(-(theta + dtheta)));
        if !self.transmissive {
            // "flip-to-normal-along-Y": reflective surface definitions are
            // drawn with +Z away from the incoming ray, so the local frame
            // gets an extra half-turn about X before the roll.
            sd = sd.compose(&Transform::rot_x(std::f64::consts::PI));
        }
        sd = sd.compose(&Transform::rot_z(psi + dpsi));
        sd = Transform::translation(Vector3::new(dx, dy, dz)).compose(&sd);

        self.surface_direct = sd;
        self.surface_inverse = sd.inverse();
        self.aligned = true;
        Ok(())
    }

    pub fn alignment_error(&self) -> Error {
        Error::AlignmentFailure {
            element: self.name.clone(),
            reason: "setup_transforms failed".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_element_starts_unaligned_and_has_alignment_params() {
        let e = Element::new("M1", "Mirror<Plane>", false);
        assert!(!e.is_aligned());
        assert!(e.params.get("theta").is_some());
    }

    #[test]
    fn setting_a_parameter_clears_aligned_flag() {
        let mut e = Element::new("M1", "Mirror<Plane>", false);
        e.setup_transforms(500e-9, None).unwrap();
        assert!(e.is_aligned());
        e.set_scalar("theta", 0.1).unwrap();
        assert!(!e.is_aligned());
    }

    #[test]
    fn head_element_aligns_against_lab_identity() {
        let mut e = Element::new("Source", "Source<CartesianGrid,Gaussian>", true);
        e.set_scalar("distance", 1.0).unwrap();
        e.setup_transforms(500e-9, None).unwrap();
        assert!((e.translation_from_previous.z - 1.0).abs() < 1e-9);
    }
}
