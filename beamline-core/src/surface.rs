//! Surface (spec §3/§4.8, L3): an `Element` plus impact recording, an
//! optional surface-error map, and an optional coating reference.

use crate::element::Element;
use crate::geometry::Vector3;
use crate::ray::Ray;
use crate::shapes::Basis;
use crate::shapes::PolySurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    None,
    OnEntry,
    OnExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceErrorMethod {
    /// Displace the intercept along the unperturbed normal by the local
    /// height error.
    AddHeight,
    /// Only tilt the normal by the local height gradient; the intercept
    /// position itself is unchanged.
    TiltNormalOnly,
}

/// A rectangular height-error grid plus its characterising Legendre fit
/// (spec §4.8's `generate_surface_errors` return value).
#[derive(Debug, Clone)]
pub struct SurfaceErrorMap {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub nx: usize,
    pub ny: usize,
    /// Row-major (`y` slowest), `nx * ny` entries.
    pub heights: Vec<f64>,
    pub characterisation: PolySurface,
    pub method: SurfaceErrorMethod,
}

impl SurfaceErrorMap {
    fn cell(&self, x: f64, y: f64) -> (usize, usize, f64, f64) {
        let fx = ((x - self.xmin) / (self.xmax - self.xmin) * (self.nx - 1) as f64).clamp(0.0, (self.nx - 1) as f64);
        let fy = ((y - self.ymin) / (self.ymax - self.ymin) * (self.ny - 1) as f64).clamp(0.0, (self.ny - 1) as f64);
        let i0 = (fx.floor() as usize).min(self.nx.saturating_sub(2));
        let j0 = (fy.floor() as usize).min(self.ny.saturating_sub(2));
        (i0, j0, fx - i0 as f64, fy - j0 as f64)
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.heights[j * self.nx + i]
    }

    /// Bilinear height and (dz/dx, dz/dy), in the surface-definition frame.
    pub fn height_and_gradient(&self, x: f64, y: f64) -> (f64, f64, f64) {
        if self.nx < 2 || self.ny < 2 {
            return (0.0, 0.0, 0.0);
        }
        let (i0, j0, tx, ty) = self.cell(x, y);
        let h00 = self.at(i0, j0);
        let h10 = self.at(i0 + 1, j0);
        let h01 = self.at(i0, j0 + 1);
        let h11 = self.at(i0 + 1, j0 + 1);
        let h = h00 * (1.0 - tx) * (1.0 - ty) + h10 * tx * (1.0 - ty) + h01 * (1.0 - tx) * ty + h11 * tx * ty;
        let dx = (self.xmax - self.xmin) / (self.nx - 1) as f64;
        let dy = (self.ymax - self.ymin) / (self.ny - 1) as f64;
        let gx = ((h10 - h00) * (1.0 - ty) + (h11 - h01) * ty) / dx;
        let gy = ((h01 - h00) * (1.0 - tx) + (h11 - h10) * tx) / dy;
        (h, gx, gy)
    }
}

#[derive(Debug, Clone)]
pub struct CoatingRef {
    pub table: String,
    pub entry: String,
}

#[derive(Debug, Clone)]
pub struct Surface {
    pub element: Element,
    pub impacts: Vec<Ray>,
    pub record_mode: RecordMode,
    pub error_map: Option<SurfaceErrorMap>,
    pub coating: Option<CoatingRef>,
}

impl Surface {
    pub fn new(element: Element) -> Surface {
        Surface {
            element,
            impacts: Vec::new(),
            record_mode: RecordMode::None,
            error_map: None,
            coating: None,
        }
    }

    pub fn clear_impacts(&mut self) {
        self.impacts.clear();
    }

    pub fn record_on_entry(&mut self, ray: &Ray) {
        if self.record_mode == RecordMode::OnEntry {
            self.impacts.push(*ray);
        }
    }

    pub fn record_on_exit(&mut self, ray: &Ray) {
        if self.record_mode == RecordMode::OnExit {
            self.impacts.push(*ray);
        }
    }

    pub fn set_error_generator(&mut self, map: SurfaceErrorMap) {
        self.error_map = Some(map);
    }

    pub fn unset_surface_errors(&mut self) {
        self.error_map = None;
    }

    pub fn set_surface_errors(
        &mut self,
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        nx: usize,
        ny: usize,
        heights: Vec<f64>,
        method: SurfaceErrorMethod,
    ) {
        let mut characterisation = PolySurface::new(Basis::Legendre, 3, 3, xmin, xmax, ymin, ymax);
        let mut samples = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let x = xmin + (xmax - xmin) * i as f64 / (nx - 1).max(1) as f64;
                let y = ymin + (ymax - ymin) * j as f64 / (ny - 1).max(1) as f64;
                samples.push((x, y, heights[j * nx + i]));
            }
        }
        let _ = characterisation.fit_from_heights(&samples);
        self.error_map = Some(SurfaceErrorMap {
            xmin,
            xmax,
            ymin,
            ymax,
            nx,
            ny,
            heights,
            characterisation,
            method,
        });
    }

    /// Perturb `normal` (and optionally the intercept height `z`) using the
    /// surface-error map at `(x, y)` (spec §4.4 step 6). Returns the
    /// perturbed normal and the height displacement to apply along it.
    pub fn apply_surface_error(&self, x: f64, y: f64, normal: Vector3) -> (Vector3, f64) {
        let Some(map) = &self.error_map else {
            return (normal, 0.0);
        };
        let (h, gx, gy) = map.height_and_gradient(x, y);
        let tilted = Vector3::new(normal.x - gx, normal.y - gy, normal.z).normalize();
        match map.method {
            SurfaceErrorMethod::AddHeight => (tilted, h),
            SurfaceErrorMethod::TiltNormalOnly => (tilted, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    #[test]
    fn clear_impacts_empties_the_buffer() {
        let mut s = Surface::new(Element::new("F1", "Film", true));
        s.record_mode = RecordMode::OnExit;
        s.record_on_exit(&Ray::new(crate::geometry::Point3::origin(), Vector3::z_axis(), 500e-9));
        assert_eq!(s.impacts.len(), 1);
        s.clear_impacts();
        assert_eq!(s.impacts.len(), 0);
    }

    #[test]
    fn flat_error_map_has_zero_gradient() {
        let map = SurfaceErrorMap {
            xmin: -1.0,
            xmax: 1.0,
            ymin: -1.0,
            ymax: 1.0,
            nx: 5,
            ny: 5,
            heights: vec![2e-9; 25],
            characterisation: PolySurface::new(Basis::Legendre, 1, 1, -1.0, 1.0, -1.0, 1.0),
            method: SurfaceErrorMethod::AddHeight,
        };
        let (h, gx, gy) = map.height_and_gradient(0.3, -0.2);
        assert!((h - 2e-9).abs() < 1e-15);
        assert_eq!(gx, 0.0);
        assert_eq!(gy, 0.0);
    }
}
