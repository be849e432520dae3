//! Sources (spec §4.6, L6): `Surface` subclasses that short-circuit
//! `intercept` and instead populate the impact buffer by sampling.
//!
//! All numeric source parameters (divergence/size ranges, grid counts,
//! sigmas) live in the underlying `Element`'s `ParameterDict` under
//! `Group::Source` rather than as separate struct fields, so the C-ABI-style
//! get/set-by-name surface (spec §6) sees the same values `generate` reads.

use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::element::Element;
use crate::error::{Error, Result};
use crate::geometry::{Point3, Vector3};
use crate::parameter::{Group, Parameter, Unit};
use crate::ray::Ray;
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    CartesianGrid,
    PolarGrid,
    Gaussian,
    AstigmaticGaussian,
    BMGaussian,
}

#[derive(Debug, Clone)]
pub struct Source {
    pub surface: Surface,
    pub kind: SourceKind,
}

fn unbounded(v: f64) -> Parameter {
    Parameter::scalar(v, -f64::INFINITY, f64::INFINITY, 1.0, Unit::Distance, Group::Source)
}

fn count(v: f64) -> Parameter {
    Parameter::scalar(v, 0.0, f64::INFINITY, 1.0, Unit::Dimensionless, Group::Source)
}

impl Source {
    pub fn new(mut element: Element, kind: SourceKind) -> Source {
        element.transmissive = true;
        let p = &mut element.params;
        match kind {
            SourceKind::CartesianGrid => {
                for k in ["divX", "divY", "sizeX", "sizeY"] {
                    p.insert(k, unbounded(0.0));
                }
                for k in ["nXdiv", "nYdiv", "nXsize", "nYsize"] {
                    p.insert(k, count(1.0));
                }
            }
            SourceKind::PolarGrid => {
                p.insert("divR", unbounded(0.0));
                p.insert("sizeR", unbounded(0.0));
                for k in ["nRdiv", "nRsize", "nThetaDiv", "nThetaSize"] {
                    p.insert(k, count(1.0));
                }
            }
            SourceKind::Gaussian => {
                p.insert("nRays", count(1.0));
                for k in ["sigmaX", "sigmaY", "sigmaXdiv", "sigmaYdiv"] {
                    p.insert(k, unbounded(0.0));
                }
            }
            SourceKind::AstigmaticGaussian => {
                p.insert("nRays", count(1.0));
                for k in ["sigmaX", "sigmaY", "sigmaXdiv", "sigmaYdiv", "waistX", "waistY"] {
                    p.insert(k, unbounded(0.0));
                }
            }
            SourceKind::BMGaussian => {
                p.insert("nRays", count(1.0));
                for k in ["sigmaX", "sigmaY", "sigmaXdiv", "sigmaYdiv", "trajectoryRadius", "apertureX"] {
                    p.insert(k, unbounded(0.0));
                }
            }
        }
        Source {
            surface: Surface::new(element),
            kind,
        }
    }

    fn get(&self, name: &str) -> Result<f64> {
        self.surface.element.params.get_scalar(&self.surface.element.name, name)
    }

    fn polarisation_amplitudes(polar: char) -> Result<(num_complex::Complex64, num_complex::Complex64)> {
        use num_complex::Complex64;
        let root2 = std::f64::consts::SQRT_2;
        match polar {
            'S' => Ok((Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0))),
            'P' => Ok((Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0))),
            'R' => Ok((Complex64::new(root2, 0.0), Complex64::new(0.0, root2))),
            'L' => Ok((Complex64::new(root2, 0.0), Complex64::new(0.0, -root2))),
            other => Err(Error::InvalidArgument(format!("unknown polarisation character `{other}`"))),
        }
    }

    fn new_ray(&self, origin: Point3, direction: Vector3, wavelength: f64, polar: char) -> Result<Ray> {
        let (s, p) = Self::polarisation_amplitudes(polar)?;
        let mut r = Ray::new(origin, direction, wavelength);
        r.amplitude_s = s;
        r.amplitude_p = p;
        Ok(r)
    }

    /// Spec §4.6: `generate` populates the impact buffer with a randomly or
    /// regularly sampled ray set, depending on `kind`.
    pub fn generate(&mut self, wavelength: f64, polar: char) -> Result<()> {
        let rays = match self.kind {
            SourceKind::CartesianGrid => self.generate_cartesian_grid(wavelength, polar)?,
            SourceKind::PolarGrid => self.generate_polar_grid(wavelength, polar)?,
            SourceKind::Gaussian => self.generate_gaussian(wavelength, polar)?,
            SourceKind::AstigmaticGaussian => self.generate_astigmatic_gaussian(wavelength, polar)?,
            SourceKind::BMGaussian => self.generate_bm_gaussian(wavelength, polar)?,
        };
        self.surface.impacts = rays;
        Ok(())
    }

    /// Spec §4.6: regular angular grid, used for wavefront/PSF extraction;
    /// no random sampling regardless of `kind`.
    pub fn wave_radiate(&mut self, wavelength: f64, theta_x: f64, theta_y: f64, nx: usize, ny: usize, polar: char) -> Result<()> {
        let xs = axis_values(theta_x, nx);
        let ys = axis_values(theta_y, ny);
        let mut rays = Vec::with_capacity(xs.len() * ys.len());
        for &dy in &ys {
            for &dx in &xs {
                let dir = Vector3::new(dx, dy, 1.0).normalize();
                rays.push(self.new_ray(Point3::origin(), dir, wavelength, polar)?);
            }
        }
        self.surface.impacts = rays;
        Ok(())
    }

    fn generate_cartesian_grid(&self, wavelength: f64, polar: char) -> Result<Vec<Ray>> {
        let div_x = axis_values(self.get("divX")?, self.get("nXdiv")? as usize);
        let div_y = axis_values(self.get("divY")?, self.get("nYdiv")? as usize);
        let size_x = axis_values(self.get("sizeX")?, self.get("nXsize")? as usize);
        let size_y = axis_values(self.get("sizeY")?, self.get("nYsize")? as usize);

        let mut rays = Vec::with_capacity(div_x.len() * div_y.len() * size_x.len() * size_y.len());
        for &y in &size_y {
            for &x in &size_x {
                for &dy in &div_y {
                    for &dx in &div_x {
                        let dir = Vector3::new(dx, dy, 1.0).normalize();
                        rays.push(self.new_ray(Point3::new(x, y, 0.0), dir, wavelength, polar)?);
                    }
                }
            }
        }
        Ok(rays)
    }

    fn generate_polar_grid(&self, wavelength: f64, polar: char) -> Result<Vec<Ray>> {
        let div = polar_points(self.get("divR")?, self.get("nRdiv")? as usize, self.get("nThetaDiv")? as usize);
        let size = polar_points(self.get("sizeR")?, self.get("nRsize")? as usize, self.get("nThetaSize")? as usize);

        let mut rays = Vec::with_capacity(div.len() * size.len());
        for &(x, y) in &size {
            for &(dx, dy) in &div {
                let dir = Vector3::new(dx, dy, 1.0).normalize();
                rays.push(self.new_ray(Point3::new(x, y, 0.0), dir, wavelength, polar)?);
            }
        }
        Ok(rays)
    }

    fn generate_gaussian(&self, wavelength: f64, polar: char) -> Result<Vec<Ray>> {
        let n = self.get("nRays")? as usize;
        if n == 1 {
            return Ok(vec![self.new_ray(Point3::origin(), Vector3::z_axis(), wavelength, polar)?]);
        }
        let sigma_x = self.get("sigmaX")?;
        let sigma_y = self.get("sigmaY")?;
        let sigma_xd = self.get("sigmaXdiv")?;
        let sigma_yd = self.get("sigmaYdiv")?;

        let mut rays = Vec::with_capacity(n);
        let rng = &mut *rng_lock();
        for _ in 0..n {
            let x = sample_normal(rng, sigma_x);
            let y = sample_normal(rng, sigma_y);
            let dx = sample_normal(rng, sigma_xd);
            let dy = sample_normal(rng, sigma_yd);
            let dir = Vector3::new(dx, dy, 1.0).normalize();
            rays.push(self.new_ray(Point3::new(x, y, 0.0), dir, wavelength, polar)?);
        }
        Ok(rays)
    }

    fn generate_astigmatic_gaussian(&self, wavelength: f64, polar: char) -> Result<Vec<Ray>> {
        let n = self.get("nRays")? as usize;
        if n == 1 {
            return Ok(vec![self.new_ray(Point3::origin(), Vector3::z_axis(), wavelength, polar)?]);
        }
        let sigma_x = self.get("sigmaX")?;
        let sigma_y = self.get("sigmaY")?;
        let sigma_xd = self.get("sigmaXdiv")?;
        let sigma_yd = self.get("sigmaYdiv")?;
        let waist_x = self.get("waistX")?;
        let waist_y = self.get("waistY")?;

        let mut rays = Vec::with_capacity(n);
        let rng = &mut *rng_lock();
        for _ in 0..n {
            let x = sample_normal(rng, sigma_x);
            let y = sample_normal(rng, sigma_y);
            let dx = sample_normal(rng, sigma_xd);
            let dy = sample_normal(rng, sigma_yd);
            let origin = Point3::new(x - waist_x * dx, y - waist_y * dy, 0.0);
            let dir = Vector3::new(dx, dy, 1.0).normalize();
            rays.push(self.new_ray(origin, dir, wavelength, polar)?);
        }
        Ok(rays)
    }

    fn generate_bm_gaussian(&self, wavelength: f64, polar: char) -> Result<Vec<Ray>> {
        let n = self.get("nRays")? as usize;
        if n == 1 {
            return Ok(vec![self.new_ray(Point3::origin(), Vector3::z_axis(), wavelength, polar)?]);
        }
        let sigma_x = self.get("sigmaX")?;
        let sigma_y = self.get("sigmaY")?;
        let sigma_xd = self.get("sigmaXdiv")?;
        let sigma_yd = self.get("sigmaYdiv")?;

        let mut rays = Vec::with_capacity(n);
        let rng = &mut *rng_lock();
        for _ in 0..n {
            let x = sample_normal(rng, sigma_x);
            let y = sample_normal(rng, sigma_y);
            let dx = sample_normal(rng, sigma_xd);
            let dy = if polar == 'P' {
                sample_bm_divergence(rng, sigma_yd)
            } else {
                sample_normal(rng, sigma_yd)
            };
            let dir = Vector3::new(dx, dy, 1.0).normalize();
            rays.push(self.new_ray(Point3::new(x, y, 0.0), dir, wavelength, polar)?);
        }
        Ok(rays)
    }
}

/// `2n-1` values symmetric about zero spanning `[-half_range, half_range]`
/// (spec §4.6: Cartesian-grid axis counts); `n == 0` collapses to a single
/// on-axis value.
fn axis_values(half_range: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return vec![0.0];
    }
    let count = 2 * n - 1;
    (0..count)
        .map(|i| {
            let k = i as isize - (n as isize - 1);
            half_range * k as f64 / n as f64
        })
        .collect()
}

/// Polar sampling grid at radii `R . sqrt(i/nr)` (uniform areal density),
/// `ntheta` angles per radius, plus the on-axis point (spec §4.6).
/// `nr == 0` collapses to the on-axis point alone regardless of `ntheta`.
fn polar_points(r_max: f64, nr: usize, ntheta: usize) -> Vec<(f64, f64)> {
    let mut pts = vec![(0.0, 0.0)];
    if nr == 0 {
        return pts;
    }
    let ntheta = ntheta.max(1);
    for i in 1..=nr {
        let r = r_max * (i as f64 / nr as f64).sqrt();
        for j in 0..ntheta {
            let theta = 2.0 * std::f64::consts::PI * j as f64 / ntheta as f64;
            pts.push((r * theta.cos(), r * theta.sin()));
        }
    }
    pts
}

fn rng_lock() -> std::sync::MutexGuard<'static, StdRng> {
    static RNG: OnceLock<std::sync::Mutex<StdRng>> = OnceLock::new();
    RNG.get_or_init(|| std::sync::Mutex::new(StdRng::from_entropy())).lock().unwrap()
}

fn sample_normal(rng: &mut StdRng, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    Normal::new(0.0, sigma).expect("sigma already checked positive").sample(rng)
}

/// Rejection-samples the BM-type Y-divergence density for P polarisation
/// (spec §4.6): `f(theta) ~ theta^2/(theta^2 + 2*pi*sigma'^2) * exp(-theta^2/(2 sigma'^2))`.
/// Proposal is a zero-mean Gaussian with the same sigma, scaled by a fixed
/// envelope constant (the correction factor is bounded by 1).
fn sample_bm_divergence(rng: &mut StdRng, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    let normal = Normal::new(0.0, sigma).expect("sigma already checked positive");
    loop {
        let theta: f64 = normal.sample(rng);
        let correction = theta * theta / (theta * theta + 2.0 * std::f64::consts::PI * sigma * sigma);
        if rng.gen::<f64>() < correction {
            return theta;
        }
    }
}

/// Derives Gaussian-source parameters from undulator geometry (spec §4.6).
/// Returns `(sigma_x, sigma_y, sigma_xdiv, sigma_ydiv, waist_x, waist_y)`;
/// the waist terms are only meaningful for the astigmatic-gaussian kind.
pub fn emulate_undulator(
    sigma_x: f64,
    sigma_y: f64,
    sigma_xdiv: f64,
    sigma_ydiv: f64,
    length: f64,
    distance_to_source: f64,
    wavelength: f64,
    detuning: f64,
) -> (f64, f64, f64, f64, f64, f64) {
    let sigma2_diff = wavelength * length / (8.0 * std::f64::consts::PI.powi(2) * detuning);
    let sigmap2_diff = wavelength * detuning / (2.0 * length);

    let combine = |sigma: f64, sigma_div: f64| -> (f64, f64, f64) {
        let sigmap2_total = sigma_div * sigma_div + sigmap2_diff;
        let waist = sigmap2_diff * distance_to_source / sigmap2_total;
        let sigma2_total =
            sigma * sigma + sigma2_diff + sigma_div * sigma_div * sigmap2_diff * distance_to_source.powi(2) / sigmap2_total;
        (sigma2_total.sqrt(), sigmap2_total.sqrt(), waist)
    };

    let (sx_total, sxdiv_total, waist_x) = combine(sigma_x, sigma_xdiv);
    let (sy_total, sydiv_total, waist_y) = combine(sigma_y, sigma_ydiv);
    (sx_total, sy_total, sxdiv_total, sydiv_total, waist_x, waist_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_grid_single_point_is_one_ray_on_axis() {
        let mut s = Source::new(Element::new("Src", "Source<CartesianGrid,Gaussian>", true), SourceKind::CartesianGrid);
        for k in ["nXdiv", "nYdiv", "nXsize", "nYsize"] {
            s.surface.element.set_scalar(k, 1.0).unwrap();
        }
        for k in ["divX", "divY", "sizeX", "sizeY"] {
            s.surface.element.set_scalar(k, 0.0).unwrap();
        }
        s.generate(500e-9, 'S').unwrap();
        assert_eq!(s.surface.impacts.len(), 1);
        let r = s.surface.impacts[0];
        assert!((r.origin.x).abs() < 1e-12 && (r.origin.y).abs() < 1e-12);
    }

    #[test]
    fn cartesian_grid_counts_multiply() {
        let mut s = Source::new(Element::new("Src", "Source<CartesianGrid,Gaussian>", true), SourceKind::CartesianGrid);
        s.surface.element.set_scalar("nXdiv", 2.0).unwrap();
        s.surface.element.set_scalar("nYdiv", 1.0).unwrap();
        s.surface.element.set_scalar("nXsize", 3.0).unwrap();
        s.surface.element.set_scalar("nYsize", 1.0).unwrap();
        s.surface.element.set_scalar("divX", 1e-3).unwrap();
        s.surface.element.set_scalar("sizeX", 1e-3).unwrap();
        s.generate(500e-9, 'S').unwrap();
        // (2*2-1) * (2*1-1) * (2*3-1) * (2*1-1) = 3*1*5*1
        assert_eq!(s.surface.impacts.len(), 15);
    }

    #[test]
    fn polar_grid_zero_radius_is_single_onaxis_ray() {
        let mut s = Source::new(Element::new("Src", "Source<PolarGrid,Gaussian>", true), SourceKind::PolarGrid);
        s.surface.element.set_scalar("nRdiv", 0.0).unwrap();
        s.surface.element.set_scalar("nRsize", 0.0).unwrap();
        s.generate(500e-9, 'S').unwrap();
        assert_eq!(s.surface.impacts.len(), 1);
    }

    #[test]
    fn gaussian_single_ray_is_axial() {
        let mut s = Source::new(Element::new("Src", "Source<CartesianGrid,Gaussian>", true), SourceKind::Gaussian);
        s.surface.element.set_scalar("nRays", 1.0).unwrap();
        s.generate(25e-9, 'S').unwrap();
        assert_eq!(s.surface.impacts.len(), 1);
        assert!((s.surface.impacts[0].direction.z - 1.0).abs() < 1e-12);
    }
}
