//! Diagnostic extraction (spec §4.7, L8): converts recorded impact buffers
//! into spot diagrams, caustics, wavefront Legendre expansions, a binned
//! focal-diagram stack, and a PSF stack.

use std::f64::consts::PI;

use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::error::{Error, Result};
use crate::geometry::Point3;
use crate::ray::Ray;
use crate::shapes::{Basis, PolySurface};

/// A dense per-spot diagram (spec §3): `m_dim` scalars per spot, stored
/// column-major (`data[spot * dim + component]`, which is the same layout
/// either way since every spot's components are contiguous), plus
/// per-component statistics and loss accounting.
#[derive(Debug, Clone)]
pub struct Diagram {
    pub dim: usize,
    pub data: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub mean: Vec<f64>,
    pub sigma: Vec<f64>,
    pub count: usize,
    pub lost: usize,
    pub dropped: usize,
}

impl Diagram {
    fn from_rows(dim: usize, rows: Vec<[f64; 8]>, lost: usize, dropped: usize) -> Diagram {
        let count = rows.len();
        let mut data = Vec::with_capacity(count * dim);
        let mut min = vec![f64::INFINITY; dim];
        let mut max = vec![f64::NEG_INFINITY; dim];
        let mut mean = vec![0.0; dim];
        for row in &rows {
            for c in 0..dim {
                let v = row[c];
                data.push(v);
                min[c] = min[c].min(v);
                max[c] = max[c].max(v);
                mean[c] += v;
            }
        }
        if count > 0 {
            for m in mean.iter_mut() {
                *m /= count as f64;
            }
        }
        let mut sigma = vec![0.0; dim];
        if count > 0 {
            for row in &rows {
                for c in 0..dim {
                    sigma[c] += (row[c] - mean[c]).powi(2);
                }
            }
            for s in sigma.iter_mut() {
                *s = (*s / count as f64).sqrt();
            }
        }
        Diagram {
            dim,
            data,
            min,
            max,
            mean,
            sigma,
            count,
            lost,
            dropped,
        }
    }
}

/// Spec §4.7: advance each impact by `z_offset` along its direction, then
/// record `(x, y, dx/dz, dy/dz, wavelength)`. `lost` is supplied by the
/// caller (the propagation-time counter; the impact buffer itself only ever
/// holds rays that survived to be recorded).
pub fn spot_diagram(impacts: &[Ray], z_offset: f64, lost: usize) -> Diagram {
    let rows = impacts
        .iter()
        .map(|r| {
            let p = r.position_at(z_offset);
            let d = r.direction;
            [p.x, p.y, d.x / d.z, d.y / d.z, r.wavelength, 0.0, 0.0, 0.0]
        })
        .collect();
    Diagram::from_rows(5, rows, lost, 0)
}

/// Spec §4.7: closest-approach point of each impact to the chief ray, in
/// `(x, y, z, wavelength)`. The chief ray is the ray recorded at index 0 of
/// this element's own impact buffer — since rays are propagated in
/// source-emission order (spec §5), that is exactly "the source's index-0
/// ray, propagated to this element". Rays nearly parallel to the chief ray
/// (cos angle > 1 − 10⁻¹⁰) are counted as dropped rather than plotted.
pub fn caustic(impacts: &[Ray], lost: usize) -> Result<Diagram> {
    let chief = *impacts
        .first()
        .ok_or_else(|| Error::InvalidArgument("caustic requires a non-empty impact buffer".into()))?;
    let mut rows = Vec::with_capacity(impacts.len());
    let mut dropped = 0;
    for ray in impacts {
        let (_, t1, _) = ray.minimum_distance_to(&chief);
        if t1.is_infinite() {
            dropped += 1;
            continue;
        }
        let p = ray.position_at(t1);
        rows.push([p.x, p.y, p.z, ray.wavelength, 0.0, 0.0, 0.0, 0.0]);
    }
    Ok(Diagram::from_rows(4, rows, lost, dropped))
}

/// Result of a wavefront extraction: the fitted bi-Legendre OPD surface plus
/// the residual RMS of the fit (spec §4.7).
#[derive(Debug, Clone)]
pub struct WavefrontExpansion {
    pub surface: PolySurface,
    pub residual_rms: f64,
}

/// Spec §4.7: move every impact to the plane `reference_distance` ahead of
/// the chief ray, then fit the optical path difference — here taken as the
/// projection of `impact − chief` onto the chief direction at that plane,
/// the geometric-OPD reading consistent with §1's "optional OPD
/// reconstruction" Non-goal carve-out — as a bi-Legendre expansion of order
/// `(nx, ny)` over the transverse `(x, y)` footprint of the impacts.
pub fn wavefront_expansion(impacts: &[Ray], reference_distance: f64, nx: usize, ny: usize) -> Result<WavefrontExpansion> {
    let chief = *impacts
        .first()
        .ok_or_else(|| Error::InvalidArgument("wavefront extraction requires a non-empty impact buffer".into()))?;
    let chief_ref = chief.position_at(reference_distance);
    let chief_dir = chief.direction;

    let mut samples = Vec::with_capacity(impacts.len());
    let (mut xmin, mut xmax, mut ymin, mut ymax) = (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for ray in impacts {
        let p = ray.position_at(reference_distance);
        let local = p - chief_ref;
        let opd = local.dot(&chief_dir);
        xmin = xmin.min(local.x);
        xmax = xmax.max(local.x);
        ymin = ymin.min(local.y);
        ymax = ymax.max(local.y);
        samples.push((local.x, local.y, opd));
    }
    if !(xmax > xmin) || !(ymax > ymin) {
        return Err(Error::InvalidArgument("wavefront footprint degenerates to a point".into()));
    }

    let mut surface = PolySurface::new(Basis::Legendre, nx, ny, xmin, xmax, ymin, ymax);
    let residual_rms = surface.fit_from_heights(&samples)?;
    Ok(WavefrontExpansion { surface, residual_rms })
}

/// Spec §4.7: a 3D integer tensor binning spots over a Z range at a fixed
/// X/Y grid resolution.
#[derive(Debug, Clone)]
pub struct FocalStack {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
    /// `counts[iz * ny * nx + iy * nx + ix]`.
    pub counts: Vec<u32>,
}

pub fn focal_stack(
    impacts: &[Ray],
    xmin: f64,
    xmax: f64,
    nx: usize,
    ymin: f64,
    ymax: f64,
    ny: usize,
    zmin: f64,
    zmax: f64,
    nz: usize,
) -> FocalStack {
    let mut counts = vec![0u32; nx * ny * nz.max(1)];
    for ray in impacts {
        for iz in 0..nz {
            let z = if nz <= 1 {
                zmin
            } else {
                zmin + (zmax - zmin) * iz as f64 / (nz - 1) as f64
            };
            let p = ray.position_at(z);
            if p.x < xmin || p.x > xmax || p.y < ymin || p.y > ymax {
                continue;
            }
            let ix = (((p.x - xmin) / (xmax - xmin) * nx as f64) as usize).min(nx - 1);
            let iy = (((p.y - ymin) / (ymax - ymin) * ny as f64) as usize).min(ny - 1);
            counts[iz * ny * nx + iy * nx + ix] += 1;
        }
    }
    FocalStack {
        nx,
        ny,
        nz,
        xmin,
        xmax,
        ymin,
        ymax,
        zmin,
        zmax,
        counts,
    }
}

/// A 4D (x, y, z-offset, complex) PSF stack (spec §4.7): `planes[k]` is the
/// complex image-plane field for the `k`-th defocus offset, row-major
/// `ny * nx`.
#[derive(Debug, Clone)]
pub struct PsfStack {
    pub nx: usize,
    pub ny: usize,
    pub pixel_size: f64,
    pub planes: Vec<Vec<Complex64>>,
}

/// Spec §4.7: evaluate the complex pupil field from a wavefront Legendre
/// expansion on an `grid_n × grid_n` grid, defocus it by each of
/// `num_offset_planes` Z positions between `z_first_offset` and
/// `z_last_offset`, and propagate to the image plane with a 2D FFT (a
/// uniform-spacing stand-in for the source's chirp-Z/NUFFT, adequate once
/// the pupil grid itself is oversampled to the requested floor). Returns the
/// possibly-enlarged effective pixel size actually used.
pub fn psf_stack(
    wavefront: &WavefrontExpansion,
    wavelength: f64,
    grid_n: usize,
    requested_pixel_size: f64,
    min_oversampling: f64,
    num_offset_planes: usize,
    z_first_offset: f64,
    z_last_offset: f64,
) -> Result<PsfStack> {
    if grid_n == 0 || !grid_n.is_power_of_two() {
        return Err(Error::InvalidArgument("PSF grid size must be a nonzero power of two".into()));
    }
    let surf = &wavefront.surface;
    let half_x = (surf.xmax - surf.xmin) / 2.0;
    let half_y = (surf.ymax - surf.ymin) / 2.0;
    let pupil_radius = half_x.min(half_y);

    // Nyquist floor for the chosen grid: pixel size can only shrink so far
    // before the FFT's implicit periodicity aliases the pupil extent.
    let min_pixel = wavelength * min_oversampling / (2.0 * pupil_radius);
    let pixel_size = requested_pixel_size.max(min_pixel);

    let mut planner = FftPlanner::<f64>::new();
    let fft_row = planner.plan_fft_forward(grid_n);
    let fft_col = planner.plan_fft_forward(grid_n);

    let mut planes = Vec::with_capacity(num_offset_planes.max(1));
    for k in 0..num_offset_planes.max(1) {
        let z = if num_offset_planes <= 1 {
            z_first_offset
        } else {
            z_first_offset + (z_last_offset - z_first_offset) * k as f64 / (num_offset_planes - 1) as f64
        };

        let mut field = vec![Complex64::new(0.0, 0.0); grid_n * grid_n];
        for j in 0..grid_n {
            let y = surf.ymin + (surf.ymax - surf.ymin) * j as f64 / (grid_n - 1).max(1) as f64;
            for i in 0..grid_n {
                let x = surf.xmin + (surf.xmax - surf.xmin) * i as f64 / (grid_n - 1).max(1) as f64;
                let r2 = (x * x) / (half_x * half_x) + (y * y) / (half_y * half_y);
                if r2 > 1.0 {
                    continue;
                }
                let (opd, ..) = surf.eval(x, y);
                let defocus = PI * z * (x * x + y * y) / wavelength;
                let phase = 2.0 * PI * opd / wavelength + defocus;
                field[j * grid_n + i] = Complex64::from_polar(1.0, phase);
            }
        }

        for row in 0..grid_n {
            fft_row.process(&mut field[row * grid_n..(row + 1) * grid_n]);
        }
        let mut col_buf = vec![Complex64::new(0.0, 0.0); grid_n];
        for col in 0..grid_n {
            for row in 0..grid_n {
                col_buf[row] = field[row * grid_n + col];
            }
            fft_col.process(&mut col_buf);
            for row in 0..grid_n {
                field[row * grid_n + col] = col_buf[row];
            }
        }
        planes.push(field);
    }

    Ok(PsfStack {
        nx: grid_n,
        ny: grid_n,
        pixel_size,
        planes,
    })
}

/// Chief ray used by a spot/caustic/wavefront call when the caller does not
/// want to rely on impact-buffer index 0 (e.g. a diagnostic taken before any
/// `radiate` call populated the buffer).
pub fn synthesize_chief_ray(origin: Point3, wavelength: f64) -> Ray {
    Ray::new(origin, crate::geometry::Vector3::z_axis(), wavelength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vector3;

    fn ray(x: f64, y: f64, dx: f64, dy: f64) -> Ray {
        Ray::new(Point3::new(x, y, 0.0), Vector3::new(dx, dy, 1.0), 500e-9)
    }

    #[test]
    fn spot_diagram_reports_mean_and_count() {
        let impacts = vec![ray(-1.0, 0.0, 0.0, 0.0), ray(1.0, 0.0, 0.0, 0.0)];
        let d = spot_diagram(&impacts, 0.0, 0);
        assert_eq!(d.count, 2);
        assert!(d.mean[0].abs() < 1e-12);
        assert_eq!(d.lost, 0);
    }

    #[test]
    fn caustic_drops_rays_parallel_to_chief() {
        let chief = ray(0.0, 0.0, 0.0, 0.0);
        let parallel = ray(0.2, 0.0, 0.0, 0.0);
        let skew = ray(0.0, 0.0, 0.01, 0.0);
        let d = caustic(&[chief, parallel, skew], 0).unwrap();
        assert_eq!(d.dropped, 1);
        assert_eq!(d.count, 2);
    }

    #[test]
    fn focal_stack_counts_total_impacts_per_plane() {
        let impacts = vec![ray(0.0, 0.0, 0.0, 0.0), ray(0.5, 0.5, 0.0, 0.0)];
        let stack = focal_stack(&impacts, -1.0, 1.0, 4, -1.0, 1.0, 4, 0.0, 0.0, 1);
        let total: u32 = stack.counts.iter().sum();
        assert_eq!(total, 2);
    }
}
