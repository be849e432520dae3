//! General real quartic and cubic root solvers (spec §4.2).
//!
//! The toroid intercept reduces — by either the original's pair of 3x3
//! generalised eigenvalue problems or by direct substitution of the ray
//! parametrisation into the implicit surface — to the same quartic
//! polynomial in the ray parameter `t`. This module solves that polynomial
//! in closed form (resolvent-cubic / Ferrari reduction) rather than through
//! an eigendecomposition, since no eigensolver crate sits in the dependency
//! stack; `toroid.rs` documents the equivalence.

/// Real roots of `a*t^3 + b*t^2 + c*t + d = 0`. Always returns at least one
/// root (a cubic always has one); returns up to three when `a` is non-zero
/// and the discriminant admits it.
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    if a.abs() < 1e-300 {
        return solve_quadratic(b, c, d);
    }
    let (b, c, d) = (b / a, c / a, d / a);
    // Depress: t = y - b/3 => y^3 + p y + q = 0.
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let shift = -b / 3.0;

    let disc = (q / 2.0).powi(2) + (p / 3.0).powi(3);
    if disc > 1e-300 {
        let sqrt_disc = disc.sqrt();
        let u = cbrt(-q / 2.0 + sqrt_disc);
        let v = cbrt(-q / 2.0 - sqrt_disc);
        vec![u + v + shift]
    } else if disc.abs() <= 1e-300 {
        let u = cbrt(-q / 2.0);
        vec![2.0 * u + shift, -u + shift]
    } else {
        // Three distinct real roots (trigonometric form).
        let r = (-(p / 3.0).powi(3)).sqrt();
        let phi = (-q / (2.0 * r)).clamp(-1.0, 1.0).acos();
        let m = 2.0 * r.cbrt();
        (0..3)
            .map(|k| m * ((phi + 2.0 * std::f64::consts::PI * k as f64) / 3.0).cos() + shift)
            .collect()
    }
}

fn cbrt(x: f64) -> f64 {
    x.signum() * x.abs().cbrt()
}

fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a.abs() < 1e-300 {
        if b.abs() < 1e-300 {
            return Vec::new();
        }
        return vec![-c / b];
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        Vec::new()
    } else if disc == 0.0 {
        vec![-b / (2.0 * a)]
    } else {
        let s = disc.sqrt();
        vec![(-b + s) / (2.0 * a), (-b - s) / (2.0 * a)]
    }
}

/// Real roots of `a*t^4 + b*t^3 + c*t^2 + d*t + e = 0`, `a != 0`. Returns up
/// to 4 roots, unordered. Empty if there are no real roots.
pub fn solve_quartic(a: f64, b: f64, c: f64, d: f64, e: f64) -> Vec<f64> {
    if a.abs() < 1e-300 {
        return solve_cubic(b, c, d, e);
    }
    let (b, c, d, e) = (b / a, c / a, d / a, e / a);
    // Depress: t = y - b/4 => y^4 + p y^2 + q y + r = 0.
    let shift = -b / 4.0;
    let p = c - 3.0 * b * b / 8.0;
    let q = b.powi(3) / 8.0 - b * c / 2.0 + d;
    let r = -3.0 * b.powi(4) / 256.0 + b * b * c / 16.0 - b * d / 4.0 + e;

    if q.abs() < 1e-14 {
        // Biquadratic: y^4 + p y^2 + r = 0.
        return solve_quadratic(1.0, p, r)
            .into_iter()
            .filter(|y2| *y2 >= -1e-12)
            .flat_map(|y2| {
                let y2 = y2.max(0.0);
                let y = y2.sqrt();
                if y < 1e-12 {
                    vec![shift]
                } else {
                    vec![y + shift, -y + shift]
                }
            })
            .collect();
    }

    // Resolvent cubic: m^3 + 2p m^2 + (p^2 - 4r) m - q^2 = 0. Any real root works.
    let resolvent_roots = solve_cubic(1.0, 2.0 * p, p * p - 4.0 * r, -q * q);
    let m = resolvent_roots.into_iter().filter(|m| *m > 1e-12).fold(None, |best: Option<f64>, m| match best {
        Some(b) if b >= m => Some(b),
        _ => Some(m),
    });
    let Some(m) = m else {
        return Vec::new();
    };
    let sqrt_m = m.sqrt();
    let mut roots = Vec::new();
    roots.extend(solve_quadratic(1.0, sqrt_m, p / 2.0 + m / 2.0 - q / (2.0 * sqrt_m)));
    roots.extend(solve_quadratic(1.0, -sqrt_m, p / 2.0 + m / 2.0 + q / (2.0 * sqrt_m)));
    roots.into_iter().map(|y| y + shift).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_recovers_known_roots() {
        // (t-1)(t-2)(t+3) = t^3 - 7t - 6
        let mut roots = solve_cubic(1.0, 0.0, -7.0, -6.0);
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(roots.len(), 3);
        assert!((roots[0] + 3.0).abs() < 1e-9);
        assert!((roots[1] - 1.0).abs() < 1e-9);
        assert!((roots[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn quartic_recovers_known_roots() {
        // (t-1)(t-2)(t-3)(t-4) = t^4 -10t^3+35t^2-50t+24
        let mut roots = solve_quartic(1.0, -10.0, 35.0, -50.0, 24.0);
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(roots.len(), 4);
        for (got, want) in roots.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
        }
    }

    #[test]
    fn quartic_with_two_real_two_complex_roots_returns_only_real() {
        // (t-1)(t-2)(t^2+1) = t^4 -3t^3+3t^2-3t+2
        let roots = solve_quartic(1.0, -3.0, 3.0, -3.0, 2.0);
        assert_eq!(roots.len(), 2);
        let mut sorted = roots;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((sorted[0] - 1.0).abs() < 1e-6);
        assert!((sorted[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn biquadratic_path_recovers_symmetric_roots() {
        // t^4 - 5t^2 + 4 = (t^2-1)(t^2-4)
        let mut roots = solve_quartic(1.0, 0.0, -5.0, 0.0, 4.0);
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(roots.len(), 4);
        let expect = [-2.0, -1.0, 1.0, 2.0];
        for (got, want) in roots.iter().zip(expect) {
            assert!((got - want).abs() < 1e-6);
        }
    }
}
