//! Chained propagation (spec §4.4, L7). `radiate` walks a source's impact
//! buffer ray-by-ray through the chain; `propagate_one` implements the
//! shared transmit/reflect/diffract skeleton (spec §4.4 steps 1-10).

use crate::error::Result;
use crate::kinds::ElementKind;
use crate::registry::{ElementId, Registry};
use crate::surface::RecordMode;

/// Global feature flags threaded through every propagation call (spec §9's
/// "bundle globals into an explicit Context" redesign note).
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub apertures_enabled: bool,
    pub reflectivity_enabled: bool,
    pub surface_errors_enabled: bool,
}

/// Counters incremented as rays are lost during a `radiate` call, useful for
/// the `count + lost + dropped == impacts.size()` invariant (spec §8).
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagationStats {
    pub lost: usize,
}

/// Spec §4.4: iterates the source's impact buffer into `next.propagate`.
pub fn radiate(registry: &mut Registry, source_id: ElementId, ctx: &Context) -> Result<PropagationStats> {
    let (rays, next) = {
        let kind = registry.get(source_id)?;
        (kind.surface().impacts.clone(), kind.element().next)
    };
    let mut stats = PropagationStats::default();
    if let Some(next_id) = next {
        for ray in rays {
            let mut r = ray;
            propagate_one(registry, next_id, &mut r, ctx, &mut stats)?;
        }
    }
    Ok(stats)
}

/// Spec §4.4 steps 1-10, applied at `id` and then forwarded recursively.
fn propagate_one(registry: &mut Registry, id: ElementId, ray: &mut crate::ray::Ray, ctx: &Context, stats: &mut PropagationStats) -> Result<()> {
    let translation_from_previous = registry.get(id)?.element().translation_from_previous;
    ray.translate(-translation_from_previous);

    if !ray.alive {
        stats.lost += 1;
        let kind = registry.get_mut(id)?;
        if kind.surface().record_mode == RecordMode::OnEntry {
            kind.surface_mut().record_on_entry(ray);
        }
        return Ok(());
    }

    let surface_inverse = registry.get(id)?.element().surface_inverse;
    ray.apply_affine(&surface_inverse);

    {
        let kind = registry.get_mut(id)?;
        if kind.surface().record_mode == RecordMode::OnEntry {
            kind.surface_mut().record_on_entry(ray);
        }
    }

    let normal = {
        let kind = registry.get(id)?;
        match kind {
            ElementKind::Mirror(m) => m.shape.intercept(ray),
            ElementKind::Film(f) => f.shape.intercept(ray),
            ElementKind::Grating(g) => g.shape.intercept(ray),
            ElementKind::Source(_) => {
                // Sources short-circuit intercept: ray unchanged, normal = Z (spec §4.6).
                Some(crate::geometry::Vector3::z_axis())
            }
        }
    };
    ray.rebase();

    let Some(mut n) = normal else {
        ray.alive = false;
        stats.lost += 1;
        return Ok(());
    };
    let hit_surface_frame = ray.position_at(0.0);

    if ctx.surface_errors_enabled {
        let hit = ray.position_at(0.0);
        let kind = registry.get(id)?;
        let (perturbed, dz) = kind.surface().apply_surface_error(hit.x, hit.y, n);
        n = perturbed;
        if dz != 0.0 {
            ray.translate(n * dz);
        }
    }

    let n_surface_frame = n;
    let surface_direct = registry.get(id)?.element().surface_direct;
    ray.apply_affine(&surface_direct);
    n = surface_direct.apply_normal(&n).normalize();

    {
        let kind = registry.get_mut(id)?;
        match kind {
            ElementKind::Mirror(_) => reflect(ray, n),
            ElementKind::Film(_) => { /* transmit: direction unchanged */ }
            ElementKind::Grating(g) => {
                let g_vec = g
                    .surface
                    .element
                    .surface_direct
                    .apply_vector(&g.pattern.line_density_vector(hit_surface_frame, n_surface_frame))
                    * (g.order_use * ray.wavelength);
                let reflective = !g.surface.element.transmissive;
                let ok = diffract(ray, n, g_vec, reflective);
                if !ok {
                    ray.alive = false;
                }
            }
            ElementKind::Source(_) => {}
        }
    }

    if !ray.alive {
        stats.lost += 1;
    }

    {
        let kind = registry.get_mut(id)?;
        if ray.alive && kind.surface().record_mode == RecordMode::OnExit {
            kind.surface_mut().record_on_exit(ray);
        }
    }

    let next = registry.get(id)?.element().next;
    if ray.alive {
        if let Some(next_id) = next {
            propagate_one(registry, next_id, ray, ctx, stats)?;
        }
    }
    Ok(())
}

/// `direction <- direction - 2 (direction . normal) normal` (spec §4.4).
fn reflect(ray: &mut crate::ray::Ray, normal: crate::geometry::Vector3) {
    let d = ray.direction;
    ray.direction = d - normal * (2.0 * d.dot(&normal));
    ray.normalize();
}

/// Spec §4.4 step 8: decompose into normal/tangential parts, add the
/// grating vector to the tangential component, and rebuild the perpendicular
/// component from the evanescence test. `is_reflective` selects the sign of
/// the rebuilt perpendicular component. Returns `false` on an evanescent
/// order (the caller marks the ray lost).
fn diffract(ray: &mut crate::ray::Ray, normal: crate::geometry::Vector3, g: crate::geometry::Vector3, is_reflective: bool) -> bool {
    let d = ray.direction;
    let perp_in = d.dot(&normal);
    let tangential_in = d - normal * perp_in;
    let tangential_out = tangential_in + g;
    let perp_sq = 1.0 - tangential_out.length_squared();
    if perp_sq < 0.0 {
        return false;
    }
    let perp_mag = perp_sq.sqrt();
    let perp_sign = if is_reflective { -perp_in.signum() } else { perp_in.signum() };
    ray.direction = (tangential_out + normal * (perp_mag * perp_sign)).normalize();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::geometry::{Point3, Vector3};
    use crate::kinds::{Film, Mirror};
    use crate::shapes::Shape;
    use crate::source::{Source, SourceKind};

    #[test]
    fn point_source_plane_mirror_film_scenario() {
        let mut registry = Registry::new();

        let mut src_elem = Element::new("Src", "Source<CartesianGrid,Gaussian>", true);
        src_elem.setup_transforms(500e-9, None).unwrap();
        let src = ElementKind::Source(Source::new(src_elem, SourceKind::CartesianGrid));
        let src_id = registry.create("Src", src).unwrap();

        let mut mirror_elem = Element::new("M1", "Mirror<Plane>", false);
        mirror_elem.set_scalar("theta", std::f64::consts::FRAC_PI_4).unwrap();
        mirror_elem.set_scalar("distance", 1.0).unwrap();
        let mirror_exit = registry.get(src_id).unwrap().element().exit_frame;
        mirror_elem.setup_transforms(500e-9, Some(&mirror_exit)).unwrap();
        let mirror = ElementKind::Mirror(Mirror::new(mirror_elem, Shape::Plane));
        let mirror_id = registry.create("M1", mirror).unwrap();

        let mut film_elem = Element::new("F1", "Film", true);
        film_elem.set_scalar("distance", 1.0).unwrap();
        let film_exit = registry.get(mirror_id).unwrap().element().exit_frame;
        film_elem.setup_transforms(500e-9, Some(&film_exit)).unwrap();
        let mut film = Film::new(film_elem, Shape::Plane);
        film.surface.record_mode = RecordMode::OnExit;
        let film_id = registry.create("F1", ElementKind::Film(film)).unwrap();

        registry.link(Some(src_id), Some(mirror_id)).unwrap();
        registry.link(Some(mirror_id), Some(film_id)).unwrap();

        {
            let kind = registry.get_mut(src_id).unwrap();
            if let ElementKind::Source(s) = kind {
                s.generate(500e-9, 'S').unwrap();
            }
        }

        let ctx = Context::default();
        let stats = radiate(&mut registry, src_id, &ctx).unwrap();
        assert_eq!(stats.lost, 0);

        let film_kind = registry.get(film_id).unwrap();
        assert_eq!(film_kind.surface().impacts.len(), 1);
        let impact = film_kind.surface().impacts[0];
        assert!(impact.origin.distance(&Point3::origin()) < 1e-6);
        assert!((impact.direction.z - 1.0).abs() < 1e-6);
    }
}
