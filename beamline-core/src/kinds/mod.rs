//! Element kinds (spec §4.4 step 8, §9, L5/L6): the enum of tagged variants
//! that replaces the source's `Mirror<Shape>` / `Grating<Pattern,Shape>` /
//! `Source<Kind,Distribution>` C++ template instantiations.

mod film;
mod grating;
mod mirror;

pub use film::Film;
pub use grating::Grating;
pub use mirror::Mirror;

use crate::element::Element;
use crate::error::Result;
use crate::geometry::Transform;
use crate::source::Source;
use crate::surface::Surface;

#[derive(Debug, Clone)]
pub enum ElementKind {
    Mirror(Mirror),
    Film(Film),
    Grating(Grating),
    Source(Source),
}

impl ElementKind {
    pub fn surface(&self) -> &Surface {
        match self {
            ElementKind::Mirror(m) => &m.surface,
            ElementKind::Film(f) => &f.surface,
            ElementKind::Grating(g) => &g.surface,
            ElementKind::Source(s) => &s.surface,
        }
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        match self {
            ElementKind::Mirror(m) => &mut m.surface,
            ElementKind::Film(f) => &mut f.surface,
            ElementKind::Grating(g) => &mut g.surface,
            ElementKind::Source(s) => &mut s.surface,
        }
    }

    pub fn element(&self) -> &Element {
        &self.surface().element
    }

    pub fn element_mut(&mut self) -> &mut Element {
        &mut self.surface_mut().element
    }

    pub fn is_source(&self) -> bool {
        matches!(self, ElementKind::Source(_))
    }

    pub fn is_grating(&self) -> bool {
        matches!(self, ElementKind::Grating(_))
    }

    pub fn class_name(&self) -> &str {
        &self.element().class_name
    }

    /// Dispatches spec §4.3 alignment to the per-kind `setup_transforms`;
    /// `wavelength_align` is only meaningful for [`ElementKind::Grating`]
    /// (chi/omega insertion) and is otherwise ignored.
    pub fn setup_transforms(&mut self, wavelength: f64, upstream: Option<&Transform>, wavelength_align: f64) -> Result<()> {
        match self {
            ElementKind::Mirror(m) => m.surface.element.setup_transforms(wavelength, upstream),
            ElementKind::Film(f) => f.surface.element.setup_transforms(wavelength, upstream),
            ElementKind::Source(s) => s.surface.element.setup_transforms(wavelength, upstream),
            ElementKind::Grating(g) => g.setup_transforms(wavelength, upstream, wavelength_align),
        }
    }
}
