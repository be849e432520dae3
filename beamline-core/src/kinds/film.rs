use crate::element::Element;
use crate::shapes::Shape;
use crate::surface::Surface;

/// Transmissive, recording-only element kind (spec §4.4 step 8, L5):
/// `Surface + Shape`, direction passes through unchanged.
#[derive(Debug, Clone)]
pub struct Film {
    pub surface: Surface,
    pub shape: Shape,
}

impl Film {
    pub fn new(element: Element, shape: Shape) -> Film {
        Film { surface: Surface::new(element), shape }
    }
}
