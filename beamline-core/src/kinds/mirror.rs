use crate::element::Element;
use crate::shapes::Shape;
use crate::surface::Surface;

/// Reflective element kind (spec §4.4 step 8, L5): `Surface + Shape`.
#[derive(Debug, Clone)]
pub struct Mirror {
    pub surface: Surface,
    pub shape: Shape,
}

impl Mirror {
    pub fn new(element: Element, shape: Shape) -> Mirror {
        Mirror { surface: Surface::new(element), shape }
    }
}
