//! System registry (spec §4.9, §9, L9): name→element mapping plus a set of
//! valid handles. Spec §9 replaces the source's raw bidirectional pointers
//! with an arena of stable indices; `ElementId` is the handle, `Registry` is
//! the arena, and neighbour fields on `Element` are `Option<ElementId>`
//! rather than raw pointers.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::kinds::ElementKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

impl ElementId {
    /// Exposes the raw arena index for surfaces that need a stable integer
    /// handle outside the typed `ElementId` (spec §6's C ABI, which hands
    /// opaque `size_t` IDs across the FFI boundary).
    pub fn raw(&self) -> usize {
        self.0
    }

    pub fn from_raw(v: usize) -> ElementId {
        ElementId(v)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Option<ElementKind>>,
    names: HashMap<String, ElementId>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Spec §4.9: names are unique per system; duplicate insert fails.
    pub fn create(&mut self, name: &str, kind: ElementKind) -> Result<ElementId> {
        if self.names.contains_key(name) {
            return Err(Error::InvalidArgument(format!("duplicate element name `{name}`")));
        }
        let id = ElementId(self.slots.len());
        self.slots.push(Some(kind));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn is_valid(&self, id: ElementId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    pub fn find(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: ElementId) -> Result<&ElementKind> {
        self.slots.get(id.0).and_then(|s| s.as_ref()).ok_or(Error::InvalidHandle(id))
    }

    pub fn get_mut(&mut self, id: ElementId) -> Result<&mut ElementKind> {
        self.slots.get_mut(id.0).and_then(|s| s.as_mut()).ok_or(Error::InvalidHandle(id))
    }

    /// Link `prev -> next` (either side may be `None` to cut that link;
    /// spec §4.9 allows passing one endpoint with an explicit "none").
    pub fn link(&mut self, prev: Option<ElementId>, next: Option<ElementId>) -> Result<()> {
        if let Some(p) = prev {
            self.get_mut(p)?.element_mut().next = next;
        }
        if let Some(n) = next {
            self.get_mut(n)?.element_mut().prev = prev;
        }
        Ok(())
    }

    /// Spec §4.9: deletion removes the element, nulls neighbours' links to
    /// it, and invalidates its handle.
    pub fn delete(&mut self, id: ElementId) -> Result<()> {
        let (name, prev, next) = {
            let kind = self.get(id)?;
            let e = kind.element();
            (e.name.clone(), e.prev, e.next)
        };
        if let Some(p) = prev {
            if let Ok(pe) = self.get_mut(p) {
                pe.element_mut().next = None;
            }
        }
        if let Some(n) = next {
            if let Ok(ne) = self.get_mut(n) {
                ne.element_mut().prev = None;
            }
        }
        self.names.remove(&name);
        self.slots[id.0] = None;
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Clears every element; used by §6's "IOFailures during load leave the
    /// system cleared" policy.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.names.clear();
    }

    /// Spec §4.3: `align_from_here` recursively aligns `start` and every
    /// successor, threading each element's `exit_frame` as the next one's
    /// upstream frame. Stops and returns the failing element's error; it
    /// does not roll back transforms already committed upstream.
    pub fn align_from_here(&mut self, start: ElementId, wavelength: f64, wavelength_align: f64) -> Result<()> {
        let mut current = Some(start);
        let mut upstream: Option<crate::geometry::Transform> = None;
        while let Some(id) = current {
            let kind = self.get_mut(id)?;
            kind.setup_transforms(wavelength, upstream.as_ref(), wavelength_align)?;
            upstream = Some(kind.element().exit_frame);
            current = kind.element().next;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::kinds::{ElementKind, Film};
    use crate::shapes::Shape;

    fn film(name: &str) -> ElementKind {
        ElementKind::Film(Film::new(Element::new(name, "Film", true), Shape::Plane))
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut r = Registry::new();
        r.create("F1", film("F1")).unwrap();
        assert!(r.create("F1", film("F1")).is_err());
    }

    #[test]
    fn delete_nulls_neighbour_links() {
        let mut r = Registry::new();
        let a = r.create("A", film("A")).unwrap();
        let b = r.create("B", film("B")).unwrap();
        r.link(Some(a), Some(b)).unwrap();
        r.delete(b).unwrap();
        assert!(r.get(a).unwrap().element().next.is_none());
        assert!(!r.is_valid(b));
    }

    #[test]
    fn align_from_here_aligns_the_whole_chain() {
        let mut r = Registry::new();
        let a = r.create("A", film("A")).unwrap();
        let b = r.create("B", film("B")).unwrap();
        r.get_mut(b).unwrap().element_mut().set_scalar("distance", 2.0).unwrap();
        r.link(Some(a), Some(b)).unwrap();

        r.align_from_here(a, 500e-9, 500e-9).unwrap();
        assert!(r.get(a).unwrap().element().is_aligned());
        assert!(r.get(b).unwrap().element().is_aligned());
    }
}
