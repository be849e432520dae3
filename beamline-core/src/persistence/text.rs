//! Legacy line-based, null-separated textual persistence (spec §6). Each
//! element is one line: runtime-class, name, previous-name-or-empty,
//! next-name-or-empty, then `(name, value, min, max, multiplier, unit-tag,
//! group-tag, flags)` septuples for every scalar parameter, ended by an
//! empty field and a newline. A two-pass reader first materialises every
//! element, then re-establishes chain links — the format can list an
//! element before the neighbour it names.
//!
//! Only scalar parameters round-trip through this format; the source
//! predates array-valued parameters, which spec §6 introduces only for the
//! XML format ([`super::xml`]).

use std::collections::HashMap;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::kinds::{ElementKind, Film, Mirror};
use crate::parameter::{Group, ParamFlags, Unit};
use crate::registry::{ElementId, Registry};
use crate::shapes::Shape;

const SEP: char = '\u{0}';

fn unit_tag(u: Unit) -> u32 {
    match u {
        Unit::Dimensionless => 0,
        Unit::Angle => 1,
        Unit::Distance => 2,
        Unit::InverseDistance => 3,
        Unit::InverseDistancePow(n) => 4 + n as u32,
    }
}

fn unit_from_tag(tag: u32) -> Unit {
    match tag {
        0 => Unit::Dimensionless,
        1 => Unit::Angle,
        2 => Unit::Distance,
        3 => Unit::InverseDistance,
        n => Unit::InverseDistancePow((n - 4) as u8),
    }
}

fn group_tag(g: Group) -> u32 {
    match g {
        Group::Basic => 0,
        Group::Shape => 1,
        Group::Source => 2,
        Group::Grating => 3,
    }
}

fn group_from_tag(tag: u32) -> Result<Group> {
    match tag {
        0 => Ok(Group::Basic),
        1 => Ok(Group::Shape),
        2 => Ok(Group::Source),
        3 => Ok(Group::Grating),
        other => Err(Error::IoFailure(format!("unknown group tag {other}"))),
    }
}

/// Writes every element in `registry` in the legacy textual format.
/// Iteration order is the element's insertion-stable name, sorted, for a
/// deterministic byte stream.
pub fn write(registry: &Registry) -> String {
    let mut names: Vec<&str> = registry.names().collect();
    names.sort_unstable();

    let mut out = String::new();
    for name in names {
        let id = registry.find(name).expect("name came from registry.names()");
        let kind = registry.get(id).expect("id came from registry.find()");
        let e = kind.element();
        out.push_str(&e.class_name);
        out.push(SEP);
        out.push_str(&e.name);
        out.push(SEP);
        out.push_str(e.prev.and_then(|p| registry.get(p).ok()).map(|k| k.element().name.as_str()).unwrap_or(""));
        out.push(SEP);
        out.push_str(e.next.and_then(|n| registry.get(n).ok()).map(|k| k.element().name.as_str()).unwrap_or(""));
        out.push(SEP);

        let mut params: Vec<(&str, &crate::parameter::Parameter)> = e.params.iter().collect();
        params.sort_unstable_by_key(|(n, _)| *n);
        for (pname, p) in params {
            let Some(rec) = p.scalar_record() else { continue };
            out.push_str(pname);
            out.push(SEP);
            for field in [rec.value, rec.min, rec.max, rec.multiplier] {
                out.push_str(&format!("{field}"));
                out.push(SEP);
            }
            out.push_str(&unit_tag(p.unit()).to_string());
            out.push(SEP);
            out.push_str(&group_tag(p.group()).to_string());
            out.push(SEP);
            out.push_str(&p.flags().bits().to_string());
            out.push(SEP);
        }
        out.push(SEP);
        out.push('\n');
    }
    out
}

struct RawElement {
    class_name: String,
    name: String,
    prev: String,
    next: String,
    params: Vec<(String, f64, f64, f64, f64, u32, u32, u32)>,
}

fn parse_line(line: &str) -> Result<RawElement> {
    let mut fields: Vec<&str> = line.split(SEP).collect();
    // Drop the trailing empty field (the "ended by a null" marker) if present.
    if fields.last() == Some(&"") {
        fields.pop();
    }
    if fields.len() < 4 {
        return Err(Error::IoFailure("malformed element record: missing header fields".into()));
    }
    let class_name = fields[0].to_string();
    let name = fields[1].to_string();
    let prev = fields[2].to_string();
    let next = fields[3].to_string();

    let rest = &fields[4..];
    if rest.len() % 8 != 0 {
        return Err(Error::IoFailure(format!(
            "malformed parameter records for element `{name}`: {} trailing fields",
            rest.len()
        )));
    }
    let mut params = Vec::with_capacity(rest.len() / 8);
    for chunk in rest.chunks(8) {
        let parse_f64 = |s: &str| -> Result<f64> { s.parse().map_err(|_| Error::IoFailure(format!("bad float `{s}`"))) };
        let parse_u32 = |s: &str| -> Result<u32> { s.parse().map_err(|_| Error::IoFailure(format!("bad tag `{s}`"))) };
        params.push((
            chunk[0].to_string(),
            parse_f64(chunk[1])?,
            parse_f64(chunk[2])?,
            parse_f64(chunk[3])?,
            parse_f64(chunk[4])?,
            parse_u32(chunk[5])?,
            parse_u32(chunk[6])?,
            parse_u32(chunk[7])?,
        ));
    }
    Ok(RawElement {
        class_name,
        name,
        prev,
        next,
        params,
    })
}

/// Reads the legacy textual format into a fresh [`Registry`]. First pass
/// materialises every element with its parameters; second pass links the
/// chain from the recorded previous/next names.
pub fn read(text: &str) -> Result<Registry> {
    let mut registry = Registry::new();
    let mut by_name: HashMap<String, ElementId> = HashMap::new();
    let mut links: Vec<(String, String, String)> = Vec::new(); // (name, prev, next)

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let raw = parse_line(line)?;
        let transmissive = raw.class_name.starts_with("Film") || raw.class_name.starts_with("Source");
        let mut element = Element::new(&raw.name, &raw.class_name, transmissive);
        for (pname, value, min, max, mult, unit, group, flags) in raw.params {
            let group = group_from_tag(group)?;
            let unit = unit_from_tag(unit);
            let mut param = crate::parameter::Parameter::scalar(value, min, max, mult, unit, group);
            if ParamFlags::from_bits_truncate(flags).contains(ParamFlags::NOT_OPTIMISABLE) {
                param = param.not_optimisable();
            }
            element.params.insert(pname, param);
        }
        let kind = if raw.class_name.starts_with("Mirror") {
            ElementKind::Mirror(Mirror::new(element, Shape::Plane))
        } else {
            ElementKind::Film(Film::new(element, Shape::Plane))
        };
        let id = registry.create(&raw.name, kind)?;
        by_name.insert(raw.name.clone(), id);
        links.push((raw.name, raw.prev, raw.next));
    }

    for (name, _prev, next) in links {
        if next.is_empty() {
            continue;
        }
        let a = *by_name
            .get(&name)
            .ok_or_else(|| Error::IoFailure(format!("unknown element `{name}` in chain link")))?;
        let b = *by_name
            .get(&next)
            .ok_or_else(|| Error::IoFailure(format!("unknown successor `{next}` for element `{name}`")))?;
        registry.link(Some(a), Some(b))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element as CoreElement;

    #[test]
    fn round_trips_a_two_element_chain() {
        let mut registry = Registry::new();
        let mut m1 = CoreElement::new("M1", "Mirror<Plane>", false);
        m1.set_scalar("theta", 0.5).unwrap();
        let id1 = registry.create("M1", ElementKind::Mirror(Mirror::new(m1, Shape::Plane))).unwrap();
        let f1 = CoreElement::new("F1", "Film", true);
        let id2 = registry.create("F1", ElementKind::Film(Film::new(f1, Shape::Plane))).unwrap();
        registry.link(Some(id1), Some(id2)).unwrap();

        let text = write(&registry);
        let read_back = read(&text).unwrap();
        let m1_id = read_back.find("M1").unwrap();
        let f1_id = read_back.find("F1").unwrap();
        assert_eq!(read_back.get(m1_id).unwrap().element().next, Some(f1_id));
        let theta = read_back
            .get(m1_id)
            .unwrap()
            .element()
            .params
            .get("theta")
            .unwrap()
            .as_scalar()
            .unwrap();
        assert!((theta - 0.5).abs() < 1e-12);
    }
}
