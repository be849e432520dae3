//! Parameter dictionary (spec §3). Modelled as a sum type the way `ParamSet`
//! in the teacher groups typed vectors, but here a single parameter *is*
//! either a scalar or an array (the "either/or" kind spec §9 calls out),
//! rather than the teacher's "one vec per type" layout — the grouping that
//! fits this domain is by parameter identity, not by value type.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Physical unit tag carried alongside a parameter's value (spec §3).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Unit {
    Dimensionless,
    Angle,
    Distance,
    InverseDistance,
    InverseDistancePow(u8),
}

/// Which part of the element a parameter belongs to; used by UIs/importers
/// to group the dictionary the way the legacy config format nests entries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Group {
    Basic,
    Shape,
    Source,
    Grating,
}

bitflags::bitflags! {
    pub struct ParamFlags: u8 {
        const NOT_OPTIMISABLE = 0b01;
        const ARRAY_DATA      = 0b10;
    }
}

/// A scalar value with optimisation bounds and a display multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarValue {
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub multiplier: f64,
}

/// A flattened, column-major array value with explicit dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl ArrayValue {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col * self.rows + row]
    }

    pub fn set(&mut self, row: usize, col: usize, v: f64) {
        self.data[col * self.rows + row] = v;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Scalar(ScalarValue),
    Array(ArrayValue),
}

/// A single dictionary entry: value plus the immutable metadata fixed at
/// creation (spec §3 invariant: unit/group/kind never change after a set).
#[derive(Debug, Clone)]
pub struct Parameter {
    value: ParameterValue,
    unit: Unit,
    group: Group,
    flags: ParamFlags,
}

impl Parameter {
    pub fn scalar(value: f64, min: f64, max: f64, multiplier: f64, unit: Unit, group: Group) -> Self {
        Parameter {
            value: ParameterValue::Scalar(ScalarValue {
                value,
                min,
                max,
                multiplier,
            }),
            unit,
            group,
            flags: ParamFlags::empty(),
        }
    }

    pub fn not_optimisable(mut self) -> Self {
        self.flags.insert(ParamFlags::NOT_OPTIMISABLE);
        self
    }

    pub fn array(rows: usize, cols: usize, data: Vec<f64>, unit: Unit, group: Group) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Parameter {
            value: ParameterValue::Array(ArrayValue { rows, cols, data }),
            unit,
            group,
            flags: ParamFlags::ARRAY_DATA,
        }
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn flags(&self) -> ParamFlags {
        self.flags
    }

    /// Full scalar record (value plus bounds and multiplier), for formats
    /// that round-trip more than the bare value (spec §6's textual and XML
    /// persistence).
    pub fn scalar_record(&self) -> Option<ScalarValue> {
        match &self.value {
            ParameterValue::Scalar(s) => Some(*s),
            ParameterValue::Array(_) => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.value, ParameterValue::Array(_))
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match &self.value {
            ParameterValue::Scalar(s) => Some(s.value),
            ParameterValue::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match &self.value {
            ParameterValue::Array(a) => Some(a),
            ParameterValue::Scalar(_) => None,
        }
    }

    /// Set a scalar value, clamped to the stored bounds. Fails if this
    /// parameter is array-valued (kind is fixed at creation).
    pub fn set_scalar(&mut self, v: f64) -> Result<()> {
        match &mut self.value {
            ParameterValue::Scalar(s) => {
                s.value = v.clamp(s.min, s.max);
                Ok(())
            }
            ParameterValue::Array(_) => Err(Error::InvalidArgument(
                "attempted to set a scalar value on an array parameter".into(),
            )),
        }
    }

    /// Deep-copies the incoming array data; fails on a dimension mismatch or
    /// if this parameter is scalar-valued.
    pub fn set_array(&mut self, rows: usize, cols: usize, data: Vec<f64>) -> Result<()> {
        match &mut self.value {
            ParameterValue::Array(a) => {
                if rows != a.rows || cols != a.cols {
                    return Err(Error::InvalidArgument(format!(
                        "array dimension mismatch: expected {}x{}, got {}x{}",
                        a.rows, a.cols, rows, cols
                    )));
                }
                a.data = data;
                Ok(())
            }
            ParameterValue::Scalar(_) => Err(Error::InvalidArgument(
                "attempted to set array data on a scalar parameter".into(),
            )),
        }
    }
}

/// Name -> Parameter mapping. Order of insertion carries no meaning (spec
/// §3), so `HashMap` rather than an order-preserving map is the right fit.
#[derive(Debug, Clone, Default)]
pub struct ParameterDict {
    entries: HashMap<String, Parameter>,
}

impl ParameterDict {
    pub fn new() -> Self {
        ParameterDict::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, param: Parameter) {
        self.entries.insert(name.into(), param);
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.entries.get_mut(name)
    }

    pub fn get_scalar(&self, element: &str, name: &str) -> Result<f64> {
        self.get(name)
            .and_then(|p| p.as_scalar())
            .ok_or_else(|| Error::InvalidParameter {
                element: element.into(),
                name: name.into(),
            })
    }

    pub fn set_scalar(&mut self, element: &str, name: &str, value: f64) -> Result<()> {
        let p = self.get_mut(name).ok_or_else(|| Error::InvalidParameter {
            element: element.into(),
            name: name.into(),
        })?;
        p.set_scalar(value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Installs the ten alignment parameters every element exposes (spec §3).
pub fn install_alignment_params(dict: &mut ParameterDict) {
    let distance = Parameter::scalar(0.0, 0.0, f64::INFINITY, 1.0, Unit::Distance, Group::Basic);
    let angle = || Parameter::scalar(0.0, -std::f64::consts::PI, std::f64::consts::PI, 1.0, Unit::Angle, Group::Basic);
    let offset = || Parameter::scalar(0.0, -f64::INFINITY, f64::INFINITY, 1.0, Unit::Distance, Group::Basic);

    dict.insert("distance", distance);
    dict.insert("theta", angle());
    dict.insert("phi", angle());
    dict.insert("psi", angle());
    dict.insert("Dtheta", angle());
    dict.insert("Dphi", angle());
    dict.insert("Dpsi", angle());
    dict.insert("DX", offset());
    dict.insert("DY", offset());
    dict.insert("DZ", offset());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_set_clamps_to_bounds() {
        let mut p = Parameter::scalar(0.0, -1.0, 1.0, 1.0, Unit::Distance, Group::Basic);
        p.set_scalar(5.0).unwrap();
        assert_eq!(p.as_scalar(), Some(1.0));
    }

    #[test]
    fn array_set_rejects_dimension_mismatch() {
        let mut p = Parameter::array(2, 2, vec![0.0; 4], Unit::Dimensionless, Group::Shape);
        assert!(p.set_array(3, 3, vec![0.0; 9]).is_err());
    }

    #[test]
    fn alignment_dict_has_all_ten_keys() {
        let mut d = ParameterDict::new();
        install_alignment_params(&mut d);
        for k in [
            "distance", "theta", "phi", "psi", "Dtheta", "Dphi", "Dpsi", "DX", "DY", "DZ",
        ] {
            assert!(d.get(k).is_some(), "missing {k}");
        }
    }
}
