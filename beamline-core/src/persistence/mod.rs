//! System persistence (spec §6, "out of scope" in the sense of being a
//! foreign-format adapter, but specified in enough detail to implement as a
//! dedicated module per SPEC_FULL §0): the legacy null-separated text format
//! and the XML format.

pub mod spot;
pub mod text;
pub mod xml;
