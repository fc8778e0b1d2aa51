/// 3MF packages: ZIP container, model XML, colors and beam lattices
mod reader;
mod writer;

pub use reader::Reader3mf;
pub use writer::Writer3mf;

/// Core 3MF namespace
pub const NAMESPACE_CORE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";
/// Materials and properties extension
pub const NAMESPACE_MATERIAL: &str =
    "http://schemas.microsoft.com/3dmanufacturing/material/2015/02";
/// Production extension
pub const NAMESPACE_PRODUCTION: &str =
    "http://schemas.microsoft.com/3dmanufacturing/production/2015/06";
/// Beam lattice extension
pub const NAMESPACE_BEAM_LATTICE: &str =
    "http://schemas.microsoft.com/3dmanufacturing/beamlattice/2017/02";
/// Slice extension
pub const NAMESPACE_SLICE: &str = "http://schemas.microsoft.com/3dmanufacturing/slice/2015/07";

/// Relationship type of the start part
pub const START_PART_TYPE: &str = "http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel";

// Package layout: `[Content_Types].xml` maps extensions to MIME types,
// `_rels/.rels` names the start part, which holds the model XML.
pub(crate) const MODEL_PATH: &str = "3D/3dmodel.model";
pub(crate) const RELS_PATH: &str = "_rels/.rels";
pub(crate) const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

pub(crate) const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#;

pub(crate) const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// Fixed-point formatting with trailing zeros removed
pub(crate) fn format_float(value: f64, precision: usize) -> String {
    let mut text = format!("{value:.precision$}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}
