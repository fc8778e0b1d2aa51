/// STL reader and writer for binary and ASCII files
use std::collections::HashMap;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geometry::{face_normal, is_valid_position, position, Position, Triangle};
use crate::model::Model;
use crate::transform::Transform;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;
const MAX_FACETS: u32 = 1 << 31;

/// One STL facet as stored in the file
#[derive(Debug, Clone, Copy, PartialEq)]
struct Facet {
    normal: [f32; 3],
    corners: [Position; 3],
}

/// Parse a binary STL file
fn parse_binary_stl(data: &[u8]) -> Result<Vec<Facet>> {
    if data.len() < HEADER_LEN + 4 {
        return Err(Error::invalid_content("file too small to be a valid STL"));
    }

    // Skip 80-byte header
    let data = &data[HEADER_LEN..];

    let facet_count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if facet_count > MAX_FACETS {
        return Err(Error::invalid_content(format!(
            "STL facet count {facet_count} is too large"
        )));
    }
    let body = &data[4..];
    let needed = facet_count as usize * FACET_LEN;
    if body.len() < needed {
        return Err(Error::invalid_content(format!(
            "unexpected end of file: {facet_count} facets need {needed} bytes, found {}",
            body.len()
        )));
    }

    let read = |chunk: &[u8], at: usize| {
        f32::from_le_bytes([chunk[at], chunk[at + 1], chunk[at + 2], chunk[at + 3]])
    };

    Ok(body
        .chunks_exact(FACET_LEN)
        .take(facet_count as usize)
        .map(|chunk| {
            // 12 floats, then a 2-byte attribute count that is ignored
            let point = |at: usize| position(read(chunk, at), read(chunk, at + 4), read(chunk, at + 8));
            Facet {
                normal: [read(chunk, 0), read(chunk, 4), read(chunk, 8)],
                corners: [point(12), point(24), point(36)],
            }
        })
        .collect())
}

/// Parse an ASCII STL file
fn parse_ascii_stl(input: &str) -> Result<Vec<Facet>> {
    match parse_ascii_stl_impl(input) {
        Ok((_, facets)) => Ok(facets),
        Err(e) => Err(Error::invalid_content(format!(
            "failed to parse ASCII STL: {e:?}"
        ))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Vec<Facet>> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = not_line_ending(input)?; // Optional name
    let (input, facets) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _) = not_line_ending(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, facets))
}

fn parse_facet(input: &str) -> IResult<&str, Facet> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input)?;
    let (input, v2) = parse_vertex(input)?;
    let (input, v3) = parse_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((
        input,
        Facet {
            normal: [normal.x, normal.y, normal.z],
            corners: [v1, v2, v3],
        },
    ))
}

fn parse_vertex(input: &str) -> IResult<&str, Position> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    parse_vector3(input)
}

fn parse_vector3(input: &str) -> IResult<&str, Position> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, position(x, y, z)))
}

/// Detect and parse STL file (binary or ASCII)
fn parse_stl(data: &[u8]) -> Result<Vec<Facet>> {
    // Binary files may also start with "solid", so fall back on failure
    if data.len() > 5 && &data[0..5] == b"solid" {
        if let Ok(text) = std::str::from_utf8(data) {
            match parse_ascii_stl(text) {
                Ok(facets) => return Ok(facets),
                Err(e) => debug!(%e, "not an ASCII STL, trying binary"),
            }
        }
    }

    parse_binary_stl(data)
}

/// Merges corners that fall into the same grid cell
struct Welder {
    units: f32,
    cells: HashMap<[i64; 3], u32>,
    vertices: Vec<Position>,
}

impl Welder {
    fn new(units: f32) -> Self {
        Self {
            units,
            cells: HashMap::new(),
            vertices: Vec::new(),
        }
    }

    fn weld(&mut self, p: &Position) -> u32 {
        let cell = [p.x, p.y, p.z].map(|c| (f64::from(c) / f64::from(self.units)).round() as i64);
        let vertices = &mut self.vertices;
        *self.cells.entry(cell).or_insert_with(|| {
            vertices.push(*p);
            vertices.len() as u32 - 1
        })
    }
}

/// Reads an STL file into a model as a single mesh object.
///
/// Corners closer than `units` are welded into one vertex. Facets with
/// out-of-range coordinates or corners that collapse after welding are
/// skipped with a warning.
pub struct ReaderStl<'a> {
    model: &'a mut Model,
    units: f32,
    warnings: Vec<String>,
}

impl<'a> ReaderStl<'a> {
    pub fn new(model: &'a mut Model) -> Self {
        Self {
            model,
            units: 0.001,
            warnings: Vec::new(),
        }
    }

    /// Welding grid size in model units
    pub fn set_units(&mut self, units: f32) -> Result<()> {
        if !units.is_finite() || units <= 0.0 {
            return Err(Error::invalid_param(format!(
                "STL welding units must be positive, got {units}"
            )));
        }
        self.units = units;
        Ok(())
    }

    pub fn units(&self) -> f32 {
        self.units
    }

    /// Warnings of the last read
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::open(path, e))?;
        debug!(path = %path.display(), bytes = data.len(), "reading STL file");
        self.read_from_buffer(&data)
    }

    /// Read an STL image; on failure the target model is left untouched
    pub fn read_from_buffer(&mut self, data: &[u8]) -> Result<()> {
        let facets = parse_stl(data)?;

        let mut warnings = Vec::new();
        let mut welder = Welder::new(self.units);
        let mut triangles = Vec::with_capacity(facets.len());
        for (index, facet) in facets.iter().enumerate() {
            if !facet.corners.iter().all(is_valid_position) {
                warnings.push(format!("facet {index}: coordinates out of range"));
                continue;
            }
            let indices = facet.corners.map(|p| welder.weld(&p));
            let triangle = Triangle::new(indices[0], indices[1], indices[2]);
            if triangle.is_degenerate() {
                warnings.push(format!("facet {index}: corners collapse after welding"));
                continue;
            }
            triangles.push(triangle);
        }
        for warning in &warnings {
            warn!(%warning, "skipped STL facet");
        }

        let mut model = Model::new();
        let mesh = model.add_mesh_object();
        mesh.set_geometry(&welder.vertices, &triangles)?;
        let (id, vertices) = (mesh.resource_id(), mesh.vertex_count());
        model.add_build_item(id, Transform::identity())?;

        info!(
            facets = facets.len(),
            vertices,
            triangles = triangles.len(),
            skipped = warnings.len(),
            "read STL mesh"
        );
        *self.model = model;
        self.warnings = warnings;
        Ok(())
    }
}

/// Writes every build item of a model, flattened to world space, as STL
pub struct WriterStl<'a> {
    model: &'a Model,
    ascii: bool,
}

impl<'a> WriterStl<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            ascii: false,
        }
    }

    pub fn set_ascii(&mut self, ascii: bool) {
        self.ascii = ascii;
    }

    pub fn is_ascii(&self) -> bool {
        self.ascii
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        // An existing file is only replaced once the whole output is built
        let data = self.write_to_buffer()?;
        std::fs::write(path, data)?;
        info!(path = %path.display(), ascii = self.ascii, "wrote STL file");
        Ok(())
    }

    pub fn write_to_buffer(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    pub fn write_to<W: Write + Seek>(&self, mut sink: W) -> Result<()> {
        let triangles = self.model.flatten_build()?;
        if self.ascii {
            write_ascii(&mut sink, &triangles)?;
        } else {
            write_binary(&mut sink, &triangles)?;
        }
        sink.flush()?;
        debug!(facets = triangles.len(), "wrote STL facets");
        Ok(())
    }
}

fn write_binary<W: Write>(sink: &mut W, triangles: &[[Position; 3]]) -> Result<()> {
    let facet_count = u32::try_from(triangles.len())
        .ok()
        .filter(|count| *count <= MAX_FACETS)
        .ok_or_else(|| Error::invalid_param("too many facets for a binary STL"))?;

    let mut header = [b' '; HEADER_LEN];
    let title = b"binary STL written by tmf-core";
    header[..title.len()].copy_from_slice(title);
    sink.write_all(&header)?;
    sink.write_all(&facet_count.to_le_bytes())?;

    let mut record = [0u8; FACET_LEN];
    for corners in triangles {
        let normal = face_normal(corners);
        let values = [normal.x, normal.y, normal.z]
            .into_iter()
            .chain(corners.iter().flat_map(|p| [p.x, p.y, p.z]));
        for (slot, value) in record.chunks_exact_mut(4).zip(values) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        sink.write_all(&record)?;
    }
    Ok(())
}

fn write_ascii<W: Write>(sink: &mut W, triangles: &[[Position; 3]]) -> Result<()> {
    writeln!(sink, "solid tmf")?;
    for corners in triangles {
        let n = face_normal(corners);
        writeln!(sink, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
        writeln!(sink, "    outer loop")?;
        for p in corners {
            writeln!(sink, "      vertex {:e} {:e} {:e}", p.x, p.y, p.z)?;
        }
        writeln!(sink, "    endloop")?;
        writeln!(sink, "  endfacet")?;
    }
    writeln!(sink, "endsolid tmf")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ASCII_TRIANGLE: &str = "solid my part
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid my part
";

    fn binary_stl(facets: &[[Position; 3]]) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN];
        data.extend_from_slice(&(facets.len() as u32).to_le_bytes());
        for corners in facets {
            data.extend_from_slice(&[0u8; 12]);
            for p in corners {
                for c in [p.x, p.y, p.z] {
                    data.extend_from_slice(&c.to_le_bytes());
                }
            }
            data.extend_from_slice(&[0u8; 2]);
        }
        data
    }

    #[test]
    fn test_parse_binary_header() {
        let mut data = vec![0u8; 84];
        // Set triangle count to 0
        data[80..84].copy_from_slice(&0u32.to_le_bytes());

        let facets = parse_binary_stl(&data).unwrap();
        assert!(facets.is_empty());
    }

    #[test]
    fn test_binary_truncated_and_oversized() {
        let mut data = vec![0u8; 84];
        data[80..84].copy_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 60]);
        assert!(parse_binary_stl(&data).is_err());

        data[80..84].copy_from_slice(&(MAX_FACETS + 1).to_le_bytes());
        assert!(parse_binary_stl(&data).is_err());
        assert!(parse_binary_stl(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_parse_ascii_with_name() {
        let facets = parse_stl(ASCII_TRIANGLE.as_bytes()).unwrap();
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(facets[0].corners[1], position(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_binary_starting_with_solid() {
        let mut data = binary_stl(&[[
            position(0.0, 0.0, 0.0),
            position(1.0, 0.0, 0.0),
            position(0.0, 1.0, 0.0),
        ]]);
        data[..5].copy_from_slice(b"solid");
        assert_eq!(parse_stl(&data).unwrap().len(), 1);
    }

    #[test]
    fn test_read_welds_shared_corners() {
        let a = position(0.0, 0.0, 0.0);
        let b = position(1.0, 0.0, 0.0);
        let c = position(0.0, 1.0, 0.0);
        let d = position(1.0, 1.0, 0.0004);
        let data = binary_stl(&[[a, b, c], [b, d, c]]);

        let mut model = Model::new();
        let mut reader = ReaderStl::new(&mut model);
        reader.read_from_buffer(&data).unwrap();
        assert!(reader.warnings().is_empty());

        let mesh = model.mesh_object(1).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(model.build_item_count(), 1);
    }

    #[test]
    fn test_read_skips_collapsed_facets() {
        let a = position(0.0, 0.0, 0.0);
        let data = binary_stl(&[
            [a, position(0.0002, 0.0, 0.0), position(0.0, 1.0, 0.0)],
            [a, position(2.0e9, 0.0, 0.0), position(0.0, 1.0, 0.0)],
            [a, position(1.0, 0.0, 0.0), position(0.0, 1.0, 0.0)],
        ]);

        let mut model = Model::new();
        let mut reader = ReaderStl::new(&mut model);
        reader.read_from_buffer(&data).unwrap();
        assert_eq!(reader.warnings().len(), 2);
        assert_eq!(model.mesh_object(1).unwrap().triangle_count(), 1);
    }

    #[test]
    fn test_units_must_be_positive() {
        let mut model = Model::new();
        let mut reader = ReaderStl::new(&mut model);
        assert!(reader.set_units(0.0).is_err());
        reader.set_units(0.5).unwrap();
        assert_eq!(reader.units(), 0.5);
    }

    #[test]
    fn test_write_binary_layout() {
        let mut model = Model::new();
        let mesh = model.add_mesh_object();
        let facets = [[
            position(0.0, 0.0, 0.0),
            position(1.0, 0.0, 0.0),
            position(0.0, 1.0, 0.0),
        ]];
        mesh.set_geometry(&facets[0], &[Triangle::new(0, 1, 2)])
            .unwrap();
        let id = mesh.resource_id();
        model
            .add_build_item(id, Transform::translation(0.0, 0.0, 2.0))
            .unwrap();

        let data = WriterStl::new(&model).write_to_buffer().unwrap();
        assert_eq!(data.len(), HEADER_LEN + 4 + FACET_LEN);

        let parsed = parse_binary_stl(&data).unwrap();
        assert_eq!(parsed[0].normal, [0.0, 0.0, 1.0]);
        assert_relative_eq!(parsed[0].corners[2], position(0.0, 1.0, 2.0));
    }

    #[test]
    fn test_failed_write_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.stl");
        std::fs::write(&path, b"previous STL contents").unwrap();

        let mut model = Model::new();
        model.push_build_item(crate::model::BuildItem {
            object_id: 42,
            transform: Transform::identity(),
            part_number: None,
        });
        assert!(matches!(
            WriterStl::new(&model).write_to_file(&path),
            Err(Error::ResourceNotFound(42))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"previous STL contents");
    }

    #[test]
    fn test_write_ascii_parses_back() {
        let mut model = Model::new();
        let data = binary_stl(&[[
            position(0.0, 0.0, 0.0),
            position(0.0, 1.5, 0.0),
            position(0.0, 0.0, 1.5),
        ]]);
        ReaderStl::new(&mut model).read_from_buffer(&data).unwrap();

        let mut writer = WriterStl::new(&model);
        writer.set_ascii(true);
        let text = writer.write_to_buffer().unwrap();
        assert!(text.starts_with(b"solid tmf"));

        let facets = parse_ascii_stl(std::str::from_utf8(&text).unwrap()).unwrap();
        assert_eq!(facets.len(), 1);
        assert_relative_eq!(facets[0].corners[1], position(0.0, 1.5, 0.0));
    }
}
