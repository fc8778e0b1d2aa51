/// Named-format reader and writer lookup
use std::fmt;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::Model;
use crate::stl::{ReaderStl, WriterStl};
use crate::threemf::{Reader3mf, Writer3mf};

/// File formats with a registered reader and writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    ThreeMf,
    Stl,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::ThreeMf => "3mf",
            Format::Stl => "stl",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.name()
    }

    /// Format from a path's extension, case-insensitive
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        extension.parse()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "3mf" => Ok(Format::ThreeMf),
            "stl" => Ok(Format::Stl),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// A reader that fills a model from a file of one format.
///
/// Obtained by name through `Model::query_reader("3mf")`.
pub enum ModelReader<'a> {
    ThreeMf(Reader3mf<'a>),
    Stl(ReaderStl<'a>),
}

impl<'a> ModelReader<'a> {
    pub fn for_format(model: &'a mut Model, name: &str) -> Result<Self> {
        Ok(match name.parse()? {
            Format::ThreeMf => ModelReader::ThreeMf(Reader3mf::new(model)),
            Format::Stl => ModelReader::Stl(ReaderStl::new(model)),
        })
    }

    pub fn format(&self) -> Format {
        match self {
            ModelReader::ThreeMf(_) => Format::ThreeMf,
            ModelReader::Stl(_) => Format::Stl,
        }
    }

    /// Strict readers fail on malformed content; others record warnings.
    ///
    /// STL reading is always lenient, so this only affects 3MF.
    pub fn set_strict_mode_active(&mut self, strict: bool) {
        if let ModelReader::ThreeMf(reader) = self {
            reader.set_strict_mode_active(strict);
        }
    }

    pub fn strict_mode_active(&self) -> bool {
        match self {
            ModelReader::ThreeMf(reader) => reader.strict_mode_active(),
            ModelReader::Stl(_) => false,
        }
    }

    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        match self {
            ModelReader::ThreeMf(reader) => reader.read_from_file(path),
            ModelReader::Stl(reader) => reader.read_from_file(path),
        }
    }

    pub fn read_from_buffer(&mut self, data: &[u8]) -> Result<()> {
        match self {
            ModelReader::ThreeMf(reader) => reader.read_from(Cursor::new(data)),
            ModelReader::Stl(reader) => reader.read_from_buffer(data),
        }
    }

    pub fn read_from<R: Read + Seek>(&mut self, mut source: R) -> Result<()> {
        match self {
            ModelReader::ThreeMf(reader) => reader.read_from(source),
            ModelReader::Stl(reader) => {
                let mut data = Vec::new();
                source.read_to_end(&mut data)?;
                reader.read_from_buffer(&data)
            }
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ModelReader::ThreeMf(reader) => reader.warnings(),
            ModelReader::Stl(reader) => reader.warnings(),
        }
    }

    pub fn warning_count(&self) -> u32 {
        self.warnings().len() as u32
    }
}

/// A writer that serializes a model into one format
pub enum ModelWriter<'a> {
    ThreeMf(Writer3mf<'a>),
    Stl(WriterStl<'a>),
}

impl<'a> ModelWriter<'a> {
    pub fn for_format(model: &'a Model, name: &str) -> Result<Self> {
        Ok(match name.parse()? {
            Format::ThreeMf => ModelWriter::ThreeMf(Writer3mf::new(model)),
            Format::Stl => ModelWriter::Stl(WriterStl::new(model)),
        })
    }

    pub fn format(&self) -> Format {
        match self {
            ModelWriter::ThreeMf(_) => Format::ThreeMf,
            ModelWriter::Stl(_) => Format::Stl,
        }
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        match self {
            ModelWriter::ThreeMf(writer) => writer.write_to_file(path),
            ModelWriter::Stl(writer) => writer.write_to_file(path),
        }
    }

    pub fn write_to_buffer(&self) -> Result<Vec<u8>> {
        match self {
            ModelWriter::ThreeMf(writer) => writer.write_to_buffer(),
            ModelWriter::Stl(writer) => writer.write_to_buffer(),
        }
    }

    pub fn write_to<W: Write + Seek>(&self, sink: W) -> Result<()> {
        match self {
            ModelWriter::ThreeMf(writer) => writer.write_to(sink),
            ModelWriter::Stl(writer) => writer.write_to(sink),
        }
    }
}
