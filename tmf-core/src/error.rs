/// Error types for model building and file I/O
use std::path::PathBuf;
use thiserror::Error;

use crate::ResourceId;

/// Result type for all library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the model, readers and writers.
#[derive(Debug, Error)]
pub enum Error {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// A parameter was outside its allowed domain.
    #[error("invalid parameter: {message}")]
    InvalidParam {
        /// Description of the offending parameter.
        message: String,
    },

    /// An index into a vertex, triangle, beam or property list was out of range.
    #[error("{what} index {index} out of range (count {count})")]
    IndexOutOfRange {
        /// What kind of list was indexed.
        what: &'static str,
        /// The offending index.
        index: u32,
        /// Number of entries in the list.
        count: u32,
    },

    /// No resource with this id exists in the model.
    #[error("resource {0} not found")]
    ResourceNotFound(ResourceId),

    /// A resource exists but has the wrong kind for this use.
    #[error("resource {id} is not a {expected}")]
    InvalidResourceType {
        /// Resource id that was looked up.
        id: ResourceId,
        /// Kind that was required.
        expected: &'static str,
    },

    /// Adding a component would make an object contain itself.
    #[error("component reference {from} -> {to} creates a cycle")]
    CyclicComponents {
        /// The components object being edited.
        from: ResourceId,
        /// The object that was referenced.
        to: ResourceId,
    },

    /// No reader or writer is registered under this name.
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// A file requires an extension namespace this library does not implement.
    #[error("unsupported required extension: {namespace}")]
    UnsupportedExtension {
        /// Namespace URI (or prefix when unresolved).
        namespace: String,
    },

    /// Invalid file content (parse error).
    #[error("invalid file content: {message}")]
    InvalidContent {
        /// Description of what was invalid.
        message: String,
    },

    /// A color string could not be parsed.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// A transform string did not hold 12 finite numbers.
    #[error("invalid transform: {0}")]
    InvalidTransform(String),

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP container error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML reader or writer error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl Error {
    /// Create an `InvalidContent` error with the given message.
    #[must_use]
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }

    /// Create an `InvalidParam` error with the given message.
    #[must_use]
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidParam {
            message: message.into(),
        }
    }

    /// Map a file-open failure, keeping not-found distinct.
    pub(crate) fn open(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(quick_xml::Error::InvalidAttr(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = Error::IndexOutOfRange {
            what: "vertex",
            index: 9,
            count: 3,
        };
        assert_eq!(err.to_string(), "vertex index 9 out of range (count 3)");
        assert_eq!(Error::ResourceNotFound(4).to_string(), "resource 4 not found");
    }

    #[test]
    fn test_open_not_found() {
        let err = Error::open(
            std::path::Path::new("missing.3mf"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}
