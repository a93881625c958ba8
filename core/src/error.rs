//! Error type shared by every loader, compiler and codec in the crate.
//!
//! Lookup misses are never errors: `Lexicon::find`, `ChatCorpus::word_id` and
//! friends return `Option`/sentinel values. Only I/O, corrupt binary input,
//! bad source text and values that do not fit their on-disk width surface here.

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying read/write failure, including truncated streams
    /// (`ErrorKind::UnexpectedEof`).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A binary dump is structurally invalid.
    #[error("corrupt {format} data: {detail}")]
    Corrupt { format: &'static str, detail: String },

    /// Text that cannot be represented in the target encoding.
    #[error("cannot {direction} {encoding} text: {text:?}")]
    Encoding {
        encoding: &'static str,
        direction: &'static str,
        text: String,
    },

    /// A count or index exceeds the width reserved for it on disk.
    #[error("{what} {value} exceeds the maximum of {max}")]
    Overflow {
        what: &'static str,
        value: usize,
        max: usize,
    },

    /// Malformed compiler input.
    #[error("line {line}: {message}")]
    Source { line: usize, message: String },

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn corrupt(format: &'static str, detail: impl Into<String>) -> Self {
        Error::Corrupt {
            format,
            detail: detail.into(),
        }
    }

    /// Check that `value` fits in `max`, for writers with narrow count fields.
    pub(crate) fn check_width(what: &'static str, value: usize, max: usize) -> Result<()> {
        if value > max {
            Err(Error::Overflow { what, value, max })
        } else {
            Ok(())
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::corrupt("bincode", e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_check_reports_limits() {
        assert!(Error::check_width("pair count", 255, 255).is_ok());
        let err = Error::check_width("pair count", 256, 255).unwrap_err();
        assert_eq!(err.to_string(), "pair count 256 exceeds the maximum of 255");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }
}
