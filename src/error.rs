//! Error kinds shared across the database codec, cache codec, and repository.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The XML `mime-info` database is syntactically invalid, missing a
    /// required attribute, or violates one of the `match`/`glob` grammars.
    #[error("malformed mime-info database: {0}")]
    MalformedDatabase(String),

    /// The binary cache has a bad signature, ends prematurely, or contains
    /// an out-of-range type index.
    #[error("invalid binary cache: {0}")]
    InvalidCache(String),

    /// A lookup by name or alias found nothing in the repository.
    #[error("unknown mime type: {0}")]
    UnknownMimeType(String),

    /// A consumer indicated it cannot handle an otherwise-valid mime type.
    #[error("unsupported mime type: {0}")]
    UnsupportedMimeType(String),

    /// A transient failure reading or writing the database, cache, or a
    /// content stream.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::MalformedDatabase(format!("invalid glob pattern: {err}"))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::MalformedDatabase(format!("xml error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
