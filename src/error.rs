use thiserror::Error;

/// Error type for schematic conversion.
///
/// All variants abort the conversion; none of them leave a partially
/// written command stream behind because decoding finishes before the
/// first command is emitted.
#[derive(Debug, Error)]
pub enum SchemError {
    /// The tagged-binary stream is truncated or carries an unknown tag kind.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// No dialect classification rule matched the root compound.
    #[error("unknown schematic dialect: {0}")]
    UnknownDialect(String),

    /// Cell data does not cover the declared `width * height * length`.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A block-storage field has a tag kind the dialect does not allow.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// A translation table failed to deserialize.
    #[error("translation table error: {0}")]
    Table(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchemError>;
