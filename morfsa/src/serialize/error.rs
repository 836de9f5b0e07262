use crate::fsa::FsaFlags;

/// Error with serializing an automaton.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SerializeError {
    /// A value does not fit the field it has to be written to.
    #[error("Encoding overflow: {0}")]
    EncodingOverflow(String),
    /// The emitted stream disagrees with the computed layout.
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),
    /// The serializer was asked for flags its format cannot express.
    #[error("{format} does not support flags [{flags}]")]
    UnsupportedFlags {
        /// Name of the target format.
        format: &'static str,
        /// The requested flags the format lacks.
        flags: FsaFlags,
    },
    /// The filler and annotation separator bytes cannot be told apart.
    #[error("Separator conflict: {0}")]
    SeparatorConflict(String),
    /// Error with input/output.
    #[error("IO error")]
    Io(#[source] std::io::Error),
}
