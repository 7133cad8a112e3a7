use thiserror::Error;

/// Errors raised while decoding region assets.
#[derive(Debug, Error)]
pub enum SceneError {
    /// A mesh buffer whose declared layout cannot be satisfied.
    #[error("corrupt {what}: {reason}")]
    CorruptAsset { what: &'static str, reason: String },

    /// A definition stream carried an opcode outside the known set.
    #[error("unknown {kind} definition opcode {opcode}")]
    UnknownOpcode { kind: &'static str, opcode: u8 },

    /// A read ran past the end of a buffer.
    #[error("buffer underrun: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// A definition referenced by id is absent from the source.
    #[error("missing {kind} definition {id}")]
    MissingDefinition { kind: &'static str, id: u32 },
}

impl SceneError {
    pub fn corrupt(what: &'static str, reason: impl Into<String>) -> Self {
        SceneError::CorruptAsset {
            what,
            reason: reason.into(),
        }
    }

    /// Re-label an underrun as a corrupt asset of the given kind.
    pub fn into_corrupt(self, what: &'static str) -> Self {
        match self {
            SceneError::Truncated { needed, available } => SceneError::corrupt(
                what,
                format!("section overruns buffer (needed {needed}, {available} left)"),
            ),
            other => other,
        }
    }
}

/// Result type for region decoding operations
pub type Result<T> = std::result::Result<T, SceneError>;
