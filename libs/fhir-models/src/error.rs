use thiserror::Error;

/// Errors raised while building resource trees at the system boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The payload does not have a shape the resource tree can represent.
    #[error("malformed shape at {path}: {reason}")]
    MalformedShape { path: String, reason: String },

    #[error("missing resourceType at {path}")]
    MissingResourceType { path: String },

    #[error("invalid tenant mnemonic '{mnemonic}': {reason}")]
    InvalidTenant {
        mnemonic: String,
        reason: &'static str,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedShape {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
