mod prompt;
mod store;

pub use prompt::{EXPLAIN_GUARD, Instruction, render};
pub use store::{ProverbEntry, ProverbSample, ProverbStore};

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProverbError {
    /// A data source (proverb collection or prompt file) is missing, unreadable or malformed.
    DataFormat { source_name: String, reason: String },
    /// A caller-supplied value is out of range, e.g. a sample size.
    InvalidArgument(String),
}

impl ProverbError {
    pub(crate) fn data_format(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataFormat {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

impl Display for ProverbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataFormat {
                source_name,
                reason,
            } => write!(f, "invalid data in {source_name}: {reason}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl Error for ProverbError {}

pub type ProverbResult<T> = std::result::Result<T, ProverbError>;
