//! Error taxonomy for desirer operations

use crate::cluster::ClusterError;
use crate::models::LrpIdentifier;
use thiserror::Error;

pub type Result<T, E = DesirerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DesirerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("LRP {0} already exists")]
    AlreadyExists(LrpIdentifier),

    #[error("LRP {identifier} not found: {reason}")]
    NotFound {
        identifier: LrpIdentifier,
        reason: String,
    },

    #[error("failed to {operation}{}: {source}", fmt_identifier(.identifier))]
    Infrastructure {
        operation: &'static str,
        identifier: Option<LrpIdentifier>,
        #[source]
        source: ClusterError,
    },

    #[error("translation failed: {0}")]
    Translation(String),
}

fn fmt_identifier(identifier: &Option<LrpIdentifier>) -> String {
    identifier
        .as_ref()
        .map(|id| format!(" for LRP {}", id))
        .unwrap_or_default()
}

impl DesirerError {
    pub(crate) fn infrastructure(
        operation: &'static str,
        identifier: Option<&LrpIdentifier>,
        source: ClusterError,
    ) -> Self {
        DesirerError::Infrastructure {
            operation,
            identifier: identifier.cloned(),
            source,
        }
    }

    pub(crate) fn not_found(identifier: &LrpIdentifier, reason: impl Into<String>) -> Self {
        DesirerError::NotFound {
            identifier: identifier.clone(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DesirerError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, DesirerError::AlreadyExists(_))
    }

    /// Returns true if the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            DesirerError::Infrastructure { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
