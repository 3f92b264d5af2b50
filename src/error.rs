use uuid::Uuid;

use crate::models::UnknownVariant;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("assessment {0} not found")]
    AssessmentNotFound(Uuid),
    #[error("assessment {0} has no indicator data; fill in data first")]
    NoIndicatorData(Uuid),
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("catalog inconsistency: {0}")]
    Catalog(#[from] UnknownVariant),
}

impl EngineError {
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::AssessmentNotFound(_) => 404,
            EngineError::NoIndicatorData(_) => 422,
            EngineError::Persistence(_) | EngineError::Catalog(_) => 500,
        }
    }
}
