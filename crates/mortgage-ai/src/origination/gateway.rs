//! Outbound document-understanding and generation services.
//!
//! Each call is synchronous and single-shot. Failures surface as `GatewayError` and are never
//! retried by the core, since the request may already have produced side effects.

use super::extraction::{CreditExtraction, IncomeExtraction};

/// PDF (or other document) bytes to plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, document: &[u8]) -> Result<String, GatewayError>;
}

/// Document text to document type and yearly income.
pub trait IncomeClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<IncomeExtraction, GatewayError>;
}

/// Credit report text to scores and monthly obligations.
pub trait CreditExtractor: Send + Sync {
    fn extract_credit(&self, text: &str) -> Result<CreditExtraction, GatewayError>;
}

/// Underwriting prompt to narrative recommendation.
pub trait RecommendationGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}

/// The full set of external services the origination flow calls.
pub trait DocumentServices:
    TextExtractor + IncomeClassifier + CreditExtractor + RecommendationGenerator
{
}

impl<T> DocumentServices for T where
    T: TextExtractor + IncomeClassifier + CreditExtractor + RecommendationGenerator
{
}

/// External service failure.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("malformed service response: {0}")]
    MalformedResponse(String),
}
