//! Receipt analysis via a vision-language model.
//!
//! This crate wraps the external OCR/field-extraction step behind the
//! [`ReceiptAnalysis`] trait:
//!
//! - [`ReceiptAnalysis`] — The seam the server depends on
//! - [`OpenAiAnalyzer`] — OpenAI-backed implementation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use recivo_vision::{OpenAiAnalyzer, ReceiptAnalysis};
//!
//! // Reads OPENAI_API_KEY from the environment.
//! let analyzer = OpenAiAnalyzer::new("gpt-4o");
//! let result = analyzer.analyze(&image_bytes).await?;
//! ```
//!
//! `analyze` distinguishes two failure modes: a result the model itself
//! reported as an error (`Ok` with an error-shaped [`ExtractionResult`])
//! and a fault in the call itself (`Err`). The caller treats them
//! differently, so the distinction is part of the contract.

mod openai;

use async_trait::async_trait;
use recivo_core::{ExtractionError, ExtractionResult};

pub use openai::OpenAiAnalyzer;

/// Extracts structured receipt fields from an image.
///
/// Implementations may perform network I/O; the single shared instance is
/// reused across all requests, so implementations must be `Send + Sync`.
#[async_trait]
pub trait ReceiptAnalysis: Send + Sync {
    /// Analyzes a receipt image and returns the extraction mapping.
    ///
    /// Returns `Ok` with an error-shaped result when the model reports
    /// the receipt as unreadable, and `Err` when the call itself fails.
    async fn analyze(&self, image: &[u8]) -> Result<ExtractionResult, ExtractionError>;
}
