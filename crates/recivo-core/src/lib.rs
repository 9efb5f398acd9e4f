//! Core domain types and error definitions for recivo.
//!
//! This crate provides the fundamental types shared across the recivo
//! service:
//!
//! - [`ExtractionError`] — Error type for image and vision operations
//! - [`ReceiptFields`] — Structured fields extracted from a receipt
//! - [`ExtractionResult`] — The endpoint's response entity
//!
//! # Example
//!
//! ```rust
//! use recivo_core::{ExtractionResult, ReceiptFields};
//!
//! let ok = ExtractionResult::Success(ReceiptFields {
//!     merchant: Some("GS25".to_string()),
//!     amount: Some(4500.0),
//!     date: Some("2025-11-03".to_string()),
//!     category: Some("meal".to_string()),
//!     ..Default::default()
//! });
//! assert!(!ok.is_error());
//!
//! let bad = ExtractionResult::error("unreadable image");
//! assert!(bad.is_error());
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while processing an uploaded receipt.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The upload stream could not be fully read.
    #[error("upload could not be read: {0}")]
    Upload(String),

    /// The upload could not be decoded or resized as an image.
    #[error("image could not be processed: {0}")]
    Image(String),

    /// The vision API request itself failed (transport, auth, API error).
    #[error("vision request failed: {0}")]
    Vision(String),

    /// The vision model replied with something that is not a valid
    /// extraction mapping.
    #[error("failed to parse extraction output: {0}")]
    Parse(String),

    /// A worker task running part of the pipeline failed.
    #[error("worker task failed: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ExtractionError {
    fn from(err: serde_json::Error) -> Self {
        ExtractionError::Parse(err.to_string())
    }
}

/// Structured fields extracted from a receipt image.
///
/// The wire names (`extractedMerchant`, ...) match what the rest of the
/// expense system already consumes. Fields the model could not read are
/// `null`; any extra keys the analysis service returns are preserved in
/// [`ReceiptFields::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptFields {
    /// Merchant / store name as printed on the receipt.
    #[serde(rename = "extractedMerchant", default)]
    pub merchant: Option<String>,
    /// Total amount. Models occasionally return this as a string
    /// ("12,500" or "$12.50"), so parsing is lenient.
    #[serde(rename = "extractedAmount", default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    /// Purchase date, as the model printed it (usually YYYY-MM-DD).
    #[serde(rename = "extractedDate", default)]
    pub date: Option<String>,
    /// Expense category guessed by the model.
    #[serde(rename = "extractedCategory", default)]
    pub category: Option<String>,
    /// Model-reported confidence in [0, 1], when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Any other fields the analysis service returned, passed through.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Accepts a number, a numeric string (currency symbols and thousands
/// separators stripped), or null. Unparsable strings become `None` rather
/// than failing the whole extraction.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        Some(_) => None,
    })
}

/// The extraction endpoint's response entity.
///
/// Exactly one of two shapes: a success mapping with the `extracted*`
/// fields, or `{"error": "..."}` and nothing else. The two-variant enum
/// makes a mixed response unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractionResult {
    /// Business-level failure, reported to the caller via the body.
    Failure {
        /// Human-readable description of what went wrong.
        error: String,
    },
    /// Successful extraction.
    Success(ReceiptFields),
}

impl ExtractionResult {
    /// Builds an error-shaped result.
    pub fn error(message: impl Into<String>) -> Self {
        ExtractionResult::Failure { error: message.into() }
    }

    /// True when this result carries an `error` field.
    pub fn is_error(&self) -> bool {
        matches!(self, ExtractionResult::Failure { .. })
    }

    /// Interprets a raw JSON mapping from the analysis service.
    ///
    /// A mapping containing an `error` key is an error-shaped result no
    /// matter what else it contains; anything else must parse as
    /// [`ReceiptFields`]. Non-object values are a parse failure.
    pub fn from_value(value: Value) -> Result<Self, ExtractionError> {
        match value {
            Value::Object(map) => {
                if let Some(err) = map.get("error") {
                    let message = match err {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    return Ok(ExtractionResult::Failure { error: message });
                }
                let fields: ReceiptFields = serde_json::from_value(Value::Object(map))?;
                Ok(ExtractionResult::Success(fields))
            }
            other => Err(ExtractionError::Parse(format!(
                "expected a JSON object, got: {}",
                other
            ))),
        }
    }
}
