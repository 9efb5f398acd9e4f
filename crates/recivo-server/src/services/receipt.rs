//! Receipt processing service - read, optimize, analyze.

use axum::body::Bytes;
use axum::extract::Multipart;
use recivo_core::{ExtractionError, ExtractionResult};
use recivo_vision::ReceiptAnalysis;
use tracing::info;
use uuid::Uuid;

/// Name of the multipart field carrying the receipt image.
const FILE_FIELD: &str = "file";

/// The uploaded receipt, fully read into memory.
pub struct Upload {
    pub filename: Option<String>,
    pub content: Bytes,
}

/// Reads the `file` field of the multipart body into memory.
async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ExtractionError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ExtractionError::Upload(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(|s| s.to_string());
        let content = field
            .bytes()
            .await
            .map_err(|e| ExtractionError::Upload(e.to_string()))?;
        return Ok(Upload { filename, content });
    }
    Err(ExtractionError::Upload(format!("missing `{}` field", FILE_FIELD)))
}

/// Runs the full extraction pipeline for one upload:
/// read the file, shrink it on the blocking pool, send it to the analyzer.
///
/// Every step's failure surfaces as an [`ExtractionError`]; an error the
/// analysis service itself reported comes back as an error-shaped `Ok`.
pub async fn process_upload(
    analyzer: &dyn ReceiptAnalysis,
    mut multipart: Multipart,
    declared_size: Option<u64>,
    request_id: Uuid,
) -> Result<ExtractionResult, ExtractionError> {
    let upload = read_upload(&mut multipart).await?;
    info!(
        request_id = %request_id,
        filename = ?upload.filename,
        declared_size = ?declared_size,
        bytes = upload.content.len(),
        "receipt upload read"
    );

    // The resize is CPU-bound; run it off the async workers so it does
    // not stall sibling requests.
    let content = upload.content;
    let optimized = tokio::task::spawn_blocking(move || recivo_image::optimize(&content))
        .await
        .map_err(|e| ExtractionError::Internal(e.to_string()))??;
    info!(request_id = %request_id, bytes = optimized.len(), "image optimized");

    analyzer.analyze(&optimized).await
}
