// src/pipeline.rs

use crate::error::PipelineError;
use crate::llm_extract::{Extractor, NoteImage};
use crate::notes::{ParsedNote, apply_business_rules};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{Instrument, info, info_span, warn};

/// SHA-256 of the image bytes; identifies one request in the logs.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Read one note image, extract its items and apply the business rules.
pub async fn process_image(
    path: &Path,
    extractor: &dyn Extractor,
) -> Result<ParsedNote, PipelineError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| PipelineError::ReadImage {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(PipelineError::EmptyImage {
            path: path.to_path_buf(),
        });
    }

    let id = fingerprint(&bytes);
    let short_id = &id[..12];
    let span = info_span!("remito", id = %short_id, file = %path.display());
    let image = NoteImage::new(bytes, path);

    async move {
        info!(bytes = image.bytes.len(), mime = image.mime, "Extracting note");
        let parsed = extractor.extract(&image).await?;
        info!(
            items = parsed.items.len(),
            client = ?parsed.client_name,
            remito = ?parsed.remito_number,
            "Note extracted"
        );
        Ok::<_, PipelineError>(process_note(&parsed))
    }
    .instrument(span)
    .await
}

/// Apply the business rules to an already extracted note and log what
/// needs a human look.
pub fn process_note(note: &ParsedNote) -> ParsedNote {
    let augmented = apply_business_rules(note);

    info!(
        original = note.items.len(),
        auto_added = augmented.auto_added_count(),
        total = augmented.items.len(),
        "Business rules applied"
    );
    for item in augmented.unmapped_items() {
        warn!(product = %item.product, "No form option for product; needs review");
    }

    augmented
}
