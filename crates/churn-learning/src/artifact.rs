//! Versioned, checksummed pipeline artifact.
//!
//! An artifact is a JSON envelope:
//!
//! ```text
//! {
//!   "format": "churn-pipeline",
//!   "format_version": 1,
//!   "crate_version": "0.1.0",
//!   "created_at": "2026-01-01T00:00:00Z",
//!   "checksum": "<sha256 hex of payload>",
//!   "payload": "<FittedPipeline as JSON>"
//! }
//! ```
//!
//! The payload is stored as a string so the checksum covers the exact bytes
//! that are decoded. Floats are written with round-trip precision, so a
//! loaded pipeline predicts bit-identically to the one that was saved.

use crate::error::{LearningError, Result};
use crate::pipeline::FittedPipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

/// Format tag written into every artifact.
pub const ARTIFACT_FORMAT: &str = "churn-pipeline";

/// Envelope version this build reads and writes.
pub const ARTIFACT_VERSION: u32 = 1;

/// Header fields of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub format: String,
    pub format_version: u32,
    /// Version of the crate that wrote the artifact.
    pub crate_version: String,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the payload, lowercase hex.
    pub checksum: String,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(flatten)]
    metadata: ArtifactMetadata,
    payload: String,
}

fn checksum(payload: &str) -> String {
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}

impl FittedPipeline {
    /// Encode as an artifact.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = serde_json::to_string(self)?;
        let envelope = Envelope {
            metadata: ArtifactMetadata {
                format: ARTIFACT_FORMAT.to_string(),
                format_version: ARTIFACT_VERSION,
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: Utc::now(),
                checksum: checksum(&payload),
            },
            payload,
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    /// Decode an artifact produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// - [`LearningError::ArtifactCorrupt`] if the bytes are not an
    ///   envelope, carry the wrong format tag, fail the checksum, or hold an
    ///   undecodable payload
    /// - [`LearningError::UnsupportedArtifactVersion`] for another
    ///   envelope version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope = decode_envelope(bytes)?;
        let metadata = &envelope.metadata;

        if checksum(&envelope.payload) != metadata.checksum {
            return Err(LearningError::ArtifactCorrupt("checksum mismatch".to_string()));
        }

        let pipeline: FittedPipeline = serde_json::from_str(&envelope.payload)
            .map_err(|e| LearningError::ArtifactCorrupt(format!("invalid payload: {e}")))?;
        debug!(
            "Decoded artifact written by {} at {}",
            metadata.crate_version, metadata.created_at
        );
        Ok(pipeline)
    }

    /// Write the artifact to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        info!("Saved pipeline artifact to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Read an artifact from `path`.
    ///
    /// # Errors
    ///
    /// [`LearningError::ArtifactNotFound`] when the file does not exist, and
    /// the errors of [`from_bytes`](Self::from_bytes) otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LearningError::ArtifactNotFound {
                path: path.display().to_string(),
            },
            _ => LearningError::Io(e),
        })?;
        let pipeline = Self::from_bytes(&bytes)?;
        info!("Loaded pipeline artifact from {}", path.display());
        Ok(pipeline)
    }
}

/// Read only the header of an artifact.
pub fn read_metadata(bytes: &[u8]) -> Result<ArtifactMetadata> {
    Ok(decode_envelope(bytes)?.metadata)
}

fn decode_envelope(bytes: &[u8]) -> Result<Envelope> {
    // Check the version before the full shape, so a future envelope layout
    // is reported as unsupported rather than corrupt.
    let header: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| LearningError::ArtifactCorrupt(format!("not a JSON document: {e}")))?;

    if header.get("format").and_then(|v| v.as_str()) != Some(ARTIFACT_FORMAT) {
        return Err(LearningError::ArtifactCorrupt(format!(
            "missing '{ARTIFACT_FORMAT}' format tag"
        )));
    }
    let version = header
        .get("format_version")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| LearningError::ArtifactCorrupt("missing format_version".to_string()))?;
    if version != u64::from(ARTIFACT_VERSION) {
        return Err(LearningError::UnsupportedArtifactVersion {
            found: u32::try_from(version).unwrap_or(u32::MAX),
            supported: ARTIFACT_VERSION,
        });
    }

    serde_json::from_value(header)
        .map_err(|e| LearningError::ArtifactCorrupt(format!("invalid envelope: {e}")))
}
