//! Persistence of the trained classifier and its metadata.
//!
//! The model blob is a fixed 12-byte header followed by a bincode payload:
//!
//! | bytes | field |
//! |---|---|
//! | 0..4 | magic `FDPM` |
//! | 4..6 | format version (u16, LE) |
//! | 6..8 | model type tag (u16, LE) |
//! | 8..12 | payload length (u32, LE) |
//!
//! Metadata is a JSON document written next to the blob. Both carry the
//! format version and must agree with [`FORMAT_VERSION`] on load.

use crate::error::{AppError, Result};
use crate::ml::forest::RandomForest;
use crate::ml::models::{ModelMetadata, ModelType};
use std::fs;
use std::path::Path;
use tracing::info;

pub const MAGIC: [u8; 4] = *b"FDPM";
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_SIZE: usize = 12;

/// Trained classifier together with its metadata
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub model: RandomForest,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    pub fn new(model: RandomForest, metadata: ModelMetadata) -> Self {
        Self { model, metadata }
    }

    /// Write the model blob and the metadata record
    pub fn save(&self, model_path: impl AsRef<Path>, metadata_path: impl AsRef<Path>) -> Result<()> {
        let model_path = model_path.as_ref();
        let metadata_path = metadata_path.as_ref();

        let blob = encode_model(&self.model, self.metadata.model_type)?;
        write_creating_dirs(model_path, &blob)?;

        let json = serde_json::to_vec_pretty(&self.metadata)?;
        write_creating_dirs(metadata_path, &json)?;

        info!(
            model = %model_path.display(),
            metadata = %metadata_path.display(),
            bytes = blob.len(),
            "Model artifact saved"
        );
        Ok(())
    }

    /// Read both files back; any missing, corrupt or mismatched file fails
    pub fn load(model_path: impl AsRef<Path>, metadata_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let metadata_path = metadata_path.as_ref();

        let json = fs::read(metadata_path).map_err(|e| {
            AppError::ArtifactLoad(format!("{}: {}", metadata_path.display(), e))
        })?;
        let metadata: ModelMetadata = serde_json::from_slice(&json).map_err(|e| {
            AppError::ArtifactLoad(format!("{}: {}", metadata_path.display(), e))
        })?;
        if metadata.format_version != FORMAT_VERSION {
            return Err(AppError::ArtifactVersion {
                found: metadata.format_version,
                expected: FORMAT_VERSION,
            });
        }

        let blob = fs::read(model_path)
            .map_err(|e| AppError::ArtifactLoad(format!("{}: {}", model_path.display(), e)))?;
        let (model_type, model) = decode_model(&blob)?;

        if model_type != metadata.model_type {
            return Err(AppError::ArtifactLoad(format!(
                "model blob is {}, metadata says {}",
                model_type, metadata.model_type
            )));
        }
        if model.n_features() != metadata.features.len() {
            return Err(AppError::ArtifactLoad(format!(
                "model expects {} features, metadata lists {}",
                model.n_features(),
                metadata.features.len()
            )));
        }

        info!(
            model = %model_path.display(),
            model_type = %metadata.model_type,
            accuracy = metadata.accuracy,
            features = ?metadata.features,
            "Model artifact loaded"
        );
        Ok(Self { model, metadata })
    }
}

/// Header plus bincode payload
pub fn encode_model(model: &RandomForest, model_type: ModelType) -> Result<Vec<u8>> {
    let payload = bincode::serialize(model)?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| AppError::Serialization("model payload exceeds 4 GiB".to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&model_type.tag().to_le_bytes());
    bytes.extend_from_slice(&payload_len.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Validate the header and deserialize the payload
pub fn decode_model(bytes: &[u8]) -> Result<(ModelType, RandomForest)> {
    if bytes.len() < HEADER_SIZE {
        return Err(AppError::ArtifactLoad(format!(
            "header too short: {} bytes, expected {}",
            bytes.len(),
            HEADER_SIZE
        )));
    }
    if bytes[0..4] != MAGIC {
        return Err(AppError::ArtifactLoad(format!(
            "invalid magic number {:02X?}",
            &bytes[0..4]
        )));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(AppError::ArtifactVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let tag = u16::from_le_bytes([bytes[6], bytes[7]]);
    let model_type = ModelType::from_tag(tag)
        .ok_or_else(|| AppError::ArtifactLoad(format!("unknown model type tag {}", tag)))?;

    let payload_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != payload_len {
        return Err(AppError::ArtifactLoad(format!(
            "payload is {} bytes, header declares {}",
            payload.len(),
            payload_len
        )));
    }

    let model: RandomForest = bincode::deserialize(payload)
        .map_err(|e| AppError::ArtifactLoad(format!("failed to deserialize model: {}", e)))?;
    model.validate()?;
    Ok((model_type, model))
}

fn write_creating_dirs(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}
