use std::fs;
use std::path::{Path, PathBuf};

use crate::models::chunk::ChunkMetadata;
use crate::models::error::CaptureError;

/// Sidecar path for chunk `sequence_number` in `dir`: `chunk-{n}.metadata.json`.
pub fn metadata_path(dir: &Path, sequence_number: u32) -> PathBuf {
    dir.join(format!("chunk-{}.metadata.json", sequence_number))
}

/// Write chunk metadata as a JSON sidecar file next to the chunk.
pub fn write_metadata(metadata: &ChunkMetadata, dir: &Path) -> Result<PathBuf, CaptureError> {
    let path = metadata_path(dir, metadata.sequence_number);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&path, json).map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(path)
}

/// Read chunk metadata back from its JSON sidecar file.
pub fn read_metadata(dir: &Path, sequence_number: u32) -> Result<ChunkMetadata, CaptureError> {
    let path = metadata_path(dir, sequence_number);
    let json = fs::read_to_string(&path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    let metadata: ChunkMetadata = serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}
