//! Checksummed binary model files

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, Result};
use crate::training::KNNRegressor;

/// On-disk envelope for one fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    pub format_version: u32,
    /// bincode-encoded model
    pub model_data: Vec<u8>,
    pub checksum: u64,
}

impl ModelFile {
    const MAGIC: [u8; 4] = [b'G', b'P', b'K', b'N'];
    const VERSION: u32 = 1;

    pub fn new(model: &KNNRegressor) -> Result<Self> {
        let model_data = bincode::serialize(model)?;
        let checksum = compute_checksum(&model_data);
        Ok(Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            model_data,
            checksum,
        })
    }

    pub fn verify_checksum(&self) -> bool {
        compute_checksum(&self.model_data) == self.checksum
    }

    pub fn model(&self) -> Result<KNNRegressor> {
        if self.magic != Self::MAGIC {
            return Err(GradeError::Artifact("not a model file (bad magic bytes)".to_string()));
        }
        if self.format_version != Self::VERSION {
            return Err(GradeError::Artifact(format!(
                "unsupported model file version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if !self.verify_checksum() {
            return Err(GradeError::Artifact(
                "checksum verification failed, model file may be corrupted".to_string(),
            ));
        }
        Ok(bincode::deserialize(&self.model_data)?)
    }
}

/// FNV-1a hash
pub fn compute_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Write a model file, returning the payload checksum.
pub fn save_model(model: &KNNRegressor, path: impl AsRef<Path>) -> Result<u64> {
    let file = ModelFile::new(model)?;
    let bytes = bincode::serialize(&file)?;

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(file.checksum)
}

/// Read and verify a model file.
///
/// `expected_checksum` comes from the manifest; a mismatch means the model
/// file and manifest were not written together.
pub fn load_model(path: impl AsRef<Path>, expected_checksum: u64) -> Result<KNNRegressor> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    BufReader::new(File::open(path).map_err(|e| {
        GradeError::Artifact(format!("cannot open {}: {}", path.display(), e))
    })?)
    .read_to_end(&mut bytes)?;

    let file: ModelFile = bincode::deserialize(&bytes)
        .map_err(|e| GradeError::Artifact(format!("cannot decode {}: {}", path.display(), e)))?;
    if file.checksum != expected_checksum {
        return Err(GradeError::Artifact(format!(
            "{} does not match the manifest checksum",
            path.display()
        )));
    }
    file.model()
}
