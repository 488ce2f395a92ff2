//! Model export and serialization module
//!
//! Artifacts are a directory with a JSON manifest and one checksummed
//! bincode file per fitted model.

mod artifact;
mod serializer;

pub use artifact::{
    read_manifest, ArtifactBundle, ArtifactManifest, HeadManifest, PredictionHead,
    MANIFEST_FILE, SCHEMA_VERSION,
};
pub use serializer::{compute_checksum, load_model, save_model, ModelFile};
