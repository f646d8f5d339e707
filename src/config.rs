//! Conversion configuration and validation policy

use crate::compression::CompressionSpec;
use crate::error::{ConvertError, Result};
use crate::formats::{SourceFormat, TargetFormat};
use serde::{Deserialize, Serialize};

/// Default maximum input size: 10 GiB.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Default chunk size handed to the storage collaborator: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Immutable input to one conversion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Declared source format (detection is a collaborator concern)
    pub source_format: SourceFormat,

    /// Target container to produce
    pub target_format: TargetFormat,

    /// Original file name, carried into metadata
    pub file_name: String,

    /// Compression algorithm and tolerance
    pub compression: CompressionSpec,

    /// Brick edge lengths for the target layout
    pub brick_size: [usize; 3],

    /// Requested number of LOD levels (fewer may be produced for short inputs)
    pub lod_levels: usize,

    /// Slice size for incremental persistence
    pub chunk_size: usize,

    /// Carry source acquisition parameters and processing history through
    pub preserve_metadata: bool,

    /// Attach the cloud-compatibility block and run hint scoring
    pub cloud_compatible: bool,

    /// Promote the size-limit warning to a fatal error
    pub size_limit_fatal: bool,
}

impl ConversionConfig {
    /// Create a config with defaults for everything but the formats.
    pub fn new(
        source_format: SourceFormat,
        target_format: TargetFormat,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            source_format,
            target_format,
            file_name: file_name.into(),
            compression: CompressionSpec::default(),
            brick_size: [64, 64, 64],
            lod_levels: 4,
            chunk_size: DEFAULT_CHUNK_SIZE,
            preserve_metadata: true,
            cloud_compatible: true,
            size_limit_fatal: false,
        }
    }

    /// Set the compression spec
    pub fn with_compression(mut self, compression: CompressionSpec) -> Self {
        self.compression = compression;
        self
    }

    /// Set the brick size
    pub fn with_brick_size(mut self, brick_size: [usize; 3]) -> Self {
        self.brick_size = brick_size;
        self
    }

    /// Set the number of LOD levels
    pub fn with_lod_levels(mut self, lod_levels: usize) -> Self {
        self.lod_levels = lod_levels;
        self
    }

    /// Set the persistence chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Promote oversize inputs from warning to hard failure
    pub fn with_fatal_size_limit(mut self) -> Self {
        self.size_limit_fatal = true;
        self
    }

    /// Reject configs no encoder can satisfy before any work happens.
    pub fn validate(&self, policy: &ValidationPolicy) -> Result<()> {
        for &edge in &self.brick_size {
            if !policy.allowed_brick_sizes.contains(&edge) {
                return Err(ConvertError::Configuration(format!(
                    "brick edge {} not in allowed set {:?}",
                    edge, policy.allowed_brick_sizes
                )));
            }
        }
        if self.lod_levels == 0 {
            return Err(ConvertError::Configuration(
                "at least one LOD level is required".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConvertError::Configuration(
                "chunk size must be nonzero".to_string(),
            ));
        }
        self.compression.validate()?;
        Ok(())
    }
}

/// Policy constants asserted by the validators.
///
/// The brick-size set and the tolerance ceiling come from the target
/// ingestion service's contract and are configuration, not law; override
/// them when that contract changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Brick edge lengths the ingestion service accepts
    pub allowed_brick_sizes: Vec<usize>,

    /// Lossy-compression tolerance above which output is flagged
    pub tolerance_ceiling: f32,

    /// Minimum optimization-hint score for cloud compatibility
    pub hint_score_threshold: f64,

    /// Maximum input size before the gate warns (or fails, per config)
    pub max_input_bytes: u64,

    /// Bricks smaller than this many voxels are flagged as inefficient
    pub min_brick_voxels: usize,

    /// Bricks larger than this many voxels are flagged as inefficient
    pub max_brick_voxels: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            allowed_brick_sizes: vec![32, 64, 128],
            tolerance_ceiling: 0.05,
            hint_score_threshold: 0.4,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            min_brick_voxels: 4096,
            max_brick_voxels: 1_048_576,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass_policy() {
        let config = ConversionConfig::new(SourceFormat::SegY, TargetFormat::Ovds, "line1.sgy");
        assert!(config.validate(&ValidationPolicy::default()).is_ok());
    }

    #[test]
    fn test_rejects_odd_brick_edge() {
        let config = ConversionConfig::new(SourceFormat::SegY, TargetFormat::Ovds, "line1.sgy")
            .with_brick_size([64, 48, 64]);
        assert!(config.validate(&ValidationPolicy::default()).is_err());
    }

    #[test]
    fn test_rejects_zero_lod_levels() {
        let config = ConversionConfig::new(SourceFormat::SegY, TargetFormat::Ovds, "line1.sgy")
            .with_lod_levels(0);
        assert!(config.validate(&ValidationPolicy::default()).is_err());
    }
}
