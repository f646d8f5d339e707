//! Target container encoders
//!
//! Every target shares the same envelope: a self-describing UTF-8 JSON
//! header terminated by a newline, followed by the binary brick payload.
//! A reader can locate the payload start from the header content alone.
//! Encoding is a linear state machine; a failed transition aborts with the
//! stage name and never returns a partial buffer.

use crate::brick::{self, OrganizedLevel, TraversalOrder};
use crate::compression::{
    brick_codec_name, derive_quantizer, encode_brick, CompressionInfo, CompressionSpec,
};
use crate::config::ConversionConfig;
use crate::error::{ConvertError, Result};
use crate::formats::TargetFormat;
use crate::metadata::SeismicMetadata;
use crate::pipeline::{CancellationToken, ProgressReporter};
use crate::pyramid::{self, PyramidLevel};
use crate::types::TraceVolume;
use crate::utils::calculate_checksum;
use log::debug;
use serde::{Deserialize, Serialize};

/// Byte separating the JSON header from the binary payload
pub const HEADER_DELIMITER: u8 = b'\n';

/// Container format version written into every header
pub const CONTAINER_VERSION: &str = "1.0";

/// Linear encoder stages; transitions never backtrack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    Init,
    HeaderWritten,
    PyramidBuilt,
    Bricked,
    Compressed,
    Assembled,
    Done,
}

impl EncodeStage {
    pub fn name(&self) -> &'static str {
        match self {
            EncodeStage::Init => "init",
            EncodeStage::HeaderWritten => "header-write",
            EncodeStage::PyramidBuilt => "pyramid-build",
            EncodeStage::Bricked => "brick-organize",
            EncodeStage::Compressed => "compress",
            EncodeStage::Assembled => "assemble",
            EncodeStage::Done => "done",
        }
    }
}

/// Volume facts block of the container header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub dimensionality: usize,
    /// Stored sample representation ("float32" or "quantized")
    pub format: String,
    pub components: usize,
    pub lod_levels: usize,
    pub brick_size: [usize; 3],
    pub margins: [usize; 3],
}

/// Survey geometry block of the container header.
///
/// Ranges are half-open `[start, end)`, so they stay strictly increasing
/// even for single-line surveys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub inline_range: [f64; 2],
    pub crossline_range: [f64; 2],
    pub sample_range: [f64; 2],
    /// Row-major 4x4 index-to-world transform
    pub ijk_to_world: Vec<f64>,
}

/// Target-specific optimization hints, scored by the validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationHints {
    pub chunking_strategy: String,
    pub access_pattern: String,
    pub storage_class: String,
}

/// Complete self-describing container header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerHeader {
    pub format: String,
    pub version: String,
    pub volume_info: VolumeInfo,
    pub geometry: Geometry,
    pub compression: CompressionInfo,
    pub optimization: OptimizationHints,
    /// LOD table; offsets are relative to the payload start
    pub lods: Vec<PyramidLevel>,
    pub payload_size: u64,
}

/// Encoder output: the assembled buffer plus non-fatal notes.
#[derive(Debug, Clone)]
pub struct EncodedVolume {
    pub bytes: Vec<u8>,
    pub warnings: Vec<String>,
}

/// Per-target knobs resolved before encoding starts.
struct TargetProfile {
    format_id: &'static str,
    curve: TraversalOrder,
    brick_size: [usize; 3],
    lod_levels: usize,
    hints: OptimizationHints,
}

/// Resolve the encoding profile for a target. Exhaustive by construction.
fn profile_for(config: &ConversionConfig) -> (TargetProfile, Vec<String>) {
    let mut warnings = Vec::new();
    let profile = match config.target_format {
        TargetFormat::Ovds => TargetProfile {
            format_id: TargetFormat::Ovds.id(),
            curve: TraversalOrder::Morton,
            brick_size: config.brick_size,
            lod_levels: config.lod_levels,
            hints: OptimizationHints {
                chunking_strategy: "morton-bricks".to_string(),
                access_pattern: "random".to_string(),
                storage_class: "hot".to_string(),
            },
        },
        TargetFormat::Hdf5 => TargetProfile {
            format_id: TargetFormat::Hdf5.id(),
            curve: TraversalOrder::RowMajor,
            brick_size: config.brick_size,
            // HDF5 consumers expect plain chunking, not a pyramid.
            lod_levels: 1,
            hints: OptimizationHints {
                chunking_strategy: "chunked-rowmajor".to_string(),
                access_pattern: "sequential".to_string(),
                storage_class: "standard".to_string(),
            },
        },
        TargetFormat::Zgy => {
            if config.brick_size != [64, 64, 64] {
                warnings.push(format!(
                    "ZGY uses fixed 64^3 bricks, overriding configured {:?}",
                    config.brick_size
                ));
            }
            TargetProfile {
                format_id: TargetFormat::Zgy.id(),
                curve: TraversalOrder::Morton,
                brick_size: [64, 64, 64],
                lod_levels: config.lod_levels,
                hints: OptimizationHints {
                    chunking_strategy: "zgy-bricks".to_string(),
                    access_pattern: "random".to_string(),
                    storage_class: "hot".to_string(),
                },
            }
        }
    };
    (profile, warnings)
}

fn fail(stage: EncodeStage, reason: impl Into<String>) -> ConvertError {
    ConvertError::EncodingFailure {
        stage: stage.name(),
        reason: reason.into(),
    }
}

fn checkpoint(stage: EncodeStage, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ConvertError::Cancelled(stage.name()));
    }
    Ok(())
}

/// Encode a trace volume into the target container.
///
/// Drives the stage sequence INIT → HEADER_WRITTEN → PYRAMID_BUILT →
/// BRICKED → COMPRESSED → ASSEMBLED → DONE, checking the cancellation
/// token and reporting progress at every boundary.
pub fn encode_volume(
    volume: &TraceVolume,
    metadata: &SeismicMetadata,
    config: &ConversionConfig,
    cancel: &CancellationToken,
    progress: &ProgressReporter,
) -> Result<EncodedVolume> {
    let mut stage = EncodeStage::Init;
    let (profile, mut warnings) = profile_for(config);
    checkpoint(stage, cancel)?;

    // INIT -> HEADER_WRITTEN: fix geometry and volume facts up front.
    let (lines, traces, samples) = (
        volume.lines.max(1),
        volume.traces_per_line.max(1),
        volume.samples_per_trace.max(1),
    );
    let sample_interval_ms = if metadata.sampling_rate_hz > 0.0 {
        1000.0 / metadata.sampling_rate_hz
    } else {
        1.0
    };
    let geometry = Geometry {
        inline_range: [1.0, 1.0 + lines as f64],
        crossline_range: [1.0, 1.0 + traces as f64],
        sample_range: [0.0, samples as f64 * sample_interval_ms],
        ijk_to_world: vec![
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, sample_interval_ms, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };
    stage = EncodeStage::HeaderWritten;
    checkpoint(stage, cancel)?;

    // HEADER_WRITTEN -> PYRAMID_BUILT
    if volume.is_empty() {
        return Err(fail(EncodeStage::PyramidBuilt, "no samples to encode"));
    }
    let pyramid = pyramid::build(&volume.samples, profile.lod_levels);
    if pyramid.truncated {
        warnings.push(format!(
            "input supports {} LOD levels, {} were requested",
            pyramid.level_count(),
            profile.lod_levels
        ));
    }
    stage = EncodeStage::PyramidBuilt;
    checkpoint(stage, cancel)?;
    progress.report(45);

    // PYRAMID_BUILT -> BRICKED
    let plane = lines * traces;
    let mut organized: Vec<OrganizedLevel> = Vec::with_capacity(pyramid.level_count());
    for level in &pyramid.levels {
        let level_samples = level.len().div_ceil(plane).max(1);
        let organized_level = brick::organize(
            level,
            (lines, traces, level_samples),
            profile.brick_size,
            profile.curve,
        )
        .map_err(|e| fail(EncodeStage::Bricked, e.to_string()))?;
        organized.push(organized_level);
    }
    stage = EncodeStage::Bricked;
    checkpoint(stage, cancel)?;
    progress.report(60);

    // BRICKED -> COMPRESSED: one quantizer for the whole volume so every
    // level reconstructs with the same parameters.
    let spec: CompressionSpec = config.compression;
    let quant = derive_quantizer(volume.value_range(), spec.tolerance);
    let original_size: usize = pyramid.levels.iter().map(|l| l.len() * 4).sum();

    let mut level_blobs: Vec<Vec<u8>> = Vec::with_capacity(organized.len());
    for organized_level in &organized {
        checkpoint(EncodeStage::Compressed, cancel)?;
        let mut blob = Vec::new();
        for brick_samples in &organized_level.bricks {
            let encoded = encode_brick(brick_samples, &spec, quant.as_ref())
                .map_err(|e| fail(EncodeStage::Compressed, e.to_string()))?;
            let len = u32::try_from(encoded.len())
                .map_err(|_| fail(EncodeStage::Compressed, "brick exceeds u32 framing"))?;
            blob.extend_from_slice(&len.to_le_bytes());
            blob.extend_from_slice(&encoded);
        }
        level_blobs.push(blob);
    }
    stage = EncodeStage::Compressed;
    checkpoint(stage, cancel)?;
    progress.report(75);

    // COMPRESSED -> ASSEMBLED
    let mut lods = Vec::with_capacity(level_blobs.len());
    let mut offset = 0u64;
    for (level, blob) in level_blobs.iter().enumerate() {
        if blob.is_empty() {
            return Err(fail(EncodeStage::Assembled, format!("level {} is empty", level)));
        }
        lods.push(PyramidLevel {
            level,
            offset,
            byte_size: blob.len() as u64,
            crc32: calculate_checksum(blob),
        });
        offset += blob.len() as u64;
    }
    let payload_size = offset;
    let compressed_size = payload_size as usize;

    let header = ContainerHeader {
        format: profile.format_id.to_string(),
        version: CONTAINER_VERSION.to_string(),
        volume_info: VolumeInfo {
            dimensionality: 3,
            format: if quant.is_some() {
                "quantized".to_string()
            } else {
                "float32".to_string()
            },
            components: 1,
            lod_levels: lods.len(),
            brick_size: profile.brick_size,
            margins: organized
                .first()
                .map(|l| l.layout.margin)
                .unwrap_or([0, 0, 0]),
        },
        geometry,
        compression: CompressionInfo {
            algorithm: spec.algorithm.as_str().to_string(),
            tolerance: spec.tolerance,
            brick_codec: brick_codec_name(&spec, quant.as_ref()),
            original_size,
            compressed_size,
            quantizer: quant,
        },
        optimization: profile.hints,
        lods,
        payload_size,
    };

    let mut bytes = serde_json::to_vec(&header)
        .map_err(|e| fail(EncodeStage::Assembled, e.to_string()))?;
    bytes.push(HEADER_DELIMITER);
    for blob in &level_blobs {
        bytes.extend_from_slice(blob);
    }
    stage = EncodeStage::Assembled;
    checkpoint(stage, cancel)?;
    progress.report(90);

    stage = EncodeStage::Done;
    debug!(
        "encoder {}: {} -> {} bytes ({} LOD levels, {} original)",
        stage.name(),
        profile.format_id,
        bytes.len(),
        header.volume_info.lod_levels,
        original_size
    );

    Ok(EncodedVolume { bytes, warnings })
}
