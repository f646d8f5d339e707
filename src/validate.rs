//! Post-conversion structural validator
//!
//! A black-box consumer of the encoded buffer: it re-derives the
//! header/payload boundary and re-checks every structural property from
//! the bytes alone, independent of whatever encoder produced them. It
//! never panics and never trusts an encoded claim it can re-check.

use crate::config::ValidationPolicy;
use crate::utils::calculate_checksum;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Assumed ingest throughput for the load-time estimate
const ASSUMED_THROUGHPUT_BYTES_PER_SEC: f64 = 100.0 * 1024.0 * 1024.0;

/// Step names as they appear in `step_results`
pub mod steps {
    pub const HEADER: &str = "headerWellFormed";
    pub const VOLUME_INFO: &str = "volumeInfoConsistent";
    pub const GEOMETRY: &str = "geometrySane";
    pub const COMPRESSION: &str = "compressionSound";
    pub const LOD_ORDER: &str = "lodOffsetsMonotonic";
    pub const BRICK_BOUNDS: &str = "brickSizeEfficient";
    pub const HINTS: &str = "optimizationHintsComplete";
}

/// Size and access metrics derived from the buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    pub file_size: u64,
    pub compression_ratio: f64,
    pub estimated_load_time_sec: f64,
    /// 0..1, higher means better suited to brick-level random access
    pub random_access_score: f64,
}

/// Re-derived verdict on an encoded artifact.
///
/// Constructed once per validation and never mutated; consumers read it
/// instead of re-running validation logic themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityReport {
    pub is_structurally_valid: bool,
    pub cloud_compatible: bool,
    pub step_results: BTreeMap<String, bool>,
    /// Optimization-hint completeness, 0..1
    pub hint_score: f64,
    pub metrics: ReportMetrics,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Find the end of the JSON header block by brace matching.
///
/// Returns the byte index one past the closing brace. String-aware, so
/// braces inside JSON strings do not confuse the scan.
fn header_end(bytes: &[u8]) -> Option<usize> {
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth = 0i64;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn as_range(value: &Value) -> Option<(f64, f64)> {
    let arr = value.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    Some((arr[0].as_f64()?, arr[1].as_f64()?))
}

/// Validate an encoded buffer against the default policy.
pub fn validate(bytes: &[u8], original_size: Option<u64>) -> CompatibilityReport {
    validate_with_policy(bytes, original_size, &ValidationPolicy::default())
}

/// Validate an encoded buffer against an explicit policy.
pub fn validate_with_policy(
    bytes: &[u8],
    original_size: Option<u64>,
    policy: &ValidationPolicy,
) -> CompatibilityReport {
    let mut step_results = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    // Step 1: header well-formedness, and the boundary re-derivation
    // everything else depends on.
    let boundary = header_end(bytes);
    let header: Option<Value> = boundary
        .and_then(|end| serde_json::from_slice(&bytes[..end]).ok());
    let payload: &[u8] = match boundary {
        Some(end) => {
            // A single delimiter byte may follow the closing brace.
            let start = if bytes.get(end) == Some(&crate::encode::HEADER_DELIMITER) {
                end + 1
            } else {
                end
            };
            &bytes[start.min(bytes.len())..]
        }
        None => &[],
    };

    let format_known = header
        .as_ref()
        .and_then(|h| h.get("format"))
        .and_then(Value::as_str)
        .is_some_and(|id| crate::formats::TargetFormat::from_id(id).is_some());
    let version_present = header
        .as_ref()
        .and_then(|h| h.get("version"))
        .and_then(Value::as_str)
        .is_some_and(|v| !v.is_empty());
    let header_ok = header.is_some() && format_known && version_present;
    step_results.insert(steps::HEADER.to_string(), header_ok);
    if !header_ok {
        warnings.push("header block is missing, unparseable, or not a known format".to_string());
        recommendations.push("re-encode; the output does not carry a readable header".to_string());
    }

    let empty = Value::Null;
    let h = header.as_ref().unwrap_or(&empty);

    // Step 2: volume-info consistency
    let volume_info = h.get("volume_info");
    let dimensionality = volume_info
        .and_then(|v| v.get("dimensionality"))
        .and_then(Value::as_u64);
    let brick_size: Vec<u64> = volume_info
        .and_then(|v| v.get("brickSize"))
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default();
    let lod_levels = volume_info
        .and_then(|v| v.get("lodLevels"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let bricks_allowed = brick_size.len() == 3
        && brick_size
            .iter()
            .all(|&b| policy.allowed_brick_sizes.contains(&(b as usize)));
    let volume_ok = dimensionality == Some(3) && bricks_allowed && lod_levels >= 1;
    step_results.insert(steps::VOLUME_INFO.to_string(), volume_ok);
    if !volume_ok {
        warnings.push("volume info is inconsistent".to_string());
        recommendations.push(format!(
            "use a 3-D layout with brick edges from {:?} and at least one LOD level",
            policy.allowed_brick_sizes
        ));
    }

    // Step 3: geometry sanity
    let geometry = h.get("geometry");
    let ranges_ok = ["inlineRange", "crosslineRange", "sampleRange"]
        .iter()
        .all(|key| {
            geometry
                .and_then(|g| g.get(*key))
                .and_then(|v| as_range(v))
                .is_some_and(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo < hi)
        });
    let transform_ok = geometry
        .and_then(|g| g.get("ijkToWorld"))
        .and_then(Value::as_array)
        .is_some_and(|m| m.len() == 16 && m.iter().all(|v| v.as_f64().is_some_and(f64::is_finite)));
    let geometry_ok = ranges_ok && transform_ok;
    step_results.insert(steps::GEOMETRY.to_string(), geometry_ok);
    if !geometry_ok {
        warnings.push("geometry ranges or transform are unsound".to_string());
        recommendations
            .push("ranges must strictly increase and ijkToWorld needs 16 finite entries".to_string());
    }

    // Step 4: compression block presence and soundness
    let compression = h.get("compression");
    let algorithm_present = compression
        .and_then(|c| c.get("algorithm"))
        .and_then(Value::as_str)
        .is_some_and(|a| !a.is_empty());
    let tolerance = compression
        .and_then(|c| c.get("tolerance"))
        .and_then(Value::as_f64);
    let compression_ok =
        algorithm_present && tolerance.is_some_and(|t| (0.0..=1.0).contains(&t));
    step_results.insert(steps::COMPRESSION.to_string(), compression_ok);
    if !compression_ok {
        warnings.push("compression block is missing or unsound".to_string());
    } else if let Some(t) = tolerance {
        if t > policy.tolerance_ceiling as f64 {
            warnings.push(format!(
                "compression tolerance {} exceeds the {} safety ceiling",
                t, policy.tolerance_ceiling
            ));
            recommendations.push("lower the tolerance or confirm the ingestion contract allows it".to_string());
        }
    }

    // Step 5: LOD offset monotonicity, re-checked from the encoded table
    let lods = h.get("lods").and_then(Value::as_array);
    let mut lod_ok = false;
    if let Some(entries) = lods {
        lod_ok = !entries.is_empty();
        let mut previous_end = 0u64;
        let mut last_offset: Option<u64> = None;
        for entry in entries {
            let offset = entry.get("offset").and_then(Value::as_u64);
            let byte_size = entry.get("byteSize").and_then(Value::as_u64);
            let (Some(offset), Some(byte_size)) = (offset, byte_size) else {
                lod_ok = false;
                break;
            };
            if byte_size == 0 {
                warnings.push("a LOD level claims zero bytes".to_string());
                lod_ok = false;
                break;
            }
            if last_offset.is_some_and(|prev| offset <= prev) {
                warnings.push("LOD offsets are not strictly increasing".to_string());
                lod_ok = false;
                break;
            }
            last_offset = Some(offset);
            previous_end = previous_end.max(offset + byte_size);
        }
        if lod_ok && previous_end > payload.len() as u64 {
            warnings.push("LOD table points past the end of the payload".to_string());
            lod_ok = false;
        }
        if lod_ok {
            if entries.len() as u64 != lod_levels {
                warnings.push(format!(
                    "LOD table has {} entries but volume info claims {}",
                    entries.len(),
                    lod_levels
                ));
            }
            // Checksums are advisory; a mismatch flags corruption without
            // flipping structural validity.
            for entry in entries {
                let (Some(offset), Some(byte_size), Some(crc)) = (
                    entry.get("offset").and_then(Value::as_u64),
                    entry.get("byteSize").and_then(Value::as_u64),
                    entry.get("crc32").and_then(Value::as_u64),
                ) else {
                    continue;
                };
                let slice = &payload[offset as usize..(offset + byte_size) as usize];
                if calculate_checksum(slice) as u64 != crc {
                    warnings.push(format!(
                        "LOD level at offset {} fails its checksum",
                        offset
                    ));
                }
            }
        }
    } else {
        warnings.push("LOD table is missing".to_string());
    }
    step_results.insert(steps::LOD_ORDER.to_string(), lod_ok);

    // Step 6: brick-size efficiency bounds (non-fatal)
    let brick_voxels: u64 = if brick_size.len() == 3 {
        brick_size.iter().product()
    } else {
        0
    };
    let brick_efficient = (policy.min_brick_voxels as u64..=policy.max_brick_voxels as u64)
        .contains(&brick_voxels);
    step_results.insert(steps::BRICK_BOUNDS.to_string(), brick_efficient);
    if !brick_efficient {
        warnings.push(format!(
            "brick holds {} samples, outside the efficient [{}, {}] window",
            brick_voxels, policy.min_brick_voxels, policy.max_brick_voxels
        ));
        recommendations.push(format!(
            "pick a brick size holding between {} and {} samples",
            policy.min_brick_voxels, policy.max_brick_voxels
        ));
    }

    // Step 7: optimization-hint completeness, scored rather than binary
    let optimization = h.get("optimization");
    let hint_fields = ["chunkingStrategy", "accessPattern", "storageClass"];
    let present = hint_fields
        .iter()
        .filter(|key| {
            optimization
                .and_then(|o| o.get(**key))
                .and_then(Value::as_str)
                .is_some_and(|v| !v.is_empty())
        })
        .count();
    let hint_score = present as f64 / hint_fields.len() as f64;
    let hints_ok = hint_score > policy.hint_score_threshold;
    step_results.insert(steps::HINTS.to_string(), hints_ok);
    if !hints_ok {
        recommendations.push(
            "populate chunkingStrategy, accessPattern and storageClass so the ingestion service can place the data".to_string(),
        );
    }

    // The five hard structural checks gate validity; brick bounds and
    // hints only affect the cloud verdict and the recommendations.
    let is_structurally_valid =
        header_ok && volume_ok && geometry_ok && compression_ok && lod_ok;
    let cloud_compatible = is_structurally_valid && hints_ok;

    let file_size = bytes.len() as u64;
    let original = original_size.or_else(|| {
        compression
            .and_then(|c| c.get("originalSize"))
            .and_then(Value::as_u64)
    });
    let compression_ratio = match original {
        Some(orig) if file_size > 0 => orig as f64 / file_size as f64,
        _ => 1.0,
    };
    let chunking = optimization
        .and_then(|o| o.get("chunkingStrategy"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut random_access_score = 0.0;
    if brick_efficient {
        random_access_score += 0.4;
    }
    if chunking.contains("morton") || chunking.contains("zgy") {
        random_access_score += 0.3;
    }
    random_access_score += 0.3 * (lod_levels.min(4) as f64 / 4.0);

    debug!(
        "validated {} bytes: structural={} cloud={} hints={:.2}",
        file_size, is_structurally_valid, cloud_compatible, hint_score
    );

    CompatibilityReport {
        is_structurally_valid,
        cloud_compatible,
        step_results,
        hint_score,
        metrics: ReportMetrics {
            file_size,
            compression_ratio,
            estimated_load_time_sec: file_size as f64 / ASSUMED_THROUGHPUT_BYTES_PER_SEC,
            random_access_score: random_access_score.min(1.0),
        },
        recommendations,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{Codec, CompressionSpec};
    use crate::config::ConversionConfig;
    use crate::encode::{self, HEADER_DELIMITER};
    use crate::formats::{SourceFormat, TargetFormat};
    use crate::header::GenericHeader;
    use crate::metadata;
    use crate::pipeline::{CancellationToken, ProgressReporter};

    fn encoded_fixture(tolerance: f32) -> Vec<u8> {
        let config = ConversionConfig::new(SourceFormat::SegY, TargetFormat::Ovds, "line1.sgy")
            .with_compression(CompressionSpec::lossy(Codec::Zstd, tolerance))
            .with_lod_levels(3);
        let header = crate::header::SourceHeader::Generic(GenericHeader { byte_len: 0 });
        let meta = metadata::extract(&header, &config);
        let volume = encode::testing::test_volume(70, 100);
        encode::encode_volume(&volume, &meta, &config, &CancellationToken::default(), &ProgressReporter::disabled())
            .unwrap()
            .bytes
    }

    /// Rewrite the LOD offsets of an encoded buffer in place.
    fn corrupt_lod_offsets(bytes: &[u8], offsets: &[u64]) -> Vec<u8> {
        let end = header_end(bytes).unwrap();
        let mut header: serde_json::Value = serde_json::from_slice(&bytes[..end]).unwrap();
        let lods = header["lods"].as_array_mut().unwrap();
        for (entry, &offset) in lods.iter_mut().zip(offsets) {
            entry["offset"] = serde_json::json!(offset);
        }
        let mut out = serde_json::to_vec(&header).unwrap();
        out.push(HEADER_DELIMITER);
        out.extend_from_slice(&bytes[end + 1..]);
        out
    }

    #[test]
    fn test_well_formed_output_passes() {
        let bytes = encoded_fixture(0.01);
        let report = validate(&bytes, Some(1024 * 1024));
        assert!(report.is_structurally_valid, "warnings: {:?}", report.warnings);
        assert!(report.cloud_compatible);
        assert!(report.step_results[steps::HEADER]);
        assert!(report.step_results[steps::LOD_ORDER]);
        assert!(report.hint_score > 0.4);
        assert!(report.metrics.random_access_score > 0.5);
    }

    #[test]
    fn test_decreasing_lod_offsets_invalid() {
        let bytes = encoded_fixture(0.01);
        let corrupted = corrupt_lod_offsets(&bytes, &[100, 50, 25]);
        let report = validate(&corrupted, None);
        assert!(!report.is_structurally_valid);
        assert!(!report.step_results[steps::LOD_ORDER]);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("LOD offsets are not strictly increasing")));
    }

    #[test]
    fn test_high_tolerance_warns_but_stays_valid() {
        let bytes = encoded_fixture(0.2);
        let report = validate(&bytes, None);
        assert!(report.is_structurally_valid);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("safety ceiling")));
    }

    #[test]
    fn test_garbage_buffer_never_panics() {
        for bytes in [
            &b""[..],
            &b"not json at all"[..],
            &b"{\"format\":\"OVDS\""[..],
            &b"{}"[..],
            &[0xFFu8; 64][..],
        ] {
            let report = validate(bytes, None);
            assert!(!report.is_structurally_valid);
        }
    }

    #[test]
    fn test_validation_idempotent() {
        let bytes = encoded_fixture(0.01);
        let first = validate(&bytes, Some(4096));
        let second = validate(&bytes, Some(4096));
        assert_eq!(first, second);
    }

    #[test]
    fn test_lod_table_past_payload_end() {
        let bytes = encoded_fixture(0.01);
        let end = header_end(&bytes).unwrap();
        let mut header: serde_json::Value = serde_json::from_slice(&bytes[..end]).unwrap();
        let lods = header["lods"].as_array_mut().unwrap();
        let last = lods.last_mut().unwrap();
        last["byteSize"] = serde_json::json!(u32::MAX);
        let mut corrupted = serde_json::to_vec(&header).unwrap();
        corrupted.push(HEADER_DELIMITER);
        corrupted.extend_from_slice(&bytes[end + 1..]);

        let report = validate(&corrupted, None);
        assert!(!report.is_structurally_valid);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("past the end")));
    }

    #[test]
    fn test_unknown_format_id_rejected() {
        let bytes = encoded_fixture(0.01);
        let end = header_end(&bytes).unwrap();
        let mut header: serde_json::Value = serde_json::from_slice(&bytes[..end]).unwrap();
        header["format"] = serde_json::json!("SEGY");
        let mut corrupted = serde_json::to_vec(&header).unwrap();
        corrupted.push(HEADER_DELIMITER);
        corrupted.extend_from_slice(&bytes[end + 1..]);

        let report = validate(&corrupted, None);
        assert!(!report.step_results[steps::HEADER]);
        assert!(!report.is_structurally_valid);
    }

    #[test]
    fn test_brace_scan_ignores_braces_in_strings() {
        let json = br#"{"format":"OVDS","note":"odd } brace {"}"#;
        let mut bytes = json.to_vec();
        bytes.push(HEADER_DELIMITER);
        bytes.extend_from_slice(b"payload");
        assert_eq!(header_end(&bytes), Some(json.len()));
    }

    #[test]
    fn test_policy_override_changes_verdict() {
        let bytes = encoded_fixture(0.01);
        let strict = ValidationPolicy {
            allowed_brick_sizes: vec![128],
            ..Default::default()
        };
        let report = validate_with_policy(&bytes, None, &strict);
        // Default 64^3 bricks fail a 128-only policy.
        assert!(!report.step_results[steps::VOLUME_INFO]);
        assert!(!report.is_structurally_valid);
    }
}
