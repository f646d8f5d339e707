//! Conversion pipeline orchestration
//!
//! One request runs the stages sequentially: decode header, extract
//! metadata, gate, encode (pyramid / bricks / compression / assembly),
//! then re-validate the produced buffer. Stage-local errors are wrapped
//! with stage identity and returned; the terminal `ConversionResult` is
//! the only failure signal that crosses the pipeline boundary.

use crate::compat;
use crate::config::{ConversionConfig, ValidationPolicy};
use crate::error::ConvertError;
use crate::header;
use crate::metadata::{self, SeismicMetadata};
use crate::types::TraceVolume;
use crate::validate::{self, CompatibilityReport};
use bytes::Bytes;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cooperative cancellation flag checked at every stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the pipeline aborts at its next boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress callback signature, receiving a percentage 0..=100
pub type ProgressFn = dyn Fn(u8) + Send + Sync;

/// Monotonic progress reporter.
///
/// Percentages only ever move forward; late or duplicate reports from a
/// stage are swallowed rather than shown to the caller out of order.
pub struct ProgressReporter {
    callback: Option<Box<ProgressFn>>,
    last: Mutex<u8>,
}

impl ProgressReporter {
    pub fn new(callback: Box<ProgressFn>) -> Self {
        Self {
            callback: Some(callback),
            last: Mutex::new(0),
        }
    }

    /// Reporter that drops every update
    pub fn disabled() -> Self {
        Self {
            callback: None,
            last: Mutex::new(0),
        }
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let mut last = self.last.lock();
        if percent <= *last {
            return;
        }
        *last = percent;
        if let Some(callback) = &self.callback {
            callback(percent);
        }
    }
}

/// Terminal value of one conversion; never partially populated.
#[derive(Debug)]
pub struct ConversionResult {
    /// Request identity, for correlating logs and storage receipts
    pub request_id: Uuid,
    pub success: bool,
    /// Encoded container; present exactly when `success`
    pub output: Option<Bytes>,
    pub metadata: Option<SeismicMetadata>,
    pub error: Option<String>,
    /// Stage the error originated from
    pub failed_stage: Option<&'static str>,
    pub warnings: Vec<String>,
    pub report: Option<CompatibilityReport>,
}

impl ConversionResult {
    fn failure(
        request_id: Uuid,
        err: ConvertError,
        metadata: Option<SeismicMetadata>,
        warnings: Vec<String>,
    ) -> Self {
        warn!("conversion {} failed at {}: {}", request_id, err.stage(), err);
        Self {
            request_id,
            success: false,
            output: None,
            metadata,
            error: Some(err.to_string()),
            failed_stage: Some(err.stage()),
            warnings,
            report: None,
        }
    }
}

/// The conversion engine. Holds only read-only policy; independent
/// requests can run concurrently on one instance.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    policy: ValidationPolicy,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Run one conversion request to completion.
    pub fn convert(
        &self,
        bytes: &[u8],
        config: &ConversionConfig,
        progress: Option<Box<ProgressFn>>,
        cancel: &CancellationToken,
    ) -> ConversionResult {
        let request_id = Uuid::new_v4();
        let progress = match progress {
            Some(callback) => ProgressReporter::new(callback),
            None => ProgressReporter::disabled(),
        };
        let mut warnings = Vec::new();

        info!(
            "conversion {}: {} ({} bytes) -> {}",
            request_id,
            config.source_format,
            bytes.len(),
            config.target_format
        );

        if let Err(err) = config.validate(&self.policy) {
            return ConversionResult::failure(request_id, err, None, warnings);
        }
        if cancel.is_cancelled() {
            return ConversionResult::failure(
                request_id,
                ConvertError::Cancelled("header-decode"),
                None,
                warnings,
            );
        }

        // Header decode
        let (source_header, header_warnings) =
            match header::decode_header(bytes, config.source_format) {
                Ok(decoded) => decoded,
                Err(err) => return ConversionResult::failure(request_id, err, None, warnings),
            };
        warnings.extend(header_warnings);
        progress.report(10);

        // Metadata extraction
        let meta = metadata::extract(&source_header, config);
        progress.report(20);

        // Pre-conversion gate
        let gate = compat::check(bytes, config, &self.policy);
        warnings.extend(gate.warnings.iter().cloned());
        if let Err(err) = gate.ensure_compatible(config, bytes.len() as u64, &self.policy) {
            return ConversionResult::failure(request_id, err, Some(meta), warnings);
        }
        progress.report(30);
        if cancel.is_cancelled() {
            return ConversionResult::failure(
                request_id,
                ConvertError::Cancelled("sample-decode"),
                Some(meta),
                warnings,
            );
        }

        // Sample decode into the logical volume
        let samples = match header::decode_samples(bytes, config.source_format, &source_header) {
            Ok(samples) => samples,
            Err(err) => {
                return ConversionResult::failure(request_id, err, Some(meta), warnings)
            }
        };
        let dims = meta.dimensions;
        let volume = if dims.total_samples() == samples.len() {
            TraceVolume::new(dims.lines, dims.traces, dims.samples, samples)
        } else {
            if config.source_format.has_binary_header() {
                warnings.push(format!(
                    "decoded {} samples but the header promised {}; treating input as a single trace",
                    samples.len(),
                    dims.total_samples()
                ));
            }
            let len = samples.len();
            TraceVolume::new(1, 1, len, samples)
        };
        progress.report(40);

        // Encode (drives pyramid, bricks, compression, assembly)
        let encoded = match crate::encode::encode_volume(&volume, &meta, config, cancel, &progress)
        {
            Ok(encoded) => encoded,
            Err(err) => {
                return ConversionResult::failure(request_id, err, Some(meta), warnings)
            }
        };
        warnings.extend(encoded.warnings.iter().cloned());

        // Structural validation of the produced buffer; failure here is
        // surfaced, not fatal — the output already exists.
        let report =
            validate::validate_with_policy(&encoded.bytes, Some(bytes.len() as u64), &self.policy);
        if !report.is_structurally_valid {
            warnings.push("output failed structural validation and is not cloud-compatible".to_string());
        } else if !report.cloud_compatible {
            warnings.push("output is structurally valid but below the cloud-compatibility bar".to_string());
        }
        progress.report(95);

        info!(
            "conversion {} done: {} bytes, structurally_valid={} cloud_compatible={}",
            request_id,
            encoded.bytes.len(),
            report.is_structurally_valid,
            report.cloud_compatible
        );
        progress.report(100);

        ConversionResult {
            request_id,
            success: true,
            output: Some(Bytes::from(encoded.bytes)),
            metadata: Some(meta),
            error: None,
            failed_stage: None,
            warnings,
            report: Some(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{Codec, CompressionSpec};
    use crate::formats::{SourceFormat, TargetFormat};
    use parking_lot::Mutex as PlMutex;

    fn segy_config() -> ConversionConfig {
        ConversionConfig::new(SourceFormat::SegY, TargetFormat::Ovds, "line1.sgy")
            .with_compression(CompressionSpec::lossy(Codec::Zstd, 0.01))
            .with_lod_levels(3)
    }

    #[test]
    fn test_successful_conversion() {
        let input = crate::header::testing::segy_fixture(128, 2000, 8);
        let result =
            Converter::new().convert(&input, &segy_config(), None, &CancellationToken::new());

        assert!(result.success, "error: {:?}", result.error);
        assert!(result.output.is_some());
        assert!(result.error.is_none());
        assert!(result.failed_stage.is_none());

        let meta = result.metadata.unwrap();
        assert_eq!(meta.dimensions.samples, 128);
        assert_eq!(meta.dimensions.traces, 8);
        assert_eq!(meta.sampling_rate_hz, 500.0);

        let report = result.report.unwrap();
        assert!(report.is_structurally_valid, "warnings: {:?}", report.warnings);
        assert!(report.cloud_compatible);
    }

    #[test]
    fn test_progress_is_monotonic_and_completes() {
        let input = crate::header::testing::segy_fixture(128, 2000, 8);
        let seen: Arc<PlMutex<Vec<u8>>> = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let result = Converter::new().convert(
            &input,
            &segy_config(),
            Some(Box::new(move |pct| sink.lock().push(pct))),
            &CancellationToken::new(),
        );
        assert!(result.success);

        let seen = seen.lock();
        assert!(!seen.is_empty());
        assert_eq!(*seen.last().unwrap(), 100);
        for pair in seen.windows(2) {
            assert!(pair[1] > pair[0], "progress went backwards: {:?}", *seen);
        }
    }

    #[test]
    fn test_short_buffer_aborts_before_encoding() {
        let result =
            Converter::new().convert(&[0u8; 100], &segy_config(), None, &CancellationToken::new());
        assert!(!result.success);
        assert!(result.output.is_none());
        assert!(result.report.is_none());
        assert_eq!(result.failed_stage, Some("header-decode"));
        assert!(result.error.unwrap().contains("Malformed header"));
    }

    #[test]
    fn test_unsupported_source_fails_gate() {
        let config = ConversionConfig::new(SourceFormat::PetrelZgy, TargetFormat::Ovds, "v.zgy");
        let result =
            Converter::new().convert(&[0u8; 4096], &config, None, &CancellationToken::new());
        assert!(!result.success);
        assert_eq!(result.failed_stage, Some("compatibility-gate"));
        assert!(result.error.unwrap().contains("Unsupported"));
    }

    #[test]
    fn test_pre_cancelled_request() {
        let input = crate::header::testing::segy_fixture(128, 2000, 8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = Converter::new().convert(&input, &segy_config(), None, &cancel);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("cancelled"));
    }

    #[test]
    fn test_truncated_pyramid_surfaces_warning() {
        // 8 samples only support a couple of levels, far fewer than 6.
        let input = crate::header::testing::segy_fixture(8, 1000, 1);
        let config = segy_config().with_lod_levels(6);
        let result = Converter::new().convert(&input, &config, None, &CancellationToken::new());
        assert!(result.success);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("LOD levels")));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let input = crate::header::testing::segy_fixture(128, 2000, 2);
        let config = segy_config().with_brick_size([10, 10, 10]);
        let result = Converter::new().convert(&input, &config, None, &CancellationToken::new());
        assert!(!result.success);
        assert_eq!(result.failed_stage, Some("configuration"));
    }

    #[test]
    fn test_csv_source_converts() {
        let csv: String = (0..512)
            .map(|i| format!("{:.3}", (i as f32 * 0.21).sin() * 10.0))
            .collect::<Vec<_>>()
            .join(",");
        let config = ConversionConfig::new(SourceFormat::Csv, TargetFormat::Ovds, "dump.csv")
            .with_compression(CompressionSpec::lossy(Codec::Deflate, 0.01))
            .with_lod_levels(2)
            .with_brick_size([32, 32, 32]);
        let result =
            Converter::new().convert(csv.as_bytes(), &config, None, &CancellationToken::new());
        assert!(result.success, "error: {:?}", result.error);
        let report = result.report.unwrap();
        assert!(report.is_structurally_valid);
    }
}
