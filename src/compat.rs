//! Pre-conversion compatibility gate

use crate::config::{ConversionConfig, ValidationPolicy};
use crate::error::{ConvertError, Result};
use crate::header;
use crate::utils::format_bytes;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Per-step verdicts of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSteps {
    /// Source format is in the declared support table
    pub format_supported: bool,
    /// Input length is within the policy maximum
    pub size_within_limit: bool,
    /// Source header decodes with non-zero sample fields
    pub header_integrity: bool,
}

/// Outcome of the pre-conversion gate. Pure predicate over the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    pub is_compatible: bool,
    pub steps: GateSteps,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Check whether an input can enter the pipeline at all.
///
/// Format support and header integrity are hard requirements; an oversize
/// input only blocks the pipeline when the config promotes the size limit
/// to fatal, otherwise it is recorded as a warning.
pub fn check(bytes: &[u8], config: &ConversionConfig, policy: &ValidationPolicy) -> GateReport {
    let mut recommendations = Vec::new();
    let mut warnings = Vec::new();

    let format_supported = config.source_format.is_supported();
    if !format_supported {
        recommendations.push(format!(
            "{} inputs are recognized but not yet convertible; export to SEG-Y first",
            config.source_format
        ));
    }

    let size_within_limit = (bytes.len() as u64) <= policy.max_input_bytes;
    if !size_within_limit {
        warn!(
            "input is {}, policy limit is {}",
            format_bytes(bytes.len()),
            format_bytes(policy.max_input_bytes as usize)
        );
        warnings.push(format!(
            "input is {} which exceeds the {} limit",
            format_bytes(bytes.len()),
            format_bytes(policy.max_input_bytes as usize)
        ));
        recommendations.push("split the survey or raise the configured size limit".to_string());
    }

    let header_integrity = if format_supported {
        match header::decode_header(bytes, config.source_format) {
            Ok((_, header_warnings)) => {
                warnings.extend(header_warnings);
                true
            }
            Err(err) => {
                recommendations.push(format!("source header failed to decode: {}", err));
                false
            }
        }
    } else {
        false
    };

    // An oversize input is advisory unless the config promotes it to fatal.
    let size_ok_for_gate = size_within_limit || !config.size_limit_fatal;
    let is_compatible = format_supported && size_ok_for_gate && header_integrity;
    info!(
        "gate: format={} size={} header={} -> {}",
        format_supported, size_within_limit, header_integrity, is_compatible
    );

    GateReport {
        is_compatible,
        steps: GateSteps {
            format_supported,
            size_within_limit,
            header_integrity,
        },
        recommendations,
        warnings,
    }
}

impl GateReport {
    /// Translate a failed gate into the error that aborts the pipeline.
    pub fn ensure_compatible(&self, config: &ConversionConfig, input_len: u64, policy: &ValidationPolicy) -> Result<()> {
        if self.is_compatible {
            return Ok(());
        }
        if !self.steps.format_supported {
            return Err(ConvertError::UnsupportedFormat(
                config.source_format.to_string(),
            ));
        }
        if !self.steps.header_integrity {
            return Err(ConvertError::MalformedHeader(
                "source header failed integrity checks".to_string(),
            ));
        }
        Err(ConvertError::SizeLimitExceeded {
            actual: input_len,
            limit: policy.max_input_bytes,
        })
    }
}
