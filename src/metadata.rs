//! Normalized seismic metadata

use crate::config::ConversionConfig;
use crate::formats::SourceFormat;
use crate::header::{SourceHeader, TRACE_HEADER_LEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Default samples per trace when the source header does not say
pub const DEFAULT_SAMPLES: usize = 1000;
/// Default trace count when the source header does not say
pub const DEFAULT_TRACES: usize = 1;
/// Default line count; 2-D surveys are a single line
pub const DEFAULT_LINES: usize = 1;
/// Default sampling rate in Hz when the source header does not say
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 250.0;

/// Logical survey dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub samples: usize,
    pub traces: usize,
    pub lines: usize,
}

impl Dimensions {
    pub fn total_samples(&self) -> usize {
        self.samples * self.traces * self.lines
    }
}

/// Cloud data-service capabilities advertised alongside the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCompatibility {
    /// Ingestion contract version
    pub version: String,
    /// Operations the service can run against the output
    pub supported_operations: BTreeSet<String>,
    /// Service endpoint, when known
    pub endpoint: Option<String>,
}

impl CloudCompatibility {
    fn current() -> Self {
        let supported_operations = ["slice-read", "brick-read", "lod-read"]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            version: "1.0".to_string(),
            supported_operations,
            endpoint: None,
        }
    }
}

/// Normalized record built once per conversion and attached to the result.
///
/// Every field is populated — unknown source facts get the documented
/// defaults above so downstream stages never hit a missing dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeismicMetadata {
    /// Source format the record was extracted from
    pub format: SourceFormat,

    /// Survey dimensions
    pub dimensions: Dimensions,

    /// Sampling rate in Hz
    pub sampling_rate_hz: f64,

    /// Vertical axis units
    pub units: String,

    /// Geographic coordinate system, when the source declares one
    pub coordinate_system: Option<String>,

    /// Source dialect facts (format codes, intervals, revisions)
    pub acquisition_parameters: HashMap<String, String>,

    /// Ordered processing history
    pub processing_history: Vec<String>,

    /// Cloud-service capability block
    pub cloud_compatibility: Option<CloudCompatibility>,

    /// Extraction timestamp
    pub created_at: DateTime<Utc>,
}

/// Build a `SeismicMetadata` record from a decoded header. Pure; never fails.
pub fn extract(header: &SourceHeader, config: &ConversionConfig) -> SeismicMetadata {
    let mut acquisition_parameters = HashMap::new();
    let mut processing_history = Vec::new();
    let mut units = "ms".to_string();

    match header {
        SourceHeader::Segy(h) => {
            acquisition_parameters.insert(
                "sample_interval_us".to_string(),
                h.sample_interval_us.to_string(),
            );
            acquisition_parameters.insert("format_code".to_string(), h.format_code.to_string());
            acquisition_parameters.insert(
                "traces_per_ensemble".to_string(),
                h.traces_per_ensemble.to_string(),
            );
            acquisition_parameters.insert(
                "trace_header_len".to_string(),
                TRACE_HEADER_LEN.to_string(),
            );
        }
        SourceHeader::Las(h) => {
            units = "m".to_string();
            if let Some(version) = &h.version {
                acquisition_parameters.insert("las_version".to_string(), version.clone());
            }
            acquisition_parameters.insert("null_value".to_string(), h.null_value.to_string());
            if let Some(step) = h.step {
                acquisition_parameters.insert("step".to_string(), step.to_string());
            }
        }
        SourceHeader::Generic(h) => {
            acquisition_parameters.insert("byte_len".to_string(), h.byte_len.to_string());
        }
    }

    if config.preserve_metadata {
        processing_history.push(format!(
            "converted from {} by seisconv {}",
            config.source_format,
            crate::SEISCONV_VERSION
        ));
    } else {
        acquisition_parameters.clear();
    }

    SeismicMetadata {
        format: config.source_format,
        dimensions: Dimensions {
            samples: header.samples_per_trace().unwrap_or(DEFAULT_SAMPLES),
            traces: header.trace_count().unwrap_or(DEFAULT_TRACES),
            lines: DEFAULT_LINES,
        },
        sampling_rate_hz: header
            .sampling_rate_hz()
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(DEFAULT_SAMPLING_RATE_HZ),
        units,
        coordinate_system: None,
        acquisition_parameters,
        processing_history,
        cloud_compatibility: config.cloud_compatible.then(CloudCompatibility::current),
        created_at: Utc::now(),
    }
}
