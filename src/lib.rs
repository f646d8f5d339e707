//! Seisconv - seismic format conversion engine
//!
//! Converts legacy exploration-geophysics formats (SEG-Y, Seismic Unix,
//! LAS, delimited text, raw binary) into cloud-oriented volumetric
//! containers (OVDS, HDF5, ZGY), then re-validates the produced bytes
//! against a cloud ingestion contract.
//!
//! # Features
//!
//! - Byte-exact SEG-Y header codec (decode/encode round-trips)
//! - LOD pyramid construction by pairwise averaging
//! - Morton-ordered 3-D brick layout with recorded margins
//! - Tolerance-driven quantization plus entropy coding (Deflate, Zstd, RLE)
//! - Black-box structural validator producing a compatibility report
//! - Cooperative cancellation and monotonic progress reporting
//! - Chunked persistence through an async `Storage` trait (implement it
//!   for your cloud SDK; a local filesystem backend ships in-crate)
//!
//! # Example
//!
//! ```rust,ignore
//! use seisconv::{CancellationToken, ConversionConfig, Converter, SourceFormat, TargetFormat};
//!
//! let config = ConversionConfig::new(SourceFormat::SegY, TargetFormat::Ovds, "line1.sgy");
//! let result = Converter::new().convert(&file_bytes, &config, None, &CancellationToken::new());
//! if result.success {
//!     let report = result.report.unwrap();
//!     println!("cloud compatible: {}", report.cloud_compatible);
//! }
//! ```

pub mod brick;
pub mod compat;
pub mod compression;
pub mod config;
pub mod encode;
pub mod error;
pub mod formats;
pub mod header;
pub mod metadata;
pub mod pipeline;
pub mod pyramid;
pub mod storage;
pub mod types;
pub mod utils;
pub mod validate;

// Re-exports
pub use compat::GateReport;
pub use compression::{Codec, CompressionLevel, CompressionSpec, Compressor};
pub use config::{ConversionConfig, ValidationPolicy};
pub use error::{ConvertError, Result};
pub use formats::{SourceFormat, TargetFormat};
pub use metadata::SeismicMetadata;
pub use pipeline::{CancellationToken, ConversionResult, Converter};
pub use storage::{Destination, FileSystemStorage, PersistReceipt, Storage};
pub use types::{SampleFormat, TraceVolume, ValueRange};
pub use validate::CompatibilityReport;

/// Version of the conversion engine
pub const SEISCONV_VERSION: &str = env!("CARGO_PKG_VERSION");
