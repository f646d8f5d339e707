//! Brick compression: tolerance-driven quantization plus entropy coding

use crate::error::{ConvertError, Result};
use crate::types::ValueRange;
use crate::utils::f32_samples_to_bytes;
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Entropy codecs applied to brick bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// No entropy coding
    None,
    /// Run-length encoding
    Rle,
    /// Deflate/ZIP
    Deflate,
    /// Zstandard
    Zstd,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Rle => "rle",
            Codec::Deflate => "deflate",
            Codec::Zstd => "zstd",
        }
    }
}

/// Compression level (0-9, where 0 is no compression and 9 is maximum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn fast() -> Self {
        Self(1)
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Requested compression behavior for one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionSpec {
    /// Entropy codec for brick bytes
    pub algorithm: Codec,
    /// Fraction of the dynamic range allowed as per-sample error;
    /// zero means lossless
    pub tolerance: f32,
    /// Entropy-coder effort level
    pub level: CompressionLevel,
}

impl Default for CompressionSpec {
    fn default() -> Self {
        Self {
            algorithm: Codec::Zstd,
            tolerance: 0.0,
            level: CompressionLevel::default(),
        }
    }
}

impl CompressionSpec {
    pub fn lossless(algorithm: Codec) -> Self {
        Self {
            algorithm,
            tolerance: 0.0,
            level: CompressionLevel::default(),
        }
    }

    pub fn lossy(algorithm: Codec, tolerance: f32) -> Self {
        Self {
            algorithm,
            tolerance,
            level: CompressionLevel::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(ConvertError::Configuration(format!(
                "tolerance {} outside [0, 1]",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Provenance recorded next to the compressed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionInfo {
    pub algorithm: String,
    pub tolerance: f32,
    /// Per-brick encoding pipeline, e.g. "quant-u16+zstd"
    pub brick_codec: String,
    pub original_size: usize,
    pub compressed_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantizer: Option<QuantParams>,
}

/// Trait for entropy compression/decompression operations
pub trait Compressor: Send + Sync {
    /// Compress data
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>>;

    /// Get the codec
    fn method(&self) -> Codec;
}

/// No compression
#[derive(Debug, Default)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn method(&self) -> Codec {
        Codec::None
    }
}

/// Deflate compression
#[derive(Debug, Default)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(data, FlateCompression::new(level.value() as u32));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| ConvertError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(data);
        let mut decompressed = if let Some(size) = expected_size {
            Vec::with_capacity(size)
        } else {
            Vec::new()
        };
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| ConvertError::Decompression(e.to_string()))?;
        Ok(decompressed)
    }

    fn method(&self) -> Codec {
        Codec::Deflate
    }
}

/// Zstandard compression
#[derive(Debug, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        zstd::encode_all(data, level.value() as i32)
            .map_err(|e| ConvertError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| ConvertError::Decompression(e.to_string()))
    }

    fn method(&self) -> Codec {
        Codec::Zstd
    }
}

/// Run-length encoding compressor
#[derive(Debug, Default)]
pub struct RleCompressor;

impl RleCompressor {
    fn compress_internal(data: &[u8]) -> Vec<u8> {
        if data.is_empty() {
            return Vec::new();
        }

        let mut compressed = Vec::new();
        let mut i = 0;

        while i < data.len() {
            let byte = data[i];
            let mut count = 1usize;

            while i + count < data.len() && data[i + count] == byte && count < 255 {
                count += 1;
            }

            compressed.push(count as u8);
            compressed.push(byte);

            i += count;
        }

        compressed
    }

    fn decompress_internal(data: &[u8]) -> Result<Vec<u8>> {
        if data.len() % 2 != 0 {
            return Err(ConvertError::Decompression(
                "RLE data must have even length".to_string(),
            ));
        }

        let mut decompressed = Vec::new();

        for chunk in data.chunks_exact(2) {
            let count = chunk[0] as usize;
            let value = chunk[1];
            decompressed.extend(std::iter::repeat(value).take(count));
        }

        Ok(decompressed)
    }
}

impl Compressor for RleCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(Self::compress_internal(data))
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        Self::decompress_internal(data)
    }

    fn method(&self) -> Codec {
        Codec::Rle
    }
}

/// Get a compressor for a given codec
pub fn get_compressor(codec: Codec) -> Box<dyn Compressor> {
    match codec {
        Codec::None => Box::new(NoneCompressor),
        Codec::Rle => Box::new(RleCompressor),
        Codec::Deflate => Box::new(DeflateCompressor),
        Codec::Zstd => Box::new(ZstdCompressor),
    }
}

/// Uniform quantizer parameters, shared by every brick of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantParams {
    /// Value mapped to integer level 0
    pub minimum: f64,
    /// Reconstruction step; maximum quantization error is step/2
    pub step: f64,
    /// Bits needed for the largest level index
    pub bits: u8,
}

impl QuantParams {
    /// Storage width for one quantized sample
    pub fn bytes_per_sample(&self) -> usize {
        match self.bits {
            0..=8 => 1,
            9..=16 => 2,
            _ => 4,
        }
    }
}

/// Derive quantizer parameters for a tolerance over a value range.
///
/// Step is `2 * tolerance * dynamic_range`, so the per-sample error stays
/// within `tolerance * dynamic_range`. Returns None for tolerance zero or
/// a degenerate range — both take the lossless path.
pub fn derive_quantizer(range: ValueRange, tolerance: f32) -> Option<QuantParams> {
    if tolerance <= 0.0 {
        return None;
    }
    let dynamic_range = range.dynamic_range();
    if !(dynamic_range.is_finite()) || dynamic_range <= 0.0 {
        return None;
    }

    let step = 2.0 * tolerance as f64 * dynamic_range;
    let max_level = (dynamic_range / step).floor() as u64;
    let bits = (64 - max_level.leading_zeros()).max(1) as u8;
    Some(QuantParams {
        minimum: range.min,
        step,
        bits: bits.min(32),
    })
}

/// Quantize samples to minimal-width little-endian integers.
pub fn quantize(samples: &[f32], params: &QuantParams) -> Vec<u8> {
    let max_level = (u64::MAX >> (64 - params.bits as u32)) as f64;
    let mut out = Vec::with_capacity(samples.len() * params.bytes_per_sample());
    for &s in samples {
        let level = (((s as f64 - params.minimum) / params.step).round())
            .clamp(0.0, max_level) as u64;
        match params.bytes_per_sample() {
            1 => out.push(level as u8),
            2 => out.extend_from_slice(&(level as u16).to_le_bytes()),
            _ => out.extend_from_slice(&(level as u32).to_le_bytes()),
        }
    }
    out
}

/// Reconstruct f32 samples from quantized bytes.
pub fn dequantize(bytes: &[u8], params: &QuantParams) -> Result<Vec<f32>> {
    let width = params.bytes_per_sample();
    if bytes.len() % width != 0 {
        return Err(ConvertError::Decompression(
            "quantized data not aligned to sample width".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(bytes.len() / width);
    for chunk in bytes.chunks_exact(width) {
        let level = match width {
            1 => chunk[0] as u64,
            2 => u16::from_le_bytes([chunk[0], chunk[1]]) as u64,
            _ => u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as u64,
        };
        out.push((params.minimum + level as f64 * params.step) as f32);
    }
    Ok(out)
}

/// Encode one brick: quantize when a quantizer is given, then entropy-code.
pub fn encode_brick(
    samples: &[f32],
    spec: &CompressionSpec,
    quant: Option<&QuantParams>,
) -> Result<Vec<u8>> {
    let raw = match quant {
        Some(params) => quantize(samples, params),
        None => f32_samples_to_bytes(samples),
    };
    get_compressor(spec.algorithm).compress(&raw, spec.level)
}

/// Name of the per-brick encoding pipeline for the provenance record.
pub fn brick_codec_name(spec: &CompressionSpec, quant: Option<&QuantParams>) -> String {
    match quant {
        Some(params) => format!(
            "quant-u{}+{}",
            params.bytes_per_sample() * 8,
            spec.algorithm.as_str()
        ),
        None => format!("f32le+{}", spec.algorithm.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f32> {
        // Deterministic wide-range data that does not entropy-code away.
        (0..n)
            .map(|i| (i as f32 * 0.731).sin() * 50.0 + i as f32 * 0.01)
            .collect()
    }

    #[test]
    fn test_deflate_roundtrip() {
        let compressor = DeflateCompressor;
        let data = b"Hello, world! ".repeat(100);
        let compressed = compressor
            .compress(&data, CompressionLevel::default())
            .unwrap();
        assert!(compressed.len() < data.len());
        let decompressed = compressor
            .decompress(&compressed, Some(data.len()))
            .unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_zstd_roundtrip() {
        let compressor = ZstdCompressor;
        let data = b"Hello, world! ".repeat(100);
        let compressed = compressor
            .compress(&data, CompressionLevel::default())
            .unwrap();
        assert!(compressed.len() < data.len());
        let decompressed = compressor.decompress(&compressed, None).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_rle_roundtrip() {
        let compressor = RleCompressor;
        let mut data = vec![1u8; 50];
        data.extend(vec![2u8; 50]);
        let compressed = compressor
            .compress(&data, CompressionLevel::default())
            .unwrap();
        assert!(compressed.len() < data.len());
        let decompressed = compressor.decompress(&compressed, None).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_zero_tolerance_has_no_quantizer() {
        let range = ValueRange::new(-100.0, 100.0);
        assert!(derive_quantizer(range, 0.0).is_none());
    }

    #[test]
    fn test_degenerate_range_has_no_quantizer() {
        assert!(derive_quantizer(ValueRange::new(5.0, 5.0), 0.01).is_none());
    }

    #[test]
    fn test_quantize_error_bound() {
        let samples = ramp(4096);
        let range = ValueRange::scan(&samples);
        let tolerance = 0.01f32;
        let params = derive_quantizer(range, tolerance).unwrap();

        let bytes = quantize(&samples, &params);
        let recovered = dequantize(&bytes, &params).unwrap();
        let bound = tolerance as f64 * range.dynamic_range() + 1e-9;
        for (a, b) in samples.iter().zip(recovered.iter()) {
            assert!(
                ((*a as f64) - (*b as f64)).abs() <= bound,
                "error {} exceeds bound {}",
                (a - b).abs(),
                bound
            );
        }
    }

    #[test]
    fn test_compressed_size_monotone_in_tolerance() {
        let samples = ramp(8192);
        let range = ValueRange::scan(&samples);
        let tolerances = [0.0f32, 0.0005, 0.01, 0.1];
        let mut sizes = Vec::new();
        for &tolerance in &tolerances {
            let spec = CompressionSpec::lossy(Codec::Zstd, tolerance);
            let quant = derive_quantizer(range, tolerance);
            let encoded = encode_brick(&samples, &spec, quant.as_ref()).unwrap();
            sizes.push(encoded.len());
        }
        for pair in sizes.windows(2) {
            assert!(
                pair[0] >= pair[1],
                "sizes not monotone: {:?} for tolerances {:?}",
                sizes,
                tolerances
            );
        }
    }

    #[test]
    fn test_brick_codec_names() {
        let spec = CompressionSpec::lossy(Codec::Zstd, 0.01);
        let range = ValueRange::new(0.0, 100.0);
        let quant = derive_quantizer(range, 0.01);
        assert_eq!(brick_codec_name(&spec, quant.as_ref()), "quant-u8+zstd");
        assert_eq!(
            brick_codec_name(&CompressionSpec::default(), None),
            "f32le+zstd"
        );
    }

    #[test]
    fn test_quantizer_width_tracks_tolerance() {
        let range = ValueRange::new(0.0, 100.0);
        let fine = derive_quantizer(range, 0.0005).unwrap();
        let coarse = derive_quantizer(range, 0.01).unwrap();
        assert!(fine.bits > coarse.bits);
        assert_eq!(fine.bytes_per_sample(), 2);
        assert_eq!(coarse.bytes_per_sample(), 1);
    }
}
