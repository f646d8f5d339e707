//! Source header codecs
//!
//! Fixed-layout binary headers are decoded with byte-exact offsets; text
//! sources get a section sniff. Dispatch is an exhaustive match on
//! `SourceFormat`.

use crate::error::{ConvertError, Result};
use crate::formats::SourceFormat;
use crate::types::SampleFormat;
use log::{debug, warn};

/// SEG-Y text header length in bytes
pub const SEGY_TEXT_LEN: usize = 3200;
/// SEG-Y binary header length in bytes
pub const SEGY_BINARY_LEN: usize = 400;
/// Total SEG-Y file header length in bytes
pub const SEGY_HEADER_LEN: usize = SEGY_TEXT_LEN + SEGY_BINARY_LEN;
/// Per-trace header length in bytes (SEG-Y and Seismic Unix)
pub const TRACE_HEADER_LEN: usize = 240;

// Offsets into the 400-byte binary header, all big-endian u16.
const OFFSET_TRACES_PER_ENSEMBLE: usize = 12;
const OFFSET_SAMPLE_INTERVAL: usize = 16;
const OFFSET_SAMPLES_PER_TRACE: usize = 20;
const OFFSET_FORMAT_CODE: usize = 24;

// Offsets into a Seismic Unix trace header.
const SU_OFFSET_SAMPLES: usize = 114;
const SU_OFFSET_INTERVAL: usize = 116;

/// LAS null-value sentinel
const LAS_NULL: f64 = -999.25;

fn read_u16_be(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Decoded SEG-Y file header.
///
/// Raw text and binary blocks are retained so that `encode` reproduces the
/// original 3600 bytes exactly, including fields this codec does not own.
#[derive(Debug, Clone)]
pub struct SegyHeader {
    /// Raw 3200-byte text header, passed through unchanged
    pub text: Vec<u8>,
    /// Raw 400-byte binary header
    pub binary: Vec<u8>,
    /// Sample interval in microseconds (binary header offset 16)
    pub sample_interval_us: u16,
    /// Samples per trace (binary header offset 20)
    pub samples_per_trace: u16,
    /// Data sample format code (binary header offset 24)
    pub format_code: u16,
    /// Traces per ensemble (binary header offset 12)
    pub traces_per_ensemble: u16,
    /// Decoded sample format; None for unrecognized codes
    pub sample_format: Option<SampleFormat>,
    /// Trace count derived from the total byte length
    pub trace_count: usize,
    /// True when the text header was all zero
    pub text_is_blank: bool,
}

impl SegyHeader {
    /// Decode the 3600-byte file header; fails on short buffers or zero
    /// sample fields.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SEGY_HEADER_LEN {
            return Err(ConvertError::MalformedHeader(format!(
                "buffer is {} bytes, SEG-Y header needs {}",
                bytes.len(),
                SEGY_HEADER_LEN
            )));
        }

        let text = bytes[..SEGY_TEXT_LEN].to_vec();
        let binary = bytes[SEGY_TEXT_LEN..SEGY_HEADER_LEN].to_vec();

        let sample_interval_us = read_u16_be(&binary, OFFSET_SAMPLE_INTERVAL);
        let samples_per_trace = read_u16_be(&binary, OFFSET_SAMPLES_PER_TRACE);
        let format_code = read_u16_be(&binary, OFFSET_FORMAT_CODE);
        let traces_per_ensemble = read_u16_be(&binary, OFFSET_TRACES_PER_ENSEMBLE);

        if sample_interval_us == 0 {
            return Err(ConvertError::MalformedHeader(
                "sample interval is zero".to_string(),
            ));
        }
        if samples_per_trace == 0 {
            return Err(ConvertError::MalformedHeader(
                "samples per trace is zero".to_string(),
            ));
        }

        let sample_format = SampleFormat::from_code(format_code);
        let bytes_per_sample = sample_format.map(|f| f.size_in_bytes()).unwrap_or(4);
        let trace_block = TRACE_HEADER_LEN + samples_per_trace as usize * bytes_per_sample;
        let trace_count = (bytes.len() - SEGY_HEADER_LEN) / trace_block;

        let text_is_blank = text.iter().all(|&b| b == 0);

        debug!(
            "SEG-Y header: {} samples/trace @ {} us, format code {}, {} traces",
            samples_per_trace, sample_interval_us, format_code, trace_count
        );

        Ok(Self {
            text,
            binary,
            sample_interval_us,
            samples_per_trace,
            format_code,
            traces_per_ensemble,
            sample_format,
            trace_count,
            text_is_blank,
        })
    }

    /// Re-encode the 3600-byte file header.
    ///
    /// Owned fields are written back big-endian; all other bytes pass
    /// through, so decode-then-encode is byte-identical.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SEGY_HEADER_LEN);
        out.extend_from_slice(&self.text);

        let mut binary = self.binary.clone();
        binary[OFFSET_TRACES_PER_ENSEMBLE..OFFSET_TRACES_PER_ENSEMBLE + 2]
            .copy_from_slice(&self.traces_per_ensemble.to_be_bytes());
        binary[OFFSET_SAMPLE_INTERVAL..OFFSET_SAMPLE_INTERVAL + 2]
            .copy_from_slice(&self.sample_interval_us.to_be_bytes());
        binary[OFFSET_SAMPLES_PER_TRACE..OFFSET_SAMPLES_PER_TRACE + 2]
            .copy_from_slice(&self.samples_per_trace.to_be_bytes());
        binary[OFFSET_FORMAT_CODE..OFFSET_FORMAT_CODE + 2]
            .copy_from_slice(&self.format_code.to_be_bytes());
        out.extend_from_slice(&binary);
        out
    }

    /// Sampling rate in Hz derived from the microsecond interval
    pub fn sampling_rate_hz(&self) -> f64 {
        1_000_000.0 / self.sample_interval_us as f64
    }
}

/// Minimal LAS well-log header facts.
#[derive(Debug, Clone)]
pub struct LasHeader {
    /// VERS value from the ~V section, if present
    pub version: Option<String>,
    /// NULL sentinel from the ~W section; defaults to -999.25
    pub null_value: f64,
    /// STEP value from the ~W section (depth/time increment)
    pub step: Option<f64>,
}

impl LasHeader {
    /// Sniff the section structure and pull the few facts this engine uses.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ConvertError::MalformedHeader("LAS input is not UTF-8".to_string()))?;

        let first = text
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default();
        if !first.trim_start().starts_with('~') {
            return Err(ConvertError::MalformedHeader(
                "LAS input does not start with a section marker".to_string(),
            ));
        }

        let mut version = None;
        let mut null_value = LAS_NULL;
        let mut step = None;
        let mut section = ' ';

        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix('~') {
                section = rest.chars().next().unwrap_or(' ').to_ascii_uppercase();
                continue;
            }
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            match section {
                'V' => {
                    if let Some(value) = las_field(trimmed, "VERS") {
                        version = Some(value);
                    }
                }
                'W' => {
                    if let Some(value) = las_field(trimmed, "NULL") {
                        if let Ok(v) = value.parse() {
                            null_value = v;
                        }
                    }
                    if let Some(value) = las_field(trimmed, "STEP") {
                        step = value.parse().ok();
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            version,
            null_value,
            step,
        })
    }
}

/// Parse one `MNEM.UNIT  VALUE : DESC` LAS line for a given mnemonic.
fn las_field(line: &str, mnemonic: &str) -> Option<String> {
    let (name, rest) = line.split_once('.')?;
    if !name.trim().eq_ignore_ascii_case(mnemonic) {
        return None;
    }
    let body = rest.split(':').next()?;
    // Skip the unit token glued to the dot, keep the value field.
    let value = body.split_whitespace().last()?;
    Some(value.to_string())
}

/// Header for sources with no fixed-layout header of their own.
#[derive(Debug, Clone)]
pub struct GenericHeader {
    /// Total input length in bytes
    pub byte_len: usize,
}

/// Decoded source header, one variant per codec family.
#[derive(Debug, Clone)]
pub enum SourceHeader {
    Segy(SegyHeader),
    Las(LasHeader),
    Generic(GenericHeader),
}

impl SourceHeader {
    /// Samples per trace, where the header knows it
    pub fn samples_per_trace(&self) -> Option<usize> {
        match self {
            SourceHeader::Segy(h) => Some(h.samples_per_trace as usize),
            SourceHeader::Las(_) | SourceHeader::Generic(_) => None,
        }
    }

    /// Trace count, where the header knows it
    pub fn trace_count(&self) -> Option<usize> {
        match self {
            SourceHeader::Segy(h) => Some(h.trace_count),
            SourceHeader::Las(_) | SourceHeader::Generic(_) => None,
        }
    }

    /// Sampling rate in Hz, where the header knows it
    pub fn sampling_rate_hz(&self) -> Option<f64> {
        match self {
            SourceHeader::Segy(h) => Some(h.sampling_rate_hz()),
            SourceHeader::Las(h) => h.step.map(|s| if s > 0.0 { 1.0 / s } else { 0.0 }),
            SourceHeader::Generic(_) => None,
        }
    }
}

/// Decode the source header for a given format.
///
/// Returns the header plus non-fatal warnings (blank text header,
/// unrecognized sample format code).
pub fn decode_header(bytes: &[u8], format: SourceFormat) -> Result<(SourceHeader, Vec<String>)> {
    let mut warnings = Vec::new();
    let header = match format {
        SourceFormat::SegY | SourceFormat::SegYRev2 => {
            let header = SegyHeader::decode(bytes)?;
            if header.text_is_blank {
                warnings.push("SEG-Y text header is all zero".to_string());
            }
            if header.sample_format.is_none() {
                warnings.push(format!(
                    "unrecognized sample format code {}, assuming IEEE float",
                    header.format_code
                ));
            }
            SourceHeader::Segy(header)
        }
        SourceFormat::SeismicUnix => {
            // SU is SEG-Y trace blocks without the 3600-byte file header;
            // synthesize one from the first trace header.
            if bytes.len() < TRACE_HEADER_LEN {
                return Err(ConvertError::MalformedHeader(format!(
                    "buffer is {} bytes, SU trace header needs {}",
                    bytes.len(),
                    TRACE_HEADER_LEN
                )));
            }
            let samples = read_u16_be(bytes, SU_OFFSET_SAMPLES);
            let interval = read_u16_be(bytes, SU_OFFSET_INTERVAL);
            if samples == 0 || interval == 0 {
                return Err(ConvertError::MalformedHeader(
                    "SU trace header has zero sample fields".to_string(),
                ));
            }
            let mut binary = vec![0u8; SEGY_BINARY_LEN];
            binary[OFFSET_SAMPLE_INTERVAL..OFFSET_SAMPLE_INTERVAL + 2]
                .copy_from_slice(&interval.to_be_bytes());
            binary[OFFSET_SAMPLES_PER_TRACE..OFFSET_SAMPLES_PER_TRACE + 2]
                .copy_from_slice(&samples.to_be_bytes());
            let trace_block = TRACE_HEADER_LEN + samples as usize * 4;
            SourceHeader::Segy(SegyHeader {
                text: vec![0; SEGY_TEXT_LEN],
                binary,
                sample_interval_us: interval,
                samples_per_trace: samples,
                format_code: 5,
                traces_per_ensemble: 0,
                sample_format: Some(SampleFormat::IeeeFloat),
                trace_count: bytes.len() / trace_block,
                text_is_blank: true,
            })
        }
        SourceFormat::Las | SourceFormat::Las3 => SourceHeader::Las(LasHeader::decode(bytes)?),
        SourceFormat::Csv | SourceFormat::Tsv | SourceFormat::Ascii | SourceFormat::Binary => {
            SourceHeader::Generic(GenericHeader {
                byte_len: bytes.len(),
            })
        }
        SourceFormat::SegD
        | SourceFormat::SegDRev3
        | SourceFormat::Seg2
        | SourceFormat::SegB
        | SourceFormat::Dlis
        | SourceFormat::NetCdf
        | SourceFormat::NetCdf4
        | SourceFormat::Hdf5
        | SourceFormat::OpenVds
        | SourceFormat::PetrelZgy
        | SourceFormat::UkooaP190
        | SourceFormat::UkooaP194 => {
            return Err(ConvertError::UnsupportedFormat(format.to_string()));
        }
    };
    Ok((header, warnings))
}

/// Decode trace samples to f32 for a given source.
pub fn decode_samples(bytes: &[u8], format: SourceFormat, header: &SourceHeader) -> Result<Vec<f32>> {
    match (format, header) {
        (SourceFormat::SegY | SourceFormat::SegYRev2, SourceHeader::Segy(h)) => {
            segy_trace_samples(bytes.get(SEGY_HEADER_LEN..).unwrap_or(&[]), h)
        }
        (SourceFormat::SeismicUnix, SourceHeader::Segy(h)) => segy_trace_samples(bytes, h),
        (SourceFormat::Las | SourceFormat::Las3, SourceHeader::Las(h)) => las_samples(bytes, h),
        (SourceFormat::Csv, _) => delimited_samples(bytes, Some(',')),
        (SourceFormat::Tsv, _) => delimited_samples(bytes, Some('\t')),
        (SourceFormat::Ascii, _) => delimited_samples(bytes, None),
        (SourceFormat::Binary, _) => {
            // Trailing partial sample is dropped, not an error.
            let whole = bytes.len() - bytes.len() % 4;
            crate::utils::bytes_to_f32_samples(&bytes[..whole])
        }
        _ => Err(ConvertError::UnsupportedFormat(format.to_string())),
    }
}

/// Walk the trace blocks and decode every sample to f32.
fn segy_trace_samples(trace_bytes: &[u8], header: &SegyHeader) -> Result<Vec<f32>> {
    let format = header.sample_format.unwrap_or(SampleFormat::IeeeFloat);
    let bps = format.size_in_bytes();
    let samples_per_trace = header.samples_per_trace as usize;
    let trace_block = TRACE_HEADER_LEN + samples_per_trace * bps;

    let mut samples = Vec::with_capacity(header.trace_count * samples_per_trace);
    for trace in trace_bytes.chunks_exact(trace_block) {
        let data = &trace[TRACE_HEADER_LEN..];
        match format {
            SampleFormat::IbmFloat => {
                for raw in data.chunks_exact(4) {
                    let bits = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
                    samples.push(ibm_to_f32(bits));
                }
            }
            SampleFormat::IeeeFloat => {
                for raw in data.chunks_exact(4) {
                    samples.push(f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]));
                }
            }
            SampleFormat::Int32 => {
                for raw in data.chunks_exact(4) {
                    samples.push(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32);
                }
            }
            SampleFormat::Int16 => {
                for raw in data.chunks_exact(2) {
                    samples.push(i16::from_be_bytes([raw[0], raw[1]]) as f32);
                }
            }
            SampleFormat::Int8 => {
                for &raw in data {
                    samples.push(raw as i8 as f32);
                }
            }
        }
    }

    if samples.is_empty() {
        warn!("SEG-Y input has a header but no complete trace blocks");
    }
    Ok(samples)
}

/// Convert an IBM System/360 single-precision float to IEEE f32.
///
/// Layout: sign bit, 7-bit base-16 exponent biased by 64, 24-bit fraction.
fn ibm_to_f32(bits: u32) -> f32 {
    if bits & 0x7fff_ffff == 0 {
        return 0.0;
    }
    let sign = if bits >> 31 == 1 { -1.0f64 } else { 1.0 };
    let exponent = ((bits >> 24) & 0x7f) as i32 - 64;
    let fraction = (bits & 0x00ff_ffff) as f64 / (1u32 << 24) as f64;
    (sign * fraction * 16f64.powi(exponent)) as f32
}

/// Pull the numeric rows out of the ~A section.
fn las_samples(bytes: &[u8], header: &LasHeader) -> Result<Vec<f32>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ConvertError::MalformedHeader("LAS input is not UTF-8".to_string()))?;

    let mut in_data = false;
    let mut samples = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix('~') {
            in_data = rest.chars().next().is_some_and(|c| c.eq_ignore_ascii_case(&'A'));
            continue;
        }
        if !in_data || trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        for token in trimmed.split_whitespace() {
            if let Ok(v) = token.parse::<f64>() {
                if (v - header.null_value).abs() > f64::EPSILON {
                    samples.push(v as f32);
                }
            }
        }
    }
    Ok(samples)
}

/// Parse delimiter- or whitespace-separated numeric text.
fn delimited_samples(bytes: &[u8], delimiter: Option<char>) -> Result<Vec<f32>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ConvertError::MalformedHeader("text input is not UTF-8".to_string()))?;

    let mut samples = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match delimiter {
            Some(d) => {
                for token in trimmed.split(d) {
                    if let Ok(v) = token.trim().parse::<f32>() {
                        samples.push(v);
                    }
                }
            }
            None => {
                for token in trimmed.split_whitespace() {
                    if let Ok(v) = token.parse::<f32>() {
                        samples.push(v);
                    }
                }
            }
        }
    }
    Ok(samples)
}

/// Test-only builders shared by the other modules' test suites.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Build a minimal SEG-Y buffer: header plus `traces` IEEE-float traces.
    pub(crate) fn segy_fixture(
        samples_per_trace: u16,
        interval_us: u16,
        traces: usize,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; SEGY_HEADER_LEN];
        buf[..5].copy_from_slice(b"C 01 ");
        let base = SEGY_TEXT_LEN;
        buf[base + OFFSET_SAMPLE_INTERVAL..base + OFFSET_SAMPLE_INTERVAL + 2]
            .copy_from_slice(&interval_us.to_be_bytes());
        buf[base + OFFSET_SAMPLES_PER_TRACE..base + OFFSET_SAMPLES_PER_TRACE + 2]
            .copy_from_slice(&samples_per_trace.to_be_bytes());
        buf[base + OFFSET_FORMAT_CODE..base + OFFSET_FORMAT_CODE + 2]
            .copy_from_slice(&5u16.to_be_bytes());

        for t in 0..traces {
            buf.extend_from_slice(&[0u8; TRACE_HEADER_LEN]);
            for s in 0..samples_per_trace as usize {
                let v = (t as f32 + 1.0) * (s as f32).sin();
                buf.extend_from_slice(&v.to_be_bytes());
            }
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::testing::segy_fixture;
    use super::*;

    #[test]
    fn test_decode_reads_owned_fields() {
        let buf = segy_fixture(1501, 2000, 2);
        let header = SegyHeader::decode(&buf).unwrap();
        assert_eq!(header.samples_per_trace, 1501);
        assert_eq!(header.sample_interval_us, 2000);
        assert_eq!(header.sampling_rate_hz(), 500.0);
        assert_eq!(header.trace_count, 2);
        assert!(!header.text_is_blank);
    }

    #[test]
    fn test_short_buffer_fails() {
        let err = SegyHeader::decode(&vec![0u8; 1000]).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedHeader(_)));
    }

    #[test]
    fn test_zero_fields_fail() {
        let mut buf = segy_fixture(100, 2000, 0);
        let base = SEGY_TEXT_LEN;
        buf[base + OFFSET_SAMPLES_PER_TRACE..base + OFFSET_SAMPLES_PER_TRACE + 2]
            .copy_from_slice(&0u16.to_be_bytes());
        assert!(SegyHeader::decode(&buf).is_err());
    }

    #[test]
    fn test_header_roundtrip_byte_identical() {
        let mut buf = segy_fixture(250, 4000, 0);
        // Scatter unowned bytes to prove passthrough.
        buf[100] = 0xAB;
        buf[SEGY_TEXT_LEN + 300] = 0xCD;
        let header = SegyHeader::decode(&buf).unwrap();
        assert_eq!(header.encode(), buf[..SEGY_HEADER_LEN].to_vec());
    }

    #[test]
    fn test_trace_sample_decode() {
        let buf = segy_fixture(16, 1000, 3);
        let (header, warnings) = decode_header(&buf, SourceFormat::SegY).unwrap();
        assert!(warnings.is_empty());
        let samples = decode_samples(&buf, SourceFormat::SegY, &header).unwrap();
        assert_eq!(samples.len(), 3 * 16);
        // First trace scales by 1.0.
        assert!((samples[1] - (1.0f32).sin()).abs() < 1e-6);
    }

    #[test]
    fn test_blank_text_header_warns() {
        let mut buf = segy_fixture(16, 1000, 0);
        for b in buf[..SEGY_TEXT_LEN].iter_mut() {
            *b = 0;
        }
        let (_, warnings) = decode_header(&buf, SourceFormat::SegY).unwrap();
        assert!(warnings.iter().any(|w| w.contains("text header")));
    }

    #[test]
    fn test_ibm_float() {
        // 0x42640000 = +100.0 in IBM single precision
        assert_eq!(ibm_to_f32(0x4264_0000), 100.0);
        assert_eq!(ibm_to_f32(0xC264_0000), -100.0);
        assert_eq!(ibm_to_f32(0), 0.0);
        // 0x41100000 = +1.0
        assert_eq!(ibm_to_f32(0x4110_0000), 1.0);
    }

    #[test]
    fn test_las_decode() {
        let las = "~Version\n VERS.   2.0 : CWLS version\n~Well\n NULL.  -999.25 : null\n STEP.M  0.5 : step\n~Curve\n DEPT.M : depth\n~ASCII\n 100.0 1.5\n 100.5 -999.25\n 101.0 2.5\n";
        let (header, _) = decode_header(las.as_bytes(), SourceFormat::Las).unwrap();
        let SourceHeader::Las(ref las_header) = header else {
            panic!("expected LAS header");
        };
        assert_eq!(las_header.version.as_deref(), Some("2.0"));
        assert_eq!(las_header.step, Some(0.5));

        let samples = decode_samples(las.as_bytes(), SourceFormat::Las, &header).unwrap();
        // Null sentinel row loses its value column.
        assert_eq!(samples, vec![100.0, 1.5, 100.5, 101.0, 2.5]);
    }

    #[test]
    fn test_csv_decode() {
        let csv = "# amplitude dump\n1.0,2.0,3.0\n4.0,5.0\n";
        let (header, _) = decode_header(csv.as_bytes(), SourceFormat::Csv).unwrap();
        let samples = decode_samples(csv.as_bytes(), SourceFormat::Csv, &header).unwrap();
        assert_eq!(samples, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_unsupported_format_errors() {
        let err = decode_header(&[0u8; 64], SourceFormat::Dlis).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
    }
}
