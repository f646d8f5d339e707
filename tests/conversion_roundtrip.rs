//! End-to-end conversion tests over synthetic SEG-Y input
//!
//! These drive the public API only: build a SEG-Y buffer, convert it,
//! then re-validate the produced container as a black-box consumer would.

use seisconv::{
    encode::HEADER_DELIMITER, pyramid, validate, CancellationToken, Codec, ConversionConfig,
    Converter, CompressionSpec, SourceFormat, TargetFormat,
};

const TEXT_LEN: usize = 3200;
const HEADER_LEN: usize = 3600;
const TRACE_HEADER_LEN: usize = 240;

/// Build a synthetic SEG-Y buffer with IEEE-float traces.
fn segy_buffer(samples_per_trace: u16, interval_us: u16, traces: usize) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_LEN];
    let banner = b"C 01 CLIENT synthetic survey";
    buf[..banner.len()].copy_from_slice(banner);
    buf[TEXT_LEN + 16..TEXT_LEN + 18].copy_from_slice(&interval_us.to_be_bytes());
    buf[TEXT_LEN + 20..TEXT_LEN + 22].copy_from_slice(&samples_per_trace.to_be_bytes());
    buf[TEXT_LEN + 24..TEXT_LEN + 26].copy_from_slice(&5u16.to_be_bytes());

    for t in 0..traces {
        buf.extend_from_slice(&[0u8; TRACE_HEADER_LEN]);
        for s in 0..samples_per_trace as usize {
            let v = ((t * 31 + s) as f32 * 0.173).sin() * 80.0;
            buf.extend_from_slice(&v.to_be_bytes());
        }
    }
    buf
}

fn ovds_config() -> ConversionConfig {
    ConversionConfig::new(SourceFormat::SegY, TargetFormat::Ovds, "synthetic.sgy")
        .with_compression(CompressionSpec::lossy(Codec::Zstd, 0.01))
        .with_lod_levels(3)
}

#[test]
fn test_segy_to_ovds_end_to_end() {
    let input = segy_buffer(256, 2000, 16);
    let result = Converter::new().convert(&input, &ovds_config(), None, &CancellationToken::new());

    assert!(result.success, "conversion failed: {:?}", result.error);
    let output = result.output.expect("successful conversion has output");
    let report = result.report.expect("successful conversion has a report");

    assert!(report.is_structurally_valid, "warnings: {:?}", report.warnings);
    assert!(report.cloud_compatible);
    assert!(report.metrics.file_size as usize == output.len());
    println!(
        "✓ Converted {} input bytes to {} output bytes",
        input.len(),
        output.len()
    );
}

#[test]
fn test_metadata_matches_binary_header_fields() {
    // Binary header offset 20 = 1501 samples, offset 16 = 2000 us.
    let input = segy_buffer(1501, 2000, 2);
    let result = Converter::new().convert(&input, &ovds_config(), None, &CancellationToken::new());

    let meta = result.metadata.expect("metadata is attached");
    assert_eq!(meta.dimensions.samples, 1501);
    assert_eq!(meta.sampling_rate_hz, 500.0);
    println!("✓ 2000 us sample interval maps to 500 Hz");
}

#[test]
fn test_pyramid_level_sizes_over_2048_samples() {
    let samples: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.11).cos()).collect();
    let pyramid = pyramid::build(&samples, 8);
    let sizes: Vec<usize> = pyramid.levels.iter().map(|l| l.len()).collect();
    assert_eq!(sizes, vec![2048, 1024, 512, 256, 128, 64, 32, 16]);
}

#[test]
fn test_validator_is_black_box_and_idempotent() {
    let input = segy_buffer(256, 2000, 16);
    let result = Converter::new().convert(&input, &ovds_config(), None, &CancellationToken::new());
    let output = result.output.unwrap();

    // Validation runs on bytes alone, with no encoder state in sight.
    let first = validate::validate(&output, Some(input.len() as u64));
    let second = validate::validate(&output, Some(input.len() as u64));
    assert!(first.is_structurally_valid);
    assert_eq!(first, second);
}

#[test]
fn test_corrupted_lod_offsets_detected() {
    let input = segy_buffer(256, 2000, 16);
    let result = Converter::new().convert(&input, &ovds_config(), None, &CancellationToken::new());
    let output = result.output.unwrap();

    // Rewrite the LOD table with decreasing offsets.
    let delimiter = output
        .iter()
        .position(|&b| b == HEADER_DELIMITER)
        .expect("output carries a header delimiter");
    let mut header: serde_json::Value = serde_json::from_slice(&output[..delimiter]).unwrap();
    let lods = header["lods"].as_array_mut().unwrap();
    assert!(lods.len() >= 2);
    for (i, entry) in lods.iter_mut().enumerate() {
        entry["offset"] = serde_json::json!(100 / (i as u64 + 1));
    }
    let mut corrupted = serde_json::to_vec(&header).unwrap();
    corrupted.push(HEADER_DELIMITER);
    corrupted.extend_from_slice(&output[delimiter + 1..]);

    let report = validate::validate(&corrupted, None);
    assert!(!report.is_structurally_valid);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("LOD offsets")));
    println!("✓ Decreasing LOD offsets flagged: {:?}", report.warnings);
}

#[test]
fn test_compression_tolerance_monotonicity() {
    let input = segy_buffer(512, 2000, 8);
    let mut sizes = Vec::new();
    for tolerance in [0.0f32, 0.001, 0.02] {
        let config = ovds_config().with_compression(CompressionSpec::lossy(Codec::Zstd, tolerance));
        let result = Converter::new().convert(&input, &config, None, &CancellationToken::new());
        assert!(result.success);
        sizes.push(result.output.unwrap().len());
    }
    for pair in sizes.windows(2) {
        assert!(
            pair[0] >= pair[1],
            "output sizes not monotone in tolerance: {:?}",
            sizes
        );
    }
    println!("✓ Output sizes by tolerance: {:?}", sizes);
}

#[test]
fn test_all_targets_produce_valid_containers() {
    let input = segy_buffer(256, 2000, 16);
    for target in [TargetFormat::Ovds, TargetFormat::Hdf5, TargetFormat::Zgy] {
        let config = ConversionConfig::new(SourceFormat::SegY, target, "synthetic.sgy")
            .with_compression(CompressionSpec::lossy(Codec::Deflate, 0.01))
            .with_lod_levels(2);
        let result = Converter::new().convert(&input, &config, None, &CancellationToken::new());
        assert!(result.success, "{} failed: {:?}", target, result.error);

        let report = result.report.unwrap();
        assert!(
            report.is_structurally_valid,
            "{} output invalid: {:?}",
            target, report.warnings
        );
        println!("✓ {} container validates", target);
    }
}

#[test]
fn test_short_buffer_aborts_cleanly() {
    let result =
        Converter::new().convert(&[0u8; 1024], &ovds_config(), None, &CancellationToken::new());
    assert!(!result.success);
    assert!(result.output.is_none());
    assert!(result.error.is_some());
}

#[test]
fn test_header_roundtrip_full_3600_bytes() {
    use seisconv::header::SegyHeader;

    let mut input = segy_buffer(128, 4000, 1);
    // Unowned header bytes must survive the round trip too.
    input[1234] = 0x5A;
    input[TEXT_LEN + 123] = 0xA5;
    let header = SegyHeader::decode(&input).unwrap();
    assert_eq!(header.encode(), &input[..HEADER_LEN]);
    println!("✓ SEG-Y header decode/encode is byte-identical");
}
