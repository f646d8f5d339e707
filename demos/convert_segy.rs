//! Convert a synthetic SEG-Y line to OVDS and print the validator's verdict.
//!
//! Run with: cargo run --example convert_segy

use anyhow::Context;
use seisconv::storage::{persist_output, Destination, FileSystemStorage};
use seisconv::{
    CancellationToken, Codec, CompressionSpec, ConversionConfig, Converter, SourceFormat,
    TargetFormat,
};
use std::path::PathBuf;

/// Build a small synthetic SEG-Y line: 32 traces of 512 samples at 2 ms.
fn synthetic_segy() -> Vec<u8> {
    let (samples, traces, interval_us) = (512u16, 32usize, 2000u16);
    let mut buf = vec![0u8; 3600];
    let banner = b"C 01 SYNTHETIC LINE FOR DEMO";
    buf[..banner.len()].copy_from_slice(banner);
    buf[3216..3218].copy_from_slice(&interval_us.to_be_bytes());
    buf[3220..3222].copy_from_slice(&samples.to_be_bytes());
    buf[3224..3226].copy_from_slice(&5u16.to_be_bytes());
    for t in 0..traces {
        buf.extend_from_slice(&[0u8; 240]);
        for s in 0..samples as usize {
            let v = ((t * 17 + s) as f32 * 0.09).sin() * 120.0;
            buf.extend_from_slice(&v.to_be_bytes());
        }
    }
    buf
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let input = synthetic_segy();
    let config = ConversionConfig::new(SourceFormat::SegY, TargetFormat::Ovds, "demo-line.sgy")
        .with_compression(CompressionSpec::lossy(Codec::Zstd, 0.01))
        .with_lod_levels(4);

    let result = Converter::new().convert(
        &input,
        &config,
        Some(Box::new(|pct| println!("  progress: {pct}%"))),
        &CancellationToken::new(),
    );

    if !result.success {
        anyhow::bail!(
            "conversion failed at {}: {}",
            result.failed_stage.unwrap_or("unknown"),
            result.error.unwrap_or_default()
        );
    }

    let report = result.report.as_ref().context("report missing")?;
    println!("\nconversion {}:", result.request_id);
    println!("  output size:        {} bytes", report.metrics.file_size);
    println!("  compression ratio:  {:.2}x", report.metrics.compression_ratio);
    println!("  random access:      {:.2}", report.metrics.random_access_score);
    println!("  structurally valid: {}", report.is_structurally_valid);
    println!("  cloud compatible:   {}", report.cloud_compatible);
    for (step, ok) in &report.step_results {
        println!("    {:32} {}", step, if *ok { "pass" } else { "FAIL" });
    }
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }

    let storage = FileSystemStorage::new(std::env::temp_dir());
    let destination = Destination::Local(PathBuf::from("seisconv-demo/demo-line.ovds"));
    let receipt = persist_output(&storage, &destination, &result, config.chunk_size).await;
    match receipt.local_path {
        Some(path) => println!("\npersisted to {}", path.display()),
        None => println!("\npersist failed: {:?}", receipt.error),
    }

    Ok(())
}
