//! Core data types shared across the pipeline

use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SEG-Y data sample format codes (binary header offset 24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum SampleFormat {
    /// 4-byte IBM floating point
    IbmFloat = 1,
    /// 4-byte two's complement integer
    Int32 = 2,
    /// 2-byte two's complement integer
    Int16 = 3,
    /// 4-byte IEEE floating point
    IeeeFloat = 5,
    /// 1-byte two's complement integer
    Int8 = 8,
}

impl SampleFormat {
    /// Map a binary-header format code; unknown codes get no mapping.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(SampleFormat::IbmFloat),
            2 => Some(SampleFormat::Int32),
            3 => Some(SampleFormat::Int16),
            5 => Some(SampleFormat::IeeeFloat),
            8 => Some(SampleFormat::Int8),
            _ => None,
        }
    }

    /// Size in bytes of one stored sample
    pub fn size_in_bytes(&self) -> usize {
        match self {
            SampleFormat::IbmFloat | SampleFormat::Int32 | SampleFormat::IeeeFloat => 4,
            SampleFormat::Int16 => 2,
            SampleFormat::Int8 => 1,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Value range for a volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    /// Spread between max and min; zero for constant data.
    pub fn dynamic_range(&self) -> f64 {
        self.max - self.min
    }

    /// Scan a sample sequence for its finite min/max.
    ///
    /// Non-finite samples are skipped; an empty or all-NaN sequence yields
    /// the degenerate [0, 0] range.
    pub fn scan<T: Float>(samples: &[T]) -> Self {
        let mut min = T::infinity();
        let mut max = T::neg_infinity();
        for &s in samples {
            if !s.is_finite() {
                continue;
            }
            if s < min {
                min = s;
            }
            if s > max {
                max = s;
            }
        }
        if min > max {
            return Self::new(0.0, 0.0);
        }
        Self::new(
            min.to_f64().unwrap_or(0.0),
            max.to_f64().unwrap_or(0.0),
        )
    }
}

/// Decoded trace samples with their logical 3-D shape.
///
/// Sample order is line-major, then trace, then sample; 2-D surveys have a
/// single line.
#[derive(Debug, Clone)]
pub struct TraceVolume {
    /// Number of lines (inlines); 1 for 2-D surveys
    pub lines: usize,
    /// Traces per line (crosslines)
    pub traces_per_line: usize,
    /// Samples per trace
    pub samples_per_trace: usize,
    /// Flattened f32 samples
    pub samples: Vec<f32>,
}

impl TraceVolume {
    pub fn new(
        lines: usize,
        traces_per_line: usize,
        samples_per_trace: usize,
        samples: Vec<f32>,
    ) -> Self {
        Self {
            lines,
            traces_per_line,
            samples_per_trace,
            samples,
        }
    }

    /// Total sample count across the volume
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Finite min/max of the sample data
    pub fn value_range(&self) -> ValueRange {
        ValueRange::scan(&self.samples)
    }
}
