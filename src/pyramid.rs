//! Level-of-detail pyramid builder

use serde::{Deserialize, Serialize};

/// One entry of the encoded LOD table.
///
/// Offsets are relative to the payload start and strictly increase with
/// level; `byte_size` is never zero for a level that exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidLevel {
    pub level: usize,
    pub offset: u64,
    pub byte_size: u64,
    /// CRC32 of the level's encoded bytes
    pub crc32: u32,
}

/// Downsampled copies of the sample sequence, level 0 first.
#[derive(Debug, Clone)]
pub struct Pyramid {
    pub levels: Vec<Vec<f32>>,
    /// True when fewer levels than requested could be built
    pub truncated: bool,
}

impl Pyramid {
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

/// Build the LOD series by pairwise averaging.
///
/// Level 0 is the input; each next level has `floor(len/2)` samples, each
/// the mean of a consecutive pair. An odd trailing sample folds into the
/// final averaged output rather than being dropped, which keeps the
/// level-size law exact. Construction stops at `levels` or once a level
/// would shrink to a single sample, whichever comes first; early stop is
/// reported as `truncated` so the caller can surface a warning.
pub fn build(samples: &[f32], levels: usize) -> Pyramid {
    let mut out: Vec<Vec<f32>> = Vec::with_capacity(levels.max(1));
    out.push(samples.to_vec());

    while out.len() < levels {
        let prev = out.last().expect("pyramid has at least level 0");
        let next_len = prev.len() / 2;
        if next_len <= 1 {
            break;
        }

        let mut next = Vec::with_capacity(next_len);
        for pair in prev[..next_len * 2].chunks_exact(2) {
            next.push((pair[0] + pair[1]) / 2.0);
        }
        if prev.len() % 2 == 1 {
            let tail = prev[prev.len() - 1];
            let last = next.last_mut().expect("next_len > 1");
            *last = (*last * 2.0 + tail) / 3.0;
        }
        out.push(next);
    }

    let truncated = out.len() < levels;
    Pyramid {
        levels: out,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_size_law() {
        let samples: Vec<f32> = (0..2048).map(|i| i as f32).collect();
        let pyramid = build(&samples, 8);
        let sizes: Vec<usize> = pyramid.levels.iter().map(|l| l.len()).collect();
        assert_eq!(sizes, vec![2048, 1024, 512, 256, 128, 64, 32, 16]);
        assert!(!pyramid.truncated);
    }

    #[test]
    fn test_level_size_law_odd_lengths() {
        let samples: Vec<f32> = (0..1001).map(|i| i as f32).collect();
        let pyramid = build(&samples, 5);
        for pair in pyramid.levels.windows(2) {
            assert_eq!(pair[1].len(), pair[0].len() / 2);
        }
    }

    #[test]
    fn test_pairwise_average() {
        let pyramid = build(&[1.0, 3.0, 5.0, 7.0], 2);
        assert_eq!(pyramid.levels[1], vec![2.0, 6.0]);
    }

    #[test]
    fn test_odd_tail_folds_into_last_output() {
        let pyramid = build(&[1.0, 3.0, 5.0, 7.0, 10.0], 2);
        // (5+7)/2 = 6, folded with the unpaired 10: (6*2 + 10)/3
        assert_eq!(pyramid.levels[1], vec![2.0, (12.0 + 10.0) / 3.0]);
    }

    #[test]
    fn test_truncation_reported() {
        let pyramid = build(&[1.0; 16], 10);
        // 16, 8, 4, 2 — the next level would hit a single sample.
        assert_eq!(pyramid.level_count(), 4);
        assert!(pyramid.truncated);
    }

    #[test]
    fn test_single_sample_input() {
        let pyramid = build(&[42.0], 4);
        assert_eq!(pyramid.level_count(), 1);
        assert!(pyramid.truncated);
    }

    #[test]
    fn test_deterministic() {
        let samples: Vec<f32> = (0..513).map(|i| (i as f32 * 0.37).sin()).collect();
        assert_eq!(build(&samples, 6).levels, build(&samples, 6).levels);
    }
}
