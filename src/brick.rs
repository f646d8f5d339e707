//! Spatial brick organizer
//!
//! Reorders a logical 3-D volume into fixed-size bricks emitted along a
//! space-filling traversal so neighboring bricks stay close in the output.

use crate::error::{ConvertError, Result};
use crate::utils::round_up_to_multiple;
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

/// Brick traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalOrder {
    /// Z-order curve over brick coordinates
    Morton,
    /// Plain nested x/y/z iteration
    RowMajor,
}

/// Brick geometry of one organized level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickLayout {
    /// Brick edge lengths
    pub brick_size: [usize; 3],
    /// Total bricks in the level
    pub brick_count: usize,
    /// Traversal order the bricks were emitted in
    pub curve: TraversalOrder,
    /// Zero-padding applied at the volume boundary, per axis
    pub margin: [usize; 3],
}

/// One level's bricks in traversal order, with their layout.
#[derive(Debug, Clone)]
pub struct OrganizedLevel {
    pub layout: BrickLayout,
    /// Each brick holds exactly `bx*by*bz` samples
    pub bricks: Vec<Vec<f32>>,
}

/// Interleave the low 21 bits of `x` into every third output bit.
fn part1by2(mut x: u64) -> u64 {
    x &= 0x1f_ffff;
    x = (x | x << 32) & 0x1f00_0000_00ff_ff;
    x = (x | x << 16) & 0x1f_0000_ff00_00ff;
    x = (x | x << 8) & 0x100f_00f0_0f00_f00f;
    x = (x | x << 4) & 0x10c3_0c30_c30c_30c3;
    x = (x | x << 2) & 0x1249_2492_4924_9249;
    x
}

/// Morton (Z-order) key for a 3-D coordinate, 21 bits per axis.
pub fn morton3(x: u32, y: u32, z: u32) -> u64 {
    part1by2(x as u64) | part1by2(y as u64) << 1 | part1by2(z as u64) << 2
}

/// Partition a flat sample sequence with logical shape
/// `(lines, traces, samples)` into bricks.
///
/// Volumes not evenly divisible by the brick size are zero-padded at the
/// margin, and the margin is recorded in the layout so a validator can
/// check it against the encoded geometry.
pub fn organize(
    flat: &[f32],
    shape: (usize, usize, usize),
    brick_size: [usize; 3],
    curve: TraversalOrder,
) -> Result<OrganizedLevel> {
    let (nx, ny, nz) = shape;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(ConvertError::InvalidDimensions(
            "volume has a zero-length axis".to_string(),
        ));
    }
    if brick_size.iter().any(|&b| b == 0) {
        return Err(ConvertError::InvalidDimensions(
            "brick size has a zero edge".to_string(),
        ));
    }
    if flat.len() > nx * ny * nz {
        return Err(ConvertError::InvalidDimensions(format!(
            "{} samples exceed the {}x{}x{} volume",
            flat.len(),
            nx,
            ny,
            nz
        )));
    }

    let [bx, by, bz] = brick_size;
    let px = round_up_to_multiple(nx, bx);
    let py = round_up_to_multiple(ny, by);
    let pz = round_up_to_multiple(nz, bz);
    let margin = [px - nx, py - ny, pz - nz];

    // Zero-filled padded volume; the flat sequence fills the logical region
    // in line-major order, short sequences leave trailing zeros.
    let mut volume = Array3::<f32>::zeros((px, py, pz));
    for (idx, &v) in flat.iter().enumerate() {
        let i = idx / (ny * nz);
        let j = (idx / nz) % ny;
        let k = idx % nz;
        volume[[i, j, k]] = v;
    }

    let (cx, cy, cz) = (px / bx, py / by, pz / bz);
    let mut coords = Vec::with_capacity(cx * cy * cz);
    for i in 0..cx {
        for j in 0..cy {
            for k in 0..cz {
                coords.push((i, j, k));
            }
        }
    }
    if curve == TraversalOrder::Morton {
        coords.sort_by_key(|&(i, j, k)| morton3(i as u32, j as u32, k as u32));
    }

    let bricks = coords
        .iter()
        .map(|&(i, j, k)| {
            let view = volume.slice(s![
                i * bx..(i + 1) * bx,
                j * by..(j + 1) * by,
                k * bz..(k + 1) * bz
            ]);
            view.iter().copied().collect::<Vec<f32>>()
        })
        .collect::<Vec<_>>();

    Ok(OrganizedLevel {
        layout: BrickLayout {
            brick_size,
            brick_count: bricks.len(),
            curve,
            margin,
        },
        bricks,
    })
}
