//! Source and target format registries
//!
//! Format dispatch is a closed enum with exhaustive matches rather than a
//! string-keyed map, so adding a format is a compile-time-checked change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source formats recognized by the format-detection collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    /// SEG-Y rev 0/1 (3200-byte text header + 400-byte binary header)
    SegY,
    /// SEG-Y rev 2
    SegYRev2,
    /// SEG-D field tape format
    SegD,
    /// SEG-D rev 3
    SegDRev3,
    /// SEG-2 shallow-seismic format
    Seg2,
    /// SEG-B legacy field format
    SegB,
    /// Seismic Unix trace format
    SeismicUnix,
    /// LAS 2.0 well log
    Las,
    /// LAS 3.0 well log
    Las3,
    /// DLIS well log
    Dlis,
    /// NetCDF classic
    NetCdf,
    /// NetCDF-4 / HDF5-backed
    NetCdf4,
    /// HDF5 container
    Hdf5,
    /// OpenVDS volume
    OpenVds,
    /// Petrel ZGY volume
    PetrelZgy,
    /// UKOOA P1/90 positioning data
    UkooaP190,
    /// UKOOA P1/94 positioning data
    UkooaP194,
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Whitespace-delimited ASCII
    Ascii,
    /// Generic binary (interpreted as little-endian f32 samples)
    Binary,
}

impl SourceFormat {
    /// All recognized source labels.
    pub const ALL: [SourceFormat; 21] = [
        SourceFormat::SegY,
        SourceFormat::SegYRev2,
        SourceFormat::SegD,
        SourceFormat::SegDRev3,
        SourceFormat::Seg2,
        SourceFormat::SegB,
        SourceFormat::SeismicUnix,
        SourceFormat::Las,
        SourceFormat::Las3,
        SourceFormat::Dlis,
        SourceFormat::NetCdf,
        SourceFormat::NetCdf4,
        SourceFormat::Hdf5,
        SourceFormat::OpenVds,
        SourceFormat::PetrelZgy,
        SourceFormat::UkooaP190,
        SourceFormat::UkooaP194,
        SourceFormat::Csv,
        SourceFormat::Tsv,
        SourceFormat::Ascii,
        SourceFormat::Binary,
    ];

    /// Whether the conversion engine can decode this source today.
    ///
    /// Recognized-but-unsupported formats fail the pre-conversion gate with
    /// `UnsupportedFormat` instead of producing garbage output.
    pub fn is_supported(&self) -> bool {
        match self {
            SourceFormat::SegY
            | SourceFormat::SegYRev2
            | SourceFormat::SeismicUnix
            | SourceFormat::Las
            | SourceFormat::Las3
            | SourceFormat::Csv
            | SourceFormat::Tsv
            | SourceFormat::Ascii
            | SourceFormat::Binary => true,
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
            | SourceFormat::UkooaP194 => false,
        }
    }

    /// Whether the source carries a fixed-layout binary header this engine
    /// decodes with byte-exact offsets (as opposed to text sniffing).
    pub fn has_binary_header(&self) -> bool {
        matches!(
            self,
            SourceFormat::SegY | SourceFormat::SegYRev2 | SourceFormat::SeismicUnix
        )
    }

    /// Guess a source format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "sgy" | "segy" => Some(SourceFormat::SegY),
            "segd" => Some(SourceFormat::SegD),
            "su" => Some(SourceFormat::SeismicUnix),
            "las" => Some(SourceFormat::Las),
            "dlis" => Some(SourceFormat::Dlis),
            "nc" => Some(SourceFormat::NetCdf),
            "nc4" => Some(SourceFormat::NetCdf4),
            "h5" | "hdf5" => Some(SourceFormat::Hdf5),
            "vds" => Some(SourceFormat::OpenVds),
            "zgy" => Some(SourceFormat::PetrelZgy),
            "p190" => Some(SourceFormat::UkooaP190),
            "p194" => Some(SourceFormat::UkooaP194),
            "csv" => Some(SourceFormat::Csv),
            "tsv" => Some(SourceFormat::Tsv),
            "txt" | "asc" => Some(SourceFormat::Ascii),
            "bin" | "dat" => Some(SourceFormat::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceFormat::SegY => "SEG-Y",
            SourceFormat::SegYRev2 => "SEG-Y Rev 2",
            SourceFormat::SegD => "SEG-D",
            SourceFormat::SegDRev3 => "SEG-D Rev 3",
            SourceFormat::Seg2 => "SEG-2",
            SourceFormat::SegB => "SEG-B",
            SourceFormat::SeismicUnix => "Seismic Unix",
            SourceFormat::Las => "LAS 2.0",
            SourceFormat::Las3 => "LAS 3.0",
            SourceFormat::Dlis => "DLIS",
            SourceFormat::NetCdf => "NetCDF",
            SourceFormat::NetCdf4 => "NetCDF-4",
            SourceFormat::Hdf5 => "HDF5",
            SourceFormat::OpenVds => "OpenVDS",
            SourceFormat::PetrelZgy => "Petrel ZGY",
            SourceFormat::UkooaP190 => "UKOOA P1/90",
            SourceFormat::UkooaP194 => "UKOOA P1/94",
            SourceFormat::Csv => "CSV",
            SourceFormat::Tsv => "TSV",
            SourceFormat::Ascii => "ASCII",
            SourceFormat::Binary => "Binary",
        };
        write!(f, "{}", label)
    }
}

/// Cloud-oriented target containers produced by the encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFormat {
    /// Open volumetric data store (Morton bricks + LOD pyramid)
    Ovds,
    /// HDF5-style chunked container
    Hdf5,
    /// Petrel ZGY-style bricked container
    Zgy,
}

impl TargetFormat {
    /// Format identifier written into the container header.
    pub fn id(&self) -> &'static str {
        match self {
            TargetFormat::Ovds => "OVDS",
            TargetFormat::Hdf5 => "HDF5",
            TargetFormat::Zgy => "ZGY",
        }
    }

    /// Parse a header format identifier back to a target format.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "OVDS" => Some(TargetFormat::Ovds),
            "HDF5" => Some(TargetFormat::Hdf5),
            "ZGY" => Some(TargetFormat::Zgy),
            _ => None,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_labels_distinct() {
        for (i, a) in SourceFormat::ALL.iter().enumerate() {
            for b in SourceFormat::ALL.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert_eq!(SourceFormat::ALL.len(), 21);
    }

    #[test]
    fn test_segy_supported() {
        assert!(SourceFormat::SegY.is_supported());
        assert!(SourceFormat::SegY.has_binary_header());
        assert!(!SourceFormat::Dlis.is_supported());
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(SourceFormat::from_extension("sgy"), Some(SourceFormat::SegY));
        assert_eq!(SourceFormat::from_extension("SGY"), Some(SourceFormat::SegY));
        assert_eq!(SourceFormat::from_extension("las"), Some(SourceFormat::Las));
        assert_eq!(SourceFormat::from_extension("xyz"), None);
    }

    #[test]
    fn test_target_id_roundtrip() {
        for target in [TargetFormat::Ovds, TargetFormat::Hdf5, TargetFormat::Zgy] {
            assert_eq!(TargetFormat::from_id(target.id()), Some(target));
        }
        assert_eq!(TargetFormat::from_id("SEGY"), None);
    }
}
