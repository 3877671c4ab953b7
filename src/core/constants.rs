// Constants shared by the TimeSeries model and the .ktks container

pub const DEFAULT_TIME_UNIT: &str = "s";
pub const UNIT_KEY: &str = "Unit";
pub const DEFAULT_EVENT_NAME: &str = "event";
pub const NORMALIZED_TIME_UNIT: &str = "%";
// Marks where a cycle ends, after detection and time-normalization
pub const CYCLE_END_EVENT: &str = "_";

// Fewer visible samples than this and a channel cannot be interpolated
pub const MIN_VISIBLE_SAMPLES: usize = 3;

// Container magic and version
pub const MAGIC: &[u8; 4] = b"KTKS";
pub const FORMAT_VERSION: u8 = 1;

// Compression codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Zlib = 1,
    Lz4 = 2,
    Zstd = 3,
}

impl CompressionType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Zlib),
            2 => Some(CompressionType::Lz4),
            3 => Some(CompressionType::Zstd),
            _ => None,
        }
    }
}

// Header: MAGIC(4) version(u8) comp(u8) created(f64) raw_len(u64) comp_len(u64)
pub const HEADER_SIZE: usize = 4 + 1 + 1 + 8 + 8 + 8; // 30 bytes
