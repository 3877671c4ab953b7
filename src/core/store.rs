// .ktks container: fixed header followed by the compressed JSON record

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::compression::{compress, decompress};
use crate::core::constants::*;
use crate::core::error::{Result, TsError};
use crate::core::format::FileHeader;
use crate::core::timeseries::TimeSeries;

pub const FILE_EXTENSION: &str = "ktks";

/// Write `ts` to `path` as a .ktks container.
pub fn write_series<P: AsRef<Path>>(path: P, ts: &TimeSeries, compression: CompressionType) -> Result<()> {
    let raw = serde_json::to_vec(&ts.to_record())?;
    let packed = compress(&raw, compression)?;
    let created = Utc::now().timestamp_millis() as f64 / 1000.0;

    let mut buf = Vec::with_capacity(HEADER_SIZE + packed.len());
    buf.extend_from_slice(MAGIC);
    buf.push(FORMAT_VERSION);
    buf.push(compression as u8);
    buf.extend_from_slice(&created.to_le_bytes());
    buf.extend_from_slice(&(raw.len() as u64).to_le_bytes());
    buf.extend_from_slice(&(packed.len() as u64).to_le_bytes());
    buf.extend_from_slice(&packed);

    let mut file = File::create(path.as_ref())?;
    file.write_all(&buf)?;
    debug!(
        "Wrote {} ({} bytes raw, {} bytes packed)",
        path.as_ref().display(),
        raw.len(),
        packed.len()
    );
    Ok(())
}

/// Read a TimeSeries from a .ktks container.
pub fn read_series<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
    TimeSeriesFile::open(path)?.read_series()
}

/// Read a TimeSeries from either a .ktks container or a plain JSON record,
/// chosen by extension.
pub fn load_series<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(FILE_EXTENSION) => read_series(path),
        _ => TimeSeries::from_json(&fs::read_to_string(path)?),
    }
}

/// An opened .ktks file with a validated header.
pub struct TimeSeriesFile {
    path: PathBuf,
    header: FileHeader,
    payload: Vec<u8>,
}

impl TimeSeriesFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let header = Self::read_header(&mut file)?;

        let mut payload = Vec::new();
        file.read_to_end(&mut payload)?;
        if payload.len() as u64 != header.compressed_length {
            return Err(TsError::CorruptedData(format!(
                "Expected {} payload bytes, got {}",
                header.compressed_length,
                payload.len()
            )));
        }

        Ok(Self {
            path,
            header,
            payload,
        })
    }

    fn read_header(file: &mut File) -> Result<FileHeader> {
        let mut prefix = [0u8; HEADER_SIZE];
        file.read_exact(&mut prefix)?;

        let magic = &prefix[0..4];
        if magic != MAGIC {
            return Err(TsError::InvalidMagic {
                expected: MAGIC.to_vec(),
                got: magic.to_vec(),
            });
        }

        let version = prefix[4];
        if version != FORMAT_VERSION {
            return Err(TsError::UnsupportedVersion(version));
        }
        let compression =
            CompressionType::from_u8(prefix[5]).ok_or(TsError::UnsupportedCompression(prefix[5]))?;

        Ok(FileHeader {
            version,
            compression,
            created: f64::from_le_bytes(le_bytes(&prefix, 6)),
            raw_length: u64::from_le_bytes(le_bytes(&prefix, 14)),
            compressed_length: u64::from_le_bytes(le_bytes(&prefix, 22)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.header.created * 1000.0).round() as i64)
    }

    pub fn read_series(&self) -> Result<TimeSeries> {
        let raw = decompress(
            &self.payload,
            self.header.compression,
            self.header.raw_length as usize,
        )?;
        if raw.len() as u64 != self.header.raw_length {
            return Err(TsError::CorruptedData(format!(
                "Expected {} bytes, got {}",
                self.header.raw_length,
                raw.len()
            )));
        }
        TimeSeries::from_record(serde_json::from_slice(&raw)?)
    }
}

fn le_bytes(buf: &[u8], at: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[at..at + 8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use ndarray::{arr1, Array2};
    use tempfile::tempdir;

    fn sample() -> TimeSeries {
        let mut ts = TimeSeries::with_time(vec![0.0, 0.5, 1.0]);
        ts.add_data("Forces", Array2::from_elem((3, 3), 1.5)).unwrap();
        ts.add_data("emg", arr1(&[f64::NAN, 1.0, 2.0])).unwrap();
        ts.add_data_info("Forces", "Unit", "N");
        ts.add_event(0.25, "push");
        ts
    }

    #[test]
    fn test_round_trip_all_codecs() {
        let dir = tempdir().unwrap();
        let ts = sample();
        let mut codecs = vec![CompressionType::None, CompressionType::Zlib];
        if cfg!(feature = "lz4") {
            codecs.push(CompressionType::Lz4);
        }
        if cfg!(feature = "zstd") {
            codecs.push(CompressionType::Zstd);
        }
        for codec in codecs {
            let path = dir.path().join(format!("codec{}.ktks", codec as u8));
            write_series(&path, &ts, codec).unwrap();
            let file = TimeSeriesFile::open(&path).unwrap();
            assert_eq!(file.header().compression, codec);
            assert!(file.created_at().is_some());
            assert_eq!(file.read_series().unwrap(), ts);
        }
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad_magic.ktks");
        fs::write(&path, vec![0u8; HEADER_SIZE + 4]).unwrap();
        let err = TimeSeriesFile::open(&path).err().unwrap();
        assert!(matches!(err, TsError::InvalidMagic { .. }));
    }

    #[test]
    fn test_truncated_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truncated.ktks");
        write_series(&path, &sample(), CompressionType::None).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 5);
        fs::write(&path, &bytes).unwrap();
        let err = TimeSeriesFile::open(&path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_huge_declared_length_is_an_error() {
        let dir = tempdir().unwrap();
        let mut codecs = vec![CompressionType::None, CompressionType::Zlib];
        if cfg!(feature = "lz4") {
            codecs.push(CompressionType::Lz4);
        }
        for codec in codecs {
            let path = dir.path().join(format!("huge{}.ktks", codec as u8));
            write_series(&path, &sample(), codec).unwrap();
            let mut bytes = fs::read(&path).unwrap();
            bytes[14..22].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
            fs::write(&path, &bytes).unwrap();

            let file = TimeSeriesFile::open(&path).unwrap();
            let err = file.read_series().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
        }
    }

    #[test]
    fn test_load_series_by_extension() {
        let dir = tempdir().unwrap();
        let ts = sample();
        let json_path = dir.path().join("plain.json");
        fs::write(&json_path, ts.to_json().unwrap()).unwrap();
        assert_eq!(load_series(&json_path).unwrap(), ts);

        let ktks_path = dir.path().join("packed.ktks");
        write_series(&ktks_path, &ts, CompressionType::Zlib).unwrap();
        assert_eq!(load_series(&ktks_path).unwrap(), ts);
    }
}
