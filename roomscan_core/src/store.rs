//! Durable persistence for world-map captures.
//!
//! File format:
//! - Header (6 bytes): magic `"RSMAP"` (5 bytes) + format version (1 byte)
//! - Body: bincode-encoded [`SpatialMap`] (capture timestamp, anchor
//!   count, then the opaque payload)
//!
//! Saves write a sibling temp file and atomically rename it over the
//! destination, so a reader never observes a partially written map:
//! either the previous complete file or the new complete file.

use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use roomscan_env::SpatialMap;
use thiserror::Error;
use tracing::{debug, info};

/// Magic bytes identifying a saved map file.
const MAGIC: &[u8; 5] = b"RSMAP";

/// Current format version.
const FORMAT_VERSION: u8 = 1;

/// Errors raised while saving a map.
#[derive(Debug, Error)]
pub enum SaveError {
    /// No capture has completed yet, so there is nothing to save.
    #[error("no map captured yet")]
    NothingCaptured,

    /// The capture could not be encoded.
    #[error("failed to encode map: {0}")]
    Encode(String),

    /// The file could not be written.
    #[error("failed to write map file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a map.
///
/// A failed load has no side effects on in-memory state.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No file exists at the given location.
    #[error("no saved map at {0}")]
    Missing(PathBuf),

    /// The file exists but cannot be decoded (truncated, bad magic,
    /// undecodable body, or unreadable).
    #[error("saved map is corrupt: {0}")]
    Corrupt(String),

    /// The file uses a format version this build does not understand.
    #[error("unsupported map format version {found} (expected {expected})")]
    VersionMismatch {
        /// Version this build writes and reads.
        expected: u8,
        /// Version found in the file.
        found: u8,
    },
}

/// Serializes world-map captures to and from durable storage.
pub struct WorldMapStore;

impl WorldMapStore {
    /// Saves a capture to `path`, replacing any prior file.
    ///
    /// Blocking; call [`save_async`](Self::save_async) from async code.
    pub fn save(map: &SpatialMap, path: &Path) -> Result<(), SaveError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let file = std::fs::File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&[FORMAT_VERSION])?;
        bincode::serialize_into(&mut writer, map)
            .map_err(|e| SaveError::Encode(e.to_string()))?;

        let file = writer
            .into_inner()
            .map_err(|e| SaveError::Io(e.into_error()))?;
        file.sync_all()?;
        std::fs::rename(&temp_path, path)?;

        info!(
            path = %path.display(),
            anchors = map.anchor_count,
            bytes = map.size(),
            "saved world map"
        );
        Ok(())
    }

    /// Loads a capture from `path`.
    pub fn load(path: &Path) -> Result<SpatialMap, LoadError> {
        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                LoadError::Missing(path.to_path_buf())
            } else {
                LoadError::Corrupt(format!("unreadable file: {}", e))
            }
        })?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; 6];
        reader
            .read_exact(&mut header)
            .map_err(|_| LoadError::Corrupt("truncated header".to_string()))?;

        if &header[0..5] != MAGIC {
            return Err(LoadError::Corrupt("invalid magic bytes".to_string()));
        }
        let found = header[5];
        if found != FORMAT_VERSION {
            return Err(LoadError::VersionMismatch {
                expected: FORMAT_VERSION,
                found,
            });
        }

        let map: SpatialMap = bincode::deserialize_from(&mut reader)
            .map_err(|e| LoadError::Corrupt(format!("undecodable body: {}", e)))?;

        debug!(
            path = %path.display(),
            anchors = map.anchor_count,
            captured_at_ms = map.captured_at_ms,
            "loaded world map"
        );
        Ok(map)
    }

    /// Saves on a blocking worker so callers on an async context never
    /// stall on file I/O.
    pub async fn save_async(map: SpatialMap, path: PathBuf) -> Result<(), SaveError> {
        tokio::task::spawn_blocking(move || Self::save(&map, &path))
            .await
            .map_err(|e| SaveError::Io(std::io::Error::other(e)))?
    }

    /// Loads on a blocking worker so callers on an async context never
    /// stall on file I/O.
    pub async fn load_async(path: PathBuf) -> Result<SpatialMap, LoadError> {
        tokio::task::spawn_blocking(move || Self::load(&path))
            .await
            .map_err(|e| LoadError::Corrupt(format!("load worker failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_map() -> SpatialMap {
        SpatialMap::new(vec![0xAB; 128], 1_700_000_000_000, 3)
    }

    #[test]
    fn test_round_trip_preserves_metadata_and_payload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("room.rsmap");
        let map = sample_map();

        WorldMapStore::save(&map, &path).unwrap();
        let loaded = WorldMapStore::load(&path).unwrap();

        assert_eq!(loaded, map);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/maps/room.rsmap");

        WorldMapStore::save(&sample_map(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_replaces_prior_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("room.rsmap");

        WorldMapStore::save(&SpatialMap::new(vec![1], 10, 1), &path).unwrap();
        WorldMapStore::save(&SpatialMap::new(vec![2, 2], 20, 2), &path).unwrap();

        let loaded = WorldMapStore::load(&path).unwrap();
        assert_eq!(loaded.anchor_count, 2);
        assert_eq!(loaded.captured_at_ms, 20);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.rsmap");

        let err = WorldMapStore::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Missing(_)));
    }

    #[test]
    fn test_load_truncated_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("short.rsmap");
        std::fs::write(&path, b"RSM").unwrap();

        let err = WorldMapStore::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn test_load_bad_magic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("garbage.rsmap");
        std::fs::write(&path, b"WRONG\x01rest-of-file").unwrap();

        let err = WorldMapStore::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn test_load_version_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("room.rsmap");
        WorldMapStore::save(&sample_map(), &path).unwrap();

        // Bump the version byte in place.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[5] = 2;
        std::fs::write(&path, &bytes).unwrap();

        let err = WorldMapStore::load(&path).unwrap_err();
        assert!(matches!(
            err,
            LoadError::VersionMismatch {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_load_truncated_body() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("room.rsmap");
        WorldMapStore::save(&sample_map(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let err = WorldMapStore::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn test_interrupted_save_leaves_prior_file_intact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("room.rsmap");
        let good = sample_map();
        WorldMapStore::save(&good, &path).unwrap();

        // A crashed writer leaves a half-written temp file behind; the
        // destination must still load the previous complete map.
        std::fs::write(path.with_extension("tmp"), b"RSMAP\x01half-writ").unwrap();

        let loaded = WorldMapStore::load(&path).unwrap();
        assert_eq!(loaded, good);
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("room.rsmap");
        let map = sample_map();

        WorldMapStore::save_async(map.clone(), path.clone())
            .await
            .unwrap();
        let loaded = WorldMapStore::load_async(path).await.unwrap();
        assert_eq!(loaded, map);
    }
}
