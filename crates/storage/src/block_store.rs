// Path: crates/storage/src/block_store.rs
//! Flat-file block store.
//!
//! One file per block under the store directory, filename = 16-digit
//! zero-padded decimal height, contents = length-prefixed canonical block
//! bytes.

use meridian_api::state::BlockStore;
use meridian_types::app::Block;
use meridian_types::codec;
use meridian_types::error::StorageError;
use std::path::{Path, PathBuf};

/// The append-only block file store.
#[derive(Clone)]
pub struct FlatFileBlockStore {
    dir: PathBuf,
}

impl FlatFileBlockStore {
    /// Opens (creating if needed) the store directory.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| StorageError::Backend(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn file_path(&self, height: u64) -> PathBuf {
        self.dir.join(format!("{height:016}"))
    }

    fn heights(&self) -> Result<Vec<u64>, StorageError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| StorageError::Backend(format!("read {}: {e}", self.dir.display())))?;
        let mut heights = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
            if let Some(height) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u64>().ok())
            {
                heights.push(height);
            }
        }
        heights.sort_unstable();
        Ok(heights)
    }
}

impl BlockStore for FlatFileBlockStore {
    fn insert(&self, height: u64, block: &Block) -> Result<(), StorageError> {
        let path = self.file_path(height);
        std::fs::write(&path, codec::to_bytes_framed(block))
            .map_err(|e| StorageError::Backend(format!("write {}: {e}", path.display())))
    }

    fn fetch(&self, height: u64) -> Result<Option<Block>, StorageError> {
        let path = self.file_path(height);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Backend(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };
        codec::from_bytes_framed(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Decode(e.to_string()))
    }

    fn for_each(&self, f: &mut dyn FnMut(&Block)) -> Result<(), StorageError> {
        for height in self.heights()? {
            if let Some(block) = self.fetch(height)? {
                f(&block);
            }
        }
        Ok(())
    }

    fn size(&self) -> Result<u64, StorageError> {
        Ok(self.heights()?.len() as u64)
    }

    fn clear(&self) -> Result<(), StorageError> {
        for height in self.heights()? {
            let path = self.file_path(height);
            std::fs::remove_file(&path)
                .map_err(|e| StorageError::Backend(format!("remove {}: {e}", path.display())))?;
        }
        Ok(())
    }
}
