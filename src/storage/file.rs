//! Block manager backed by a single file.
//!
//! Writes go through the file handle; reads go through a memory map of the
//! file that is created on first read and dropped whenever the file changes.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use parking_lot::{Mutex, RwLock};

use super::memory::validate_block_size;
use super::{BlockId, BlockManager};
use crate::error::{Error, Result};

struct FileState {
    file: File,
    blocks: u64,
}

/// File-backed block store. Block `i` occupies bytes
/// `[i * block_size, (i + 1) * block_size)` of the file.
pub struct FileBlockManager {
    path: PathBuf,
    block_size: usize,
    // Lock order: `map` before `state`.
    map: RwLock<Option<Mmap>>,
    state: Mutex<FileState>,
}

impl FileBlockManager {
    /// Create (or truncate) a block file.
    pub fn create(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        validate_block_size(block_size)?;
        let path = path.as_ref().to_path_buf();
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self::from_parts(path, block_size, file, 0))
    }

    /// Open an existing block file written with the same block size.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        validate_block_size(block_size)?;
        let path = path.as_ref().to_path_buf();
        let file = File::options().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        if len % block_size as u64 != 0 {
            return Err(Error::InvalidFileLength { len, block_size });
        }
        Ok(Self::from_parts(path, block_size, file, len / block_size as u64))
    }

    fn from_parts(path: PathBuf, block_size: usize, file: File, blocks: u64) -> Self {
        Self {
            path,
            block_size,
            map: RwLock::new(None),
            state: Mutex::new(FileState { file, blocks }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush written blocks to durable storage.
    pub fn sync(&self) -> Result<()> {
        self.state.lock().file.sync_all()?;
        Ok(())
    }

    /// Byte range of block `id` within the file, or `UnknownBlock` when the
    /// id is too large to address.
    fn block_range(&self, id: BlockId) -> Result<std::ops::Range<usize>> {
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_mul(self.block_size))
            .and_then(|start| Some(start..start.checked_add(self.block_size)?))
            .ok_or(Error::UnknownBlock(id))
    }
}

impl BlockManager for FileBlockManager {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn allocate(&self) -> Result<BlockId> {
        let mut map = self.map.write();
        let mut state = self.state.lock();
        let id = state.blocks;
        state.file.set_len((id + 1) * self.block_size as u64)?;
        state.blocks += 1;
        *map = None;
        Ok(id)
    }

    fn write_block(&self, id: BlockId, data: &[u8]) -> Result<()> {
        if data.len() != self.block_size {
            return Err(Error::BlockSizeMismatch {
                expected: self.block_size,
                actual: data.len(),
            });
        }
        let mut map = self.map.write();
        *map = None;

        let mut state = self.state.lock();
        if id >= state.blocks {
            return Err(Error::UnknownBlock(id));
        }
        state
            .file
            .seek(SeekFrom::Start(id * self.block_size as u64))?;
        state.file.write_all(data)?;
        Ok(())
    }

    fn read_block(&self, id: BlockId) -> Result<Vec<u8>> {
        let range = self.block_range(id)?;
        {
            let map = self.map.read();
            if let Some(mmap) = map.as_ref() {
                return mmap
                    .get(range)
                    .map(<[u8]>::to_vec)
                    .ok_or(Error::UnknownBlock(id));
            }
        }

        let mut map = self.map.write();
        let state = self.state.lock();
        if id >= state.blocks {
            return Err(Error::UnknownBlock(id));
        }
        // SAFETY: the file is only modified through this manager, and every
        // modification drops the mapping while holding the `map` write lock.
        let mmap = unsafe { Mmap::map(&state.file)? };
        let block = mmap
            .get(range)
            .map(<[u8]>::to_vec)
            .ok_or(Error::UnknownBlock(id))?;
        *map = Some(mmap);
        Ok(block)
    }

    fn block_count(&self) -> u64 {
        self.state.lock().blocks
    }
}
