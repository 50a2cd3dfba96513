use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::TransferError;

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Fixed chunk boundaries for one file.
///
/// Chunk `i` spans `[i * chunk_size, min((i + 1) * chunk_size, file_size))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
    total_chunks: u32,
}

impl ChunkPlan {
    /// Computes the plan for `file_size` bytes split into `chunk_size` pieces.
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize(chunk_size));
        }
        let total_chunks = u32::try_from(file_size.div_ceil(chunk_size))
            .map_err(|_| TransferError::InvalidChunkSize(chunk_size))?;
        Ok(Self {
            file_size,
            chunk_size,
            total_chunks,
        })
    }

    /// Byte range of chunk `index`, or `None` past the end.
    pub fn range(&self, index: u32) -> Option<Range<u64>> {
        if index >= self.total_chunks {
            return None;
        }
        let start = u64::from(index) * self.chunk_size;
        let end = start.saturating_add(self.chunk_size).min(self.file_size);
        Some(start..end)
    }

    /// Iterates over all chunk ranges in index order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<u64>> + '_ {
        (0..self.total_chunks).filter_map(|i| self.range(i))
    }

    /// Bytes covered by the first `acknowledged` chunks.
    pub fn bytes_through(&self, acknowledged: u32) -> u64 {
        if acknowledged == 0 {
            return 0;
        }
        self.range(acknowledged - 1).map_or(self.file_size, |r| r.end)
    }

    /// Reads chunk `index` from `source`.
    pub fn read_chunk(
        &self,
        source: &mut dyn ChunkSource,
        index: u32,
    ) -> Result<Chunk, TransferError> {
        let range = self.range(index).ok_or(TransferError::ChunkOutOfRange {
            index,
            total: self.total_chunks,
        })?;
        let offset = range.start;
        let data = source.read_range(range)?;
        Ok(Chunk {
            index,
            offset,
            data,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Returns `true` if `index` is the final chunk.
    pub fn is_last(&self, index: u32) -> bool {
        index + 1 == self.total_chunks
    }
}

/// A chunk of file data ready to send.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 0-based position in the plan.
    pub index: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Random-access byte source a file is uploaded from.
pub trait ChunkSource: Send {
    /// Reads exactly the bytes in `range`.
    fn read_range(&mut self, range: Range<u64>) -> Result<Vec<u8>, TransferError>;
}

/// Reads chunks from a file on disk.
pub struct ChunkReader {
    file: std::fs::File,
    file_path: PathBuf,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    pub fn new(path: &Path) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            file,
            file_path: path.to_path_buf(),
            file_size,
        })
    }

    /// Total file size in bytes, as seen at open time.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl ChunkSource for ChunkReader {
    fn read_range(&mut self, range: Range<u64>) -> Result<Vec<u8>, TransferError> {
        self.file.seek(SeekFrom::Start(range.start))?;
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        // A file truncated after open surfaces as UnexpectedEof.
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Serves chunks from an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ChunkSource for MemorySource {
    fn read_range(&mut self, range: Range<u64>) -> Result<Vec<u8>, TransferError> {
        let start = range.start as usize;
        let end = range.end as usize;
        self.data.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("range {start}..{end} beyond {} bytes", self.data.len()),
            )
            .into()
        })
    }
}
