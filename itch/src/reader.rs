//! Memory-mapped frame reader.
//!
//! The whole file is mapped read-only up front; frames are yielded as slices
//! into the mapping, so the engine never copies or blocks on I/O.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::warn;

use crate::FeedError;

pub struct FeedReader {
    map: Mmap,
    pos: usize,
}

impl FeedReader {
    pub fn open(path: &Path) -> Result<Self, FeedError> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the historical capture is not
        // modified while the backtest runs.
        let map = unsafe { Mmap::map(&file)? };
        Ok(FeedReader { map, pos: 0 })
    }

    /// Current position in the file: the offset of the next frame's length
    /// prefix.
    pub fn offset(&self) -> u64 {
        self.pos as u64
    }

    /// The next frame's payload, or `None` at end of stream. A frame whose
    /// declared length runs past the mapping ends the stream early.
    pub fn next_frame(&mut self) -> Option<&[u8]> {
        if self.pos + 2 > self.map.len() {
            return None;
        }
        let len = u16::from_be_bytes([self.map[self.pos], self.map[self.pos + 1]]) as usize;
        let start = self.pos + 2;
        let end = start + len;
        if len == 0 || end > self.map.len() {
            warn!(offset = self.pos, len, "truncated trailing frame, stopping");
            return None;
        }
        self.pos = end;
        Some(&self.map[start..end])
    }
}
