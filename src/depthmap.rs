//! The depth map: a u16 per state id, memory-mapped over an anonymous temp
//! file so the full dense id space never has to fit in RAM.
//!
//! Depth 0 doubles as "not yet computed": terminal states are depth 0 and
//! are never asked for.

use crate::Error;
use memmap2::MmapMut;
use std::path::Path;

pub struct DepthMap {
    mmap: MmapMut,
}

impl DepthMap {
    /// Map a zero-filled temp file of `num_states` u16 entries in
    /// `work_dir`. The file is unlinked immediately; the mapping keeps it
    /// alive until drop.
    pub fn new(work_dir: &Path, num_states: u64) -> Result<Self, Error> {
        let file = tempfile::tempfile_in(work_dir).map_err(|err| Error::io(work_dir, err))?;
        file.set_len(2 * num_states)
            .map_err(|err| Error::io(work_dir, err))?;

        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|err| Error::io(work_dir, err))?;
        Ok(Self { mmap })
    }

    #[inline]
    pub fn get(&self, id: u64) -> u16 {
        let idx = (2 * id) as usize;
        u16::from_le_bytes([self.mmap[idx], self.mmap[idx + 1]])
    }

    #[inline]
    pub fn set(&mut self, id: u64, depth: u16) {
        let idx = (2 * id) as usize;
        self.mmap[idx..idx + 2].copy_from_slice(&depth.to_le_bytes());
    }
}

///////////
// Tests //
///////////
