//! The dense value table: one fixed-size record of `num_players` win
//! probabilities per state id, memory-mapped read/write.

use crate::{
    state::{num_distinct_states, MAX_NUM_PLAYERS},
    Error,
};
use log::info;
use memmap2::MmapMut;
use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// A store of per-state win-probability vectors.
///
/// Entries are always read and written in the current-player frame: index 0
/// of a vector is the player whose turn it is at that state.
pub trait Db: Send + Sync {
    fn num_players(&self) -> u8;

    /// The stored vector for a state id. Slots past `num_players` are zero.
    fn get(&self, id: u64) -> [f64; MAX_NUM_PLAYERS];

    /// Store the vector for a state id.
    fn put(&mut self, id: u64, p_win: [f64; MAX_NUM_PLAYERS]);

    /// Persist any buffered writes.
    fn flush(&self) -> Result<(), Error>;
}

/// A [`Db`] over a memory-mapped flat file of little-endian f64s.
///
/// Record `id` lives at byte offset `8 · num_players · id`. A missing file
/// is created and filled with the neutral prior `1/num_players`, so reads
/// ahead of the solver see a uniform guess; a file of the wrong size for
/// the configured player count is rejected.
#[derive(Debug)]
pub struct FileDb {
    mmap: MmapMut,
    num_players: u8,
    path: PathBuf,
}

impl FileDb {
    pub fn open(path: &Path, num_players: u8) -> Result<Self, Error> {
        let num_entries = u64::from(num_players) * num_distinct_states(num_players);
        let file_size = 8 * num_entries;

        let file = match path.metadata() {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Self::create(path, num_players, num_entries)?
            }
            Err(err) => return Err(Error::io(path, err)),
            Ok(metadata) if metadata.len() != file_size => {
                return Err(Error::SizeMismatch {
                    path: path.to_path_buf(),
                    num_players,
                    expected: file_size,
                    actual: metadata.len(),
                });
            }
            Ok(_) => OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|err| Error::io(path, err))?,
        };

        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|err| Error::io(path, err))?;
        Ok(Self {
            mmap,
            num_players,
            path: path.to_path_buf(),
        })
    }

    /// Initialize a new table filled with the `1/num_players` prior.
    fn create(path: &Path, num_players: u8, num_entries: u64) -> Result<File, Error> {
        info!(
            "initializing new value table at {} with {num_entries} entries",
            path.display(),
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|err| Error::io(path, err))?;

        let prior = (1.0 / f64::from(num_players)).to_le_bytes();
        let mut writer = BufWriter::with_capacity(4 << 20, &file);
        for _ in 0..num_entries {
            writer
                .write_all(&prior)
                .map_err(|err| Error::io(path, err))?;
        }
        writer.flush().map_err(|err| Error::io(path, err))?;
        drop(writer);

        Ok(file)
    }

    /// msync the mapping and drop it.
    pub fn close(self) -> Result<(), Error> {
        self.mmap
            .flush()
            .map_err(|err| Error::io(&self.path, err))
    }

    #[inline]
    fn offset(&self, id: u64) -> usize {
        (8 * u64::from(self.num_players) * id) as usize
    }
}

impl Db for FileDb {
    #[inline]
    fn num_players(&self) -> u8 {
        self.num_players
    }

    fn get(&self, id: u64) -> [f64; MAX_NUM_PLAYERS] {
        let idx = self.offset(id);
        let buf = &self.mmap[idx..idx + 8 * self.num_players as usize];

        let mut result = [0.0; MAX_NUM_PLAYERS];
        for (slot, chunk) in result.iter_mut().zip(buf.chunks_exact(8)) {
            *slot = f64::from_le_bytes(chunk.try_into().unwrap());
        }
        result
    }

    fn put(&mut self, id: u64, p_win: [f64; MAX_NUM_PLAYERS]) {
        let idx = self.offset(id);
        let buf = &mut self.mmap[idx..idx + 8 * self.num_players as usize];

        for (chunk, p) in buf.chunks_exact_mut(8).zip(&p_win) {
            chunk.copy_from_slice(&p.to_le_bytes());
        }
    }

    fn flush(&self) -> Result<(), Error> {
        self.mmap
            .flush()
            .map_err(|err| Error::io(&self.path, err))
    }
}

/// A [`Db`] backed by a dense in-memory array. Only sensible for small
/// player counts; the 2-player table is already ~1.5 GiB.
pub struct InMemoryDb {
    values: Vec<f64>,
    num_players: u8,
}

impl InMemoryDb {
    pub fn new(num_players: u8) -> Self {
        let num_entries = u64::from(num_players) * num_distinct_states(num_players);
        Self {
            values: vec![1.0 / f64::from(num_players); num_entries as usize],
            num_players,
        }
    }

    #[inline]
    fn offset(&self, id: u64) -> usize {
        (u64::from(self.num_players) * id) as usize
    }
}

impl Db for InMemoryDb {
    #[inline]
    fn num_players(&self) -> u8 {
        self.num_players
    }

    fn get(&self, id: u64) -> [f64; MAX_NUM_PLAYERS] {
        let idx = self.offset(id);
        let n = self.num_players as usize;

        let mut result = [0.0; MAX_NUM_PLAYERS];
        result[..n].copy_from_slice(&self.values[idx..idx + n]);
        result
    }

    fn put(&mut self, id: u64, p_win: [f64; MAX_NUM_PLAYERS]) {
        let idx = self.offset(id);
        let n = self.num_players as usize;
        self.values[idx..idx + n].copy_from_slice(&p_win[..n]);
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

///////////
// Tests //
///////////
