//! An external merge sorter for `(depth, state)` records.
//!
//! The enumerator emits billions of records for larger player counts, far
//! more than fit in memory. Records are buffered, sorted runs are spilled to
//! temp files in the work dir, and the runs are k-way merged back into a
//! single stream ordered by ascending depth.

use crate::{
    state::{GameState, MAX_STATE_BYTES},
    Error,
};
use claim::debug_assert_le;
use log::debug;
use std::{
    cmp,
    collections::BinaryHeap,
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Bytes of depth header per record.
const DEPTH_BYTES: usize = 2;

/// Largest possible record: `[u16 depth LE][serialized state]`.
pub(crate) const MAX_RECORD_BYTES: usize = MAX_STATE_BYTES + DEPTH_BYTES;

/// In-memory buffer to fill before spilling a sorted run to disk.
const DEFAULT_BUFFER_SIZE: usize = 256 * 1024 * 1024;

/// Accumulates `(depth, state)` records and sorts them externally.
pub struct StateSorter {
    work_dir: PathBuf,
    buffer_size: usize,
    rec_len: usize,
    buf: Vec<u8>,
    runs: Vec<File>,
}

impl StateSorter {
    pub fn new(work_dir: &Path, num_players: u8) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            rec_len: GameState::size_of(num_players) + DEPTH_BYTES,
            buf: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Tune the in-memory buffer; larger buffers mean fewer run files to
    /// merge.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn append(&mut self, depth: u16, state: &GameState) -> Result<(), Error> {
        let start = self.buf.len();
        self.buf.extend_from_slice(&depth.to_le_bytes());
        self.buf.resize(start + self.rec_len, 0);
        let n_bytes = state.serialize_to(&mut self.buf[start + DEPTH_BYTES..]);
        debug_assert_eq!(n_bytes + DEPTH_BYTES, self.rec_len);

        if self.buf.len() >= self.buffer_size {
            self.spill_run()?;
        }
        Ok(())
    }

    /// Sort the buffered records and write them out as one run file.
    fn spill_run(&mut self) -> Result<(), Error> {
        let file =
            tempfile::tempfile_in(&self.work_dir).map_err(|err| Error::io(&self.work_dir, err))?;

        let mut records: Vec<&[u8]> = self.buf.chunks_exact(self.rec_len).collect();
        records.sort_by_key(|rec| u16::from_le_bytes([rec[0], rec[1]]));
        debug!(
            "spilling run {} with {} records",
            self.runs.len(),
            records.len()
        );

        let mut writer = BufWriter::with_capacity(4 << 20, &file);
        for rec in records {
            writer
                .write_all(rec)
                .map_err(|err| Error::io(&self.work_dir, err))?;
        }
        writer
            .flush()
            .map_err(|err| Error::io(&self.work_dir, err))?;
        drop(writer);

        self.buf.clear();
        self.runs.push(file);
        Ok(())
    }

    /// Finish appending and return the merged, ascending-by-depth stream.
    pub fn sort(mut self) -> Result<SortedStates, Error> {
        if !self.buf.is_empty() || self.runs.is_empty() {
            self.spill_run()?;
        }
        debug!("merging {} sorted runs", self.runs.len());

        let mut readers = Vec::with_capacity(self.runs.len());
        for mut file in self.runs {
            file.seek(SeekFrom::Start(0))
                .map_err(|err| Error::io(&self.work_dir, err))?;
            readers.push(BufReader::with_capacity(4 << 20, file));
        }

        let mut sorted = SortedStates {
            work_dir: self.work_dir,
            rec_len: self.rec_len,
            readers,
            heap: BinaryHeap::new(),
        };
        for run in 0..sorted.readers.len() {
            sorted.refill(run)?;
        }
        Ok(sorted)
    }
}

/// One buffered record per run, keyed for the min-heap merge.
#[derive(Eq)]
struct MergeEntry {
    depth: u16,
    run: usize,
    rec: [u8; MAX_RECORD_BYTES],
}

impl cmp::Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        (self.depth, self.run).cmp(&(other.depth, other.run))
    }
}

impl cmp::PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == cmp::Ordering::Equal
    }
}

/// The merged output stream of a [`StateSorter`].
pub struct SortedStates {
    work_dir: PathBuf,
    rec_len: usize,
    readers: Vec<BufReader<File>>,
    heap: BinaryHeap<cmp::Reverse<MergeEntry>>,
}

impl SortedStates {
    /// Pull the next record of run `run` into the heap, if any remain.
    fn refill(&mut self, run: usize) -> Result<(), Error> {
        debug_assert_le!(self.rec_len, MAX_RECORD_BYTES);

        let mut rec = [0_u8; MAX_RECORD_BYTES];
        match self.readers[run].read_exact(&mut rec[..self.rec_len]) {
            Ok(()) => {
                let depth = u16::from_le_bytes([rec[0], rec[1]]);
                self.heap.push(cmp::Reverse(MergeEntry { depth, run, rec }));
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
            Err(err) => Err(Error::io(&self.work_dir, err)),
        }
    }
}

impl Iterator for SortedStates {
    type Item = Result<(u16, GameState), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let cmp::Reverse(entry) = self.heap.pop()?;
        if let Err(err) = self.refill(entry.run) {
            return Some(Err(err));
        }

        let state = GameState::from_bytes(&entry.rec[DEPTH_BYTES..self.rec_len]);
        Some(Ok((entry.depth, state)))
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn arb_records() -> impl Strategy<Value = Vec<(u16, GameState)>> {
        prop::collection::vec((any::<u16>(), any::<u8>(), 1_u8..=6, any::<u8>()), 0..500)
            .prop_map(|raw| {
                raw.into_iter()
                    .map(|(depth, round, ndice, score)| {
                        let state = GameState {
                            score_this_round: round,
                            num_dice_to_roll: ndice,
                            num_players: 1,
                            player_scores: [score, 0, 0, 0],
                        };
                        (depth, state)
                    })
                    .collect()
            })
    }

    proptest! {
        /// The merged stream is ascending by depth and record-for-record a
        /// permutation of the input, even when the tiny buffer forces many
        /// runs.
        #[test]
        fn test_sort_orders_and_preserves(records in arb_records()) {
            let dir = tempfile::tempdir().unwrap();
            let mut sorter = StateSorter::new(dir.path(), 1).with_buffer_size(64);
            for (depth, state) in &records {
                sorter.append(*depth, state).unwrap();
            }

            let sorted: Vec<(u16, GameState)> = sorter
                .sort()
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();

            prop_assert!(sorted.windows(2).all(|w| w[0].0 <= w[1].0));

            let mut expected = records;
            expected.sort_by_key(|(depth, state)| (*depth, state.id()));
            let mut actual = sorted;
            actual.sort_by_key(|(depth, state)| (*depth, state.id()));
            prop_assert_eq!(expected, actual);
        }
    }

    #[test]
    fn test_sort_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sorter = StateSorter::new(dir.path(), 2);
        assert_eq!(0, sorter.sort().unwrap().count());
    }
}
