//! # farkle
//!
//! A solver for the dice game Farkle : )
//!
//! ## Rules
//!
//! https://en.wikipedia.org/wiki/Farkle
//!
//! ## Explanation
//!
//! The `solve` command enumerates every game state reachable from the initial
//! state for a given player count, then runs value iteration over the state
//! space (terminal-adjacent states first) to compute, for each state, the
//! vector of per-player win probabilities under the current player's optimal
//! policy. The result is materialized into a dense, memory-mapped table keyed
//! by a bit-packed state id, so the `play` command (or any other tool) can
//! look up any state in O(1).
//!
//! Win probabilities are always stored "from the current player's
//! perspective": index 0 of a value vector names the player whose turn it is
//! in that state. Keeping the table in this rotated frame means its shape
//! never depends on whose turn it is; values are unrotated at turn
//! boundaries.

#[macro_use]
mod macros;

pub mod action;
pub mod cli;
pub mod db;
pub mod depthmap;
pub mod dice;
pub mod enumerate;
pub mod play;
pub mod score;
pub mod solve;
pub mod sort;
pub mod state;
pub mod tables;

use std::path::PathBuf;
use thiserror::Error;

///////////////////
// Combinatorics //
///////////////////

/// The number of factorials to precompute in our static lookup table. Note this
/// number is chosen so as not to overflow a u32.
pub(crate) const NUM_FACTORIALS: usize = 13;

/// A precomputed lookup table of factorials from `0 <= n < NUM_FACTORIALS`.
/// `FACTORIAL_LT[n] = n!`.
const FACTORIAL_LT: [u32; NUM_FACTORIALS] = precompute_factorials();

const fn precompute_factorials() -> [u32; NUM_FACTORIALS] {
    let mut factorials: [u32; NUM_FACTORIALS] = [1; NUM_FACTORIALS];

    // need ghetto for-loop in const fn...
    let mut idx = 1;
    loop {
        if idx >= NUM_FACTORIALS {
            break;
        }
        factorials[idx] = (idx as u32) * factorials[idx - 1];
        idx += 1;
    }

    factorials
}

pub(crate) const fn factorial(n: u32) -> u32 {
    FACTORIAL_LT[n as usize]
}

/// count `n choose k` without replacement.
pub(crate) const fn num_combinations(n: u32, k: u32) -> u32 {
    factorial(n) / (factorial(k) * factorial(n - k))
}

/// count `n choose k` with replacement. also known as `n multichoose k`.
#[inline]
pub(crate) const fn num_multisets(n: u32, k: u32) -> u32 {
    num_combinations(n + k - 1, k)
}

////////////
// Errors //
////////////

/// I/O and sizing failures surfaced to the command layer.
///
/// Invariant violations (an illegal die face, holding more dice than were
/// rolled, ...) are not represented here; they panic with a precise message,
/// since no legal game input can trigger them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{} is not the correct size for a {num_players}-player table: \
         got {actual} bytes, expected {expected}",
        .path.display()
    )]
    SizeMismatch {
        path: PathBuf,
        num_players: u8,
        expected: u64,
        actual: u64,
    },

    #[error("game state depth {depth} exceeds the u16 depth map range")]
    DepthOverflow { depth: u32 },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

///////////
// Tests //
///////////
