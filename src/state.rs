//! The game-state model: one compact struct per state, a bit-packed dense id
//! usable as a flat table index, and the byte serialization used by the
//! sorted-states file.

use crate::{
    dice::MAX_NUM_DICE,
    score::SCORE_TO_WIN,
};

/// The most players a table can be solved for.
pub const MAX_NUM_PLAYERS: usize = 4;

/// Bits per score field in the packed state id.
const SCORE_BITS: u32 = 8;

/// Serialized size of the largest state.
pub const MAX_STATE_BYTES: usize = MAX_NUM_PLAYERS + 3;

/// The full state of a game between turns of a round.
///
/// `player_scores[0]` is always the player whose turn it is; advancing to
/// the next player rotates the scores left. Only the first `num_players`
/// entries are significant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GameState {
    /// Score accumulated so far this round, saturating at 255.
    pub score_this_round: u8,
    /// How many dice the current player rolls next, in `1..=6`.
    pub num_dice_to_roll: u8,
    pub num_players: u8,
    pub player_scores: [u8; MAX_NUM_PLAYERS],
}

impl GameState {
    /// The initial state of a fresh `num_players` game.
    pub fn new(num_players: u8) -> Self {
        assert!(
            (1..=MAX_NUM_PLAYERS as u8).contains(&num_players),
            "cannot create GameState with {num_players} players (max {MAX_NUM_PLAYERS})"
        );

        Self {
            score_this_round: 0,
            num_dice_to_roll: MAX_NUM_DICE,
            num_players,
            player_scores: [0; MAX_NUM_PLAYERS],
        }
    }

    /// Pack this state into its dense id:
    ///
    /// ```text
    /// id = ((num_dice_to_roll - 1) << ((n+1)·8))
    ///    +  Σᵢ (player_scores[i] << ((n - i)·8))
    ///    +  score_this_round
    /// ```
    ///
    /// Distinct field tuples map to distinct ids; every table client must
    /// use this exact layout.
    pub fn id(&self) -> u64 {
        let n = u32::from(self.num_players);

        let mut id = u64::from(self.num_dice_to_roll - 1) << ((n + 1) * SCORE_BITS);
        for (i, &score) in self.player_scores[..self.num_players as usize]
            .iter()
            .enumerate()
        {
            id += u64::from(score) << ((n - i as u32) * SCORE_BITS);
        }
        id + u64::from(self.score_this_round)
    }

    /// Invert [`GameState::id`].
    pub fn from_id(id: u64, num_players: u8) -> Self {
        debug_assert!(id < num_distinct_states(num_players));

        let n = u32::from(num_players);
        let num_dice_to_roll = (id >> ((n + 1) * SCORE_BITS)) as u8 + 1;
        let mut player_scores = [0_u8; MAX_NUM_PLAYERS];
        for (i, score) in player_scores[..num_players as usize].iter_mut().enumerate() {
            *score = ((id >> ((n - i as u32) * SCORE_BITS)) & 0xff) as u8;
        }

        Self {
            score_this_round: (id & 0xff) as u8,
            num_dice_to_roll,
            num_players,
            player_scores,
        }
    }

    /// The game is over once any player has banked [`SCORE_TO_WIN`].
    #[inline]
    pub fn is_game_over(&self) -> bool {
        self.highest_score() >= SCORE_TO_WIN
    }

    pub fn highest_score(&self) -> u8 {
        self.player_scores[..self.num_players as usize]
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Serialized size of a `num_players` state.
    #[inline]
    pub const fn size_of(num_players: u8) -> usize {
        num_players as usize + 3
    }

    /// Serialize as `[score_this_round, num_dice_to_roll, num_players,
    /// player_scores[0..num_players]]`. Returns the number of bytes written.
    pub fn serialize_to(&self, buf: &mut [u8]) -> usize {
        let n_bytes = Self::size_of(self.num_players);
        assert!(
            buf.len() >= n_bytes,
            "cannot serialize GameState: buffer has {} bytes but need {n_bytes}",
            buf.len(),
        );

        buf[0] = self.score_this_round;
        buf[1] = self.num_dice_to_roll;
        buf[2] = self.num_players;
        buf[3..n_bytes].copy_from_slice(&self.player_scores[..self.num_players as usize]);
        n_bytes
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        let num_players = buf[2] as usize;
        let mut player_scores = [0_u8; MAX_NUM_PLAYERS];
        player_scores[..num_players].copy_from_slice(&buf[3..3 + num_players]);

        Self {
            score_this_round: buf[0],
            num_dice_to_roll: buf[1],
            num_players: buf[2],
            player_scores,
        }
    }
}

/// Size of the dense id space for a player count: `6 · 256^(n+1)`.
pub fn num_distinct_states(num_players: u8) -> u64 {
    u64::from(MAX_NUM_DICE) << ((u32::from(num_players) + 1) * SCORE_BITS)
}

///////////
// Tests //
///////////
