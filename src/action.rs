//! The action model: what a player does after seeing a roll, and the
//! deterministic state transition it induces.

use crate::{
    dice::MAX_NUM_DICE,
    state::GameState,
    tables::Tables,
};

/// The choice made by a player after rolling: which dice to hold (by roll
/// id) and whether to keep rolling. The zero action is a farkle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Action {
    pub held_dice_id: u16,
    pub continue_rolling: bool,
}

impl Action {
    /// The sentinel action applied when a roll has no scoring tricks.
    pub const FARKLE: Self = Self {
        held_dice_id: 0,
        continue_rolling: false,
    };

    #[inline]
    pub fn is_farkle(self) -> bool {
        self == Self::FARKLE
    }
}

/// Apply `action` to `state`.
///
/// 1. The held dice's score is added to the round score (saturating); a
///    farkle instead wipes the round score.
/// 2. The held dice leave play; holding every die is "hot dice" and resets
///    to six.
/// 3. Stopping banks the round score (saturating) and rotates the scores
///    left, so index 0 names the next player.
///
/// Panics if the action holds more dice than the state has to roll; only a
/// bug in action generation can produce such a pair.
pub fn apply_action(tables: &Tables, mut state: GameState, action: Action) -> GameState {
    let trick_score = tables.score_cache[action.held_dice_id as usize];
    state.score_this_round = state.score_this_round.saturating_add(trick_score);
    if action.is_farkle() {
        state.score_this_round = 0;
    }

    let num_dice_held = tables.roll_num_dice[action.held_dice_id as usize];
    if num_dice_held > state.num_dice_to_roll {
        panic!(
            "illegal action {action:?} applied to state {state:?}: \
             held {num_dice_held} dice but only had {} to roll",
            state.num_dice_to_roll,
        );
    }
    state.num_dice_to_roll -= num_dice_held;
    if state.num_dice_to_roll == 0 {
        // hot dice: every die scored, roll all six again
        state.num_dice_to_roll = MAX_NUM_DICE;
    }

    if !action.continue_rolling {
        let n = state.num_players as usize;
        let banked = state.player_scores[0].saturating_add(state.score_this_round);
        state.player_scores.copy_within(1..n, 0);
        state.player_scores[n - 1] = banked;
        state.score_this_round = 0;
        state.num_dice_to_roll = MAX_NUM_DICE;
    }

    state
}

///////////
// Tests //
///////////
