//! Process-wide immutable lookup tables, built once at startup and threaded
//! through the solver: every distinct roll with its id and probability, the
//! legal holds and actions per roll, and the score of every holdable
//! multiset.

use crate::{
    action::Action,
    dice::{make_weighted_rolls, Roll, WeightedRoll, MAX_NUM_DICE},
    score::{calculate_score, potential_holds},
};
use std::collections::HashMap;

/// All dice/scoring lookup tables. Logically immutable after construction.
pub struct Tables {
    /// `all_rolls[n]` holds every distinct roll of exactly `n` dice.
    pub all_rolls: [Vec<WeightedRoll>; (MAX_NUM_DICE + 1) as usize],
    /// Roll for each id.
    pub rolls_by_id: Vec<Roll>,
    /// Number of dice in the roll with each id.
    pub roll_num_dice: Vec<u8>,
    /// Max score of the exact multiset with each id; zero for multisets
    /// that are not achievable holds.
    pub score_cache: Vec<u8>,

    roll_to_id: HashMap<Roll, u16>,
    potential_holds: Vec<Vec<Roll>>,
    potential_actions: Vec<Vec<Action>>,
}

impl Tables {
    pub fn new() -> Self {
        let all_rolls = make_weighted_rolls();
        let n_rolls: usize = all_rolls.iter().map(Vec::len).sum();

        let mut rolls_by_id = vec![Roll::default(); n_rolls];
        let mut roll_num_dice = vec![0_u8; n_rolls];
        let mut roll_to_id = HashMap::with_capacity(n_rolls);
        for wroll in all_rolls.iter().flatten() {
            rolls_by_id[wroll.id as usize] = wroll.roll;
            roll_num_dice[wroll.id as usize] = wroll.roll.num_dice();
            roll_to_id.insert(wroll.roll, wroll.id);
        }

        let holds_by_id: Vec<Vec<Roll>> = rolls_by_id
            .iter()
            .map(potential_holds)
            .collect();

        let mut score_cache = vec![0_u8; n_rolls];
        for hold in holds_by_id.iter().flatten() {
            let id = roll_to_id[hold];
            score_cache[id as usize] = calculate_score(hold);
        }

        // holding an action's dice by id only works if every hold and the
        // empty (farkle) roll resolve as expected
        assert!(rolls_by_id[0].is_empty(), "the empty roll must have id 0");
        assert_eq!(0, score_cache[0], "a farkle should have zero score");

        let potential_actions: Vec<Vec<Action>> = holds_by_id
            .iter()
            .map(|holds| {
                let mut actions = Vec::with_capacity(2 * holds.len());
                for hold in holds {
                    let held_dice_id = roll_to_id[hold];
                    for continue_rolling in [true, false] {
                        actions.push(Action {
                            held_dice_id,
                            continue_rolling,
                        });
                    }
                }
                actions
            })
            .collect();

        Self {
            all_rolls,
            rolls_by_id,
            roll_num_dice,
            score_cache,
            roll_to_id,
            potential_holds: holds_by_id,
            potential_actions,
        }
    }

    /// Total number of distinct rolls across sizes 0..=6.
    #[inline]
    pub fn n_distinct_rolls(&self) -> usize {
        self.rolls_by_id.len()
    }

    /// The dense id of a roll. Panics on a multiset that was never
    /// enumerated (more than six dice), which no legal input can produce.
    pub fn roll_id(&self, roll: &Roll) -> u16 {
        match self.roll_to_id.get(roll) {
            Some(&id) => id,
            None => panic!("roll {roll} was never enumerated"),
        }
    }

    /// The multisets that can be held out of the roll with this id.
    #[inline]
    pub fn potential_holds(&self, roll_id: u16) -> &[Roll] {
        &self.potential_holds[roll_id as usize]
    }

    /// All hold/continue combinations available after this roll. Empty iff
    /// the roll is a farkle.
    #[inline]
    pub fn potential_actions(&self, roll_id: u16) -> &[Action] {
        &self.potential_actions[roll_id as usize]
    }

    /// A roll with no scoring tricks loses the round.
    #[inline]
    pub fn is_farkle(&self, roll_id: u16) -> bool {
        self.potential_holds[roll_id as usize].is_empty()
    }

    /// `true` if `held` can be held out of the roll with id `roll_id` as a
    /// union of disjoint scoring tricks.
    pub fn is_valid_hold(&self, roll_id: u16, held: &Roll) -> bool {
        self.potential_holds[roll_id as usize].contains(held)
    }

    pub fn describe_action(&self, action: Action) -> String {
        if action.is_farkle() {
            return "FARKLE!".to_string();
        }

        let roll = &self.rolls_by_id[action.held_dice_id as usize];
        let cont = if action.continue_rolling {
            "continue"
        } else {
            "stop"
        };
        format!("hold {roll}, {cont}")
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}

///////////
// Tests //
///////////
