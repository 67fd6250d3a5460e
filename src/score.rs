//! The scoring kernel: recognizing scoring "tricks" in a roll, enumerating
//! all ways to decompose a roll into disjoint tricks, and scoring a held
//! multiset.
//!
//! All scores are scaled down by [`INCR`], so they fit u8 and the whole
//! game-score range packs into one byte per player.

use crate::dice::{Roll, NUM_SIDES};

/// All game scores are multiples of 50; stored scores are divided by this.
pub const INCR: u16 = 50;

/// First player to bank 10,000 points wins.
pub const SCORE_TO_WIN: u8 = (10_000 / INCR) as u8;

/// A player not yet on the board must bank at least 500 in one round.
pub const ON_BOARD_MIN: u8 = (500 / INCR) as u8;

/// A minimal scoring pattern.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrickType {
    Single1,
    Single5,
    Three1s,
    Three2s,
    Three3s,
    Three4s,
    Three5s,
    Three6s,
    FourOfAKind,
    FiveOfAKind,
    SixOfAKind,
    Straight,
    ThreePairs,
    FourOfAKindPlusPair,
    TwoTriplets,
}

impl TrickType {
    /// The trick's score, scaled down by [`INCR`].
    pub fn score(self) -> u8 {
        let raw: u16 = match self {
            Self::Single1 => 100,
            Self::Single5 => 50,
            Self::Three1s => 300,
            Self::Three2s => 200,
            Self::Three3s => 300,
            Self::Three4s => 400,
            Self::Three5s => 500,
            Self::Three6s => 600,
            Self::FourOfAKind => 1000,
            Self::FiveOfAKind => 2000,
            Self::SixOfAKind => 3000,
            Self::Straight => 1500,
            Self::ThreePairs => 1500,
            Self::FourOfAKindPlusPair => 1500,
            Self::TwoTriplets => 2500,
        };
        (raw / INCR) as u8
    }

    fn three_of_a_kind(die: u8) -> Self {
        match die {
            1 => Self::Three1s,
            2 => Self::Three2s,
            3 => Self::Three3s,
            4 => Self::Three4s,
            5 => Self::Three5s,
            6 => Self::Three6s,
            _ => panic!("no three-of-a-kind trick for face {die}"),
        }
    }
}

/// A trick together with the exact dice it claims from the roll.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Trick {
    pub kind: TrickType,
    pub dice: Roll,
}

impl Trick {
    #[inline]
    pub fn score(&self) -> u8 {
        self.kind.score()
    }
}

/// All ordered lists of disjoint tricks that can be drawn from `roll`.
///
/// An N-of-a-kind branch claims all N dice of that face; singles recurse
/// one die at a time, so every split of 1s and 5s is still reached. The
/// four special patterns are recognized against the full multiset only.
pub fn enumerate_possible_tricks(roll: &Roll) -> Vec<Vec<Trick>> {
    let mut result = Vec::new();

    for die in 1..=NUM_SIDES {
        let count = roll.get_count(die);

        if count >= 1 && (die == 1 || die == 5) {
            let kind = if die == 1 {
                TrickType::Single1
            } else {
                TrickType::Single5
            };
            let trick = Trick {
                kind,
                dice: Roll::repeated(die, 1),
            };
            result.extend(remaining_tricks(roll, trick));
        }

        if count >= 3 {
            let trick = Trick {
                kind: TrickType::three_of_a_kind(die),
                dice: Roll::repeated(die, count),
            };
            result.extend(remaining_tricks(roll, trick));
        }

        if count >= 4 {
            let trick = Trick {
                kind: TrickType::FourOfAKind,
                dice: Roll::repeated(die, count),
            };
            result.extend(remaining_tricks(roll, trick));
        }

        if count >= 5 {
            let trick = Trick {
                kind: TrickType::FiveOfAKind,
                dice: Roll::repeated(die, count),
            };
            result.extend(remaining_tricks(roll, trick));
        }

        if count >= 6 {
            result.push(vec![Trick {
                kind: TrickType::SixOfAKind,
                dice: *roll,
            }]);
        }
    }

    if is_straight(roll) {
        result.push(vec![Trick {
            kind: TrickType::Straight,
            dice: *roll,
        }]);
    } else if is_three_pairs(roll) {
        result.push(vec![Trick {
            kind: TrickType::ThreePairs,
            dice: *roll,
        }]);
    } else if is_four_of_a_kind_plus_pair(roll) {
        result.push(vec![Trick {
            kind: TrickType::FourOfAKindPlusPair,
            dice: *roll,
        }]);
    } else if is_two_triplets(roll) {
        result.push(vec![Trick {
            kind: TrickType::TwoTriplets,
            dice: *roll,
        }]);
    }

    result
}

/// Claim `trick` from `roll`, then extend with every decomposition of the
/// remainder.
fn remaining_tricks(roll: &Roll, trick: Trick) -> Vec<Vec<Trick>> {
    let remaining = roll.subtract(trick.dice);

    let mut result = vec![vec![trick]];
    for mut addl_tricks in enumerate_possible_tricks(&remaining) {
        let mut tricks = Vec::with_capacity(addl_tricks.len() + 1);
        tricks.push(trick);
        tricks.append(&mut addl_tricks);
        result.push(tricks);
    }
    result
}

fn is_straight(roll: &Roll) -> bool {
    (1..=NUM_SIDES).all(|die| roll.get_count(die) == 1)
}

fn is_three_pairs(roll: &Roll) -> bool {
    let num_pairs = (1..=NUM_SIDES)
        .filter(|&die| roll.get_count(die) == 2)
        .count();
    num_pairs >= 3
}

fn is_four_of_a_kind_plus_pair(roll: &Roll) -> bool {
    let mut four_of_a_kind = false;
    let mut pair = false;
    for die in 1..=NUM_SIDES {
        match roll.get_count(die) {
            2 => pair = true,
            4 => four_of_a_kind = true,
            _ => {}
        }
    }
    four_of_a_kind && pair
}

fn is_two_triplets(roll: &Roll) -> bool {
    let num_triplets = (1..=NUM_SIDES)
        .filter(|&die| roll.get_count(die) == 3)
        .count();
    num_triplets >= 2
}

/// The maximum total score over all trick decompositions of the exact held
/// multiset. Zero for a multiset with no decomposition.
pub fn calculate_score(held: &Roll) -> u8 {
    enumerate_possible_tricks(held)
        .iter()
        .map(|tricks| {
            tricks
                .iter()
                .fold(0_u8, |sum, trick| sum.saturating_add(trick.score()))
        })
        .max()
        .unwrap_or(0)
}

/// The set of multisets that can be held out of `roll` as a union of
/// disjoint scoring tricks. Empty iff `roll` is a farkle.
pub fn potential_holds(roll: &Roll) -> Vec<Roll> {
    let mut holds: Vec<Roll> = enumerate_possible_tricks(roll)
        .into_iter()
        .map(|tricks| {
            tricks
                .iter()
                .fold(Roll::default(), |acc, trick| acc.combine(trick.dice))
        })
        .collect();

    holds.sort_unstable();
    holds.dedup();
    holds
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use crate::dice::MAX_NUM_DICE;
    use proptest::prelude::*;

    #[test]
    fn test_trick_scores() {
        assert_eq!(2, TrickType::Single1.score());
        assert_eq!(1, TrickType::Single5.score());
        assert_eq!(6, TrickType::Three1s.score());
        assert_eq!(12, TrickType::Three6s.score());
        assert_eq!(20, TrickType::FourOfAKind.score());
        assert_eq!(60, TrickType::SixOfAKind.score());
        assert_eq!(30, TrickType::Straight.score());
        assert_eq!(50, TrickType::TwoTriplets.score());
    }

    #[test]
    fn test_four_of_a_kind_plus_pair_beats_singles() {
        // {1,1,1,1,5,5}: the special pattern (30) beats any decomposition
        // into singles and triples.
        let held = Roll::new(&[1, 1, 1, 5, 1, 5]);
        assert_eq!(30, calculate_score(&held));
    }

    #[test]
    fn test_straight() {
        let roll = Roll::new(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(30, calculate_score(&roll));
        assert!(!potential_holds(&roll).is_empty());
    }

    #[test]
    fn test_farkle_rolls() {
        // no singles of 1/5, no triples, no specials
        assert!(potential_holds(&Roll::new(&[2, 3, 4, 6])).is_empty());
        assert!(potential_holds(&Roll::new(&[2, 2, 3, 4, 6, 6])).is_empty());
        assert!(potential_holds(&Roll::new(&[3])).is_empty());
        assert!(potential_holds(&Roll::new(&[])).is_empty());
    }

    #[test]
    fn test_specials() {
        assert_eq!(30, calculate_score(&Roll::new(&[2, 2, 3, 3, 6, 6])));
        assert_eq!(50, calculate_score(&Roll::new(&[2, 2, 2, 6, 6, 6])));
        assert_eq!(30, calculate_score(&Roll::new(&[4, 4, 4, 4, 6, 6])));
    }

    #[test]
    fn test_simple_scores() {
        assert_eq!(2, calculate_score(&Roll::new(&[1])));
        assert_eq!(1, calculate_score(&Roll::new(&[5])));
        assert_eq!(3, calculate_score(&Roll::new(&[1, 5])));
        assert_eq!(4, calculate_score(&Roll::new(&[2, 2, 2])));
        // three 1s beat three singles
        assert_eq!(6, calculate_score(&Roll::new(&[1, 1, 1])));
        // 4-of-a-kind beats three 5s + single
        assert_eq!(20, calculate_score(&Roll::new(&[5, 5, 5, 5])));
    }

    fn arb_roll() -> impl Strategy<Value = Roll> {
        prop::collection::vec(1_u8..=NUM_SIDES, 0..=MAX_NUM_DICE as usize)
            .prop_map(|dice| Roll::new(&dice))
    }

    proptest! {
        /// Every decomposition's combined dice is one of the potential
        /// holds, and the hold's score dominates the decomposition's.
        #[test]
        fn test_decompositions_project_onto_holds(roll in arb_roll()) {
            let holds = potential_holds(&roll);
            for tricks in enumerate_possible_tricks(&roll) {
                let combined = tricks
                    .iter()
                    .fold(Roll::default(), |acc, trick| acc.combine(trick.dice));
                prop_assert!(holds.contains(&combined));

                let decomp_score = tricks
                    .iter()
                    .fold(0_u8, |sum, trick| sum.saturating_add(trick.score()));
                prop_assert!(calculate_score(&combined) >= decomp_score);
            }
        }

        /// Every hold is a non-empty sub-multiset of the roll with a
        /// positive score.
        #[test]
        fn test_holds_are_scoring_subsets(roll in arb_roll()) {
            for hold in potential_holds(&roll) {
                prop_assert!(roll.is_superset_of(&hold));
                prop_assert!(!hold.is_empty());
                prop_assert!(calculate_score(&hold) > 0);
            }
        }
    }
}
