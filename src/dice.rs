//! The dice kernel: unordered multisets of standard dice, plus the one-time
//! enumeration of every distinct roll with its exact probability.

use crate::{factorial, num_multisets};
use claim::debug_assert_le;
use rand::Rng;
use std::{fmt, str::FromStr};

/// The most dice that can ever be in play at once.
pub const MAX_NUM_DICE: u8 = 6;

/// Faces on a standard die.
pub const NUM_SIDES: u8 = 6;

/// An unordered multiset of 0 to [`MAX_NUM_DICE`] dice, stored as per-face
/// counts. `counts[face]` is the number of dice showing `face`; index 0 is
/// unused.
///
/// A count array is preferred over a sorted tuple: [`Roll::combine`],
/// [`Roll::subtract`], and trick recognition become branch-light vector ops,
/// and canonical form is automatic.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Roll([u8; (NUM_SIDES + 1) as usize]);

impl Roll {
    /// Build a roll from a list of die faces. Panics on a face outside
    /// `1..=6` or more than [`MAX_NUM_DICE`] dice; no legal game input
    /// reaches here with either.
    pub fn new(dice: &[u8]) -> Self {
        assert!(
            dice.len() <= MAX_NUM_DICE as usize,
            "cannot create Roll with {} > max {} dice",
            dice.len(),
            MAX_NUM_DICE,
        );

        let mut roll = Self::default();
        for &die in dice {
            assert!(
                (1..=NUM_SIDES).contains(&die),
                "cannot create Roll with die = {die}"
            );
            roll.0[die as usize] += 1;
        }
        roll
    }

    /// A roll of `count` dice all showing `die`.
    pub fn repeated(die: u8, count: u8) -> Self {
        assert!(
            (1..=NUM_SIDES).contains(&die),
            "cannot create Roll with die = {die}"
        );
        debug_assert_le!(count, MAX_NUM_DICE);

        let mut roll = Self::default();
        roll.0[die as usize] = count;
        roll
    }

    #[inline]
    pub fn get_count(&self, face: u8) -> u8 {
        self.0[face as usize]
    }

    /// The number of dice in this roll, in the range 0 to [`MAX_NUM_DICE`].
    #[inline]
    pub fn num_dice(&self) -> u8 {
        self.0.iter().sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_dice() == 0
    }

    /// Pointwise sum of two rolls.
    pub fn combine(self, other: Self) -> Self {
        let mut out = self;
        for face in 1..=NUM_SIDES as usize {
            out.0[face] = match out.0[face].checked_add(other.0[face]) {
                Some(count) => count,
                None => panic!("combining rolls overflows face {face}"),
            };
        }
        out
    }

    /// Pointwise difference. Panics if `other` is not a sub-multiset of
    /// `self`.
    pub fn subtract(self, other: Self) -> Self {
        let mut out = self;
        for face in 1..=NUM_SIDES {
            let have = out.get_count(face);
            let take = other.get_count(face);
            if take > have {
                panic!("cannot remove {take} {face}s from a roll with only {have}");
            }
            out.0[face as usize] = have - take;
        }
        out
    }

    /// `true` if every face count in `other` is covered by `self`.
    pub fn is_superset_of(&self, other: &Self) -> bool {
        (1..=NUM_SIDES).all(|face| other.get_count(face) <= self.get_count(face))
    }

    /// The dice in this roll, sorted ascending.
    pub fn dice(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.num_dice() as usize);
        for face in 1..=NUM_SIDES {
            for _ in 0..self.get_count(face) {
                out.push(face);
            }
        }
        out
    }

    /// Roll `ndice` fair dice.
    pub fn random<R: Rng>(rng: &mut R, ndice: u8) -> Self {
        debug_assert_le!(ndice, MAX_NUM_DICE);

        let mut roll = Self::default();
        for _ in 0..ndice {
            roll.0[rng.gen_range(1..=NUM_SIDES) as usize] += 1;
        }
        roll
    }

    /// The probability of rolling this multiset with `num_dice` fair dice.
    ///
    /// let n = number of dice in the set
    ///     P = n! / (6^n * ∏_{f∈[1,6]} c_f!)
    ///         where c_f is the count of face f in the set
    pub fn p_roll(&self) -> f64 {
        let n = self.num_dice() as u32;

        let prod: u32 = (1..=NUM_SIDES)
            .map(|face| factorial(self.get_count(face) as u32))
            .product();
        let m = 6_u32.pow(n);

        f64::from(factorial(n)) / f64::from(prod * m)
    }

    /// All distinct rolls of exactly `ndice` dice, in a fixed lexicographic
    /// order.
    pub(crate) fn all_of_size(ndice: u8) -> Vec<Roll> {
        debug_assert_le!(ndice, MAX_NUM_DICE);

        fn rec(face: u8, dice_left: u8, acc: &mut Roll, out: &mut Vec<Roll>) {
            if face == NUM_SIDES {
                acc.0[face as usize] = dice_left;
                out.push(*acc);
                acc.0[face as usize] = 0;
                return;
            }
            for count in 0..=dice_left {
                acc.0[face as usize] = count;
                rec(face + 1, dice_left - count, acc, out);
            }
            acc.0[face as usize] = 0;
        }

        let mut out = Vec::with_capacity(num_multisets(NUM_SIDES as u32, ndice as u32) as usize);
        rec(1, ndice, &mut Roll::default(), &mut out);
        out
    }
}

impl fmt::Display for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dice())
    }
}

impl fmt::Debug for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dice())
    }
}

impl FromStr for Roll {
    type Err = String;

    /// Parse a roll from a digit string like `"115"`, `"1,1,5"`, or
    /// `"[1, 1, 5]"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut roll = Self::default();
        for c in s.chars() {
            match c {
                ' ' | ',' | '[' | ']' => continue,
                '1'..='6' => {
                    let die = (c as u8) - b'0';
                    roll.0[die as usize] += 1;
                }
                _ => return Err(format!("not a valid die: {c}")),
            }
        }

        if roll.num_dice() > MAX_NUM_DICE {
            return Err(format!(
                "too many dice: {} > max {}",
                roll.num_dice(),
                MAX_NUM_DICE
            ));
        }
        Ok(roll)
    }
}

/// A distinct unordered roll, its dense id, and the probability of realizing
/// it over uniform-random rolls of `roll.num_dice()` dice.
#[derive(Copy, Clone, Debug)]
pub struct WeightedRoll {
    pub roll: Roll,
    pub id: u16,
    pub prob: f64,
}

/// Enumerate all distinct rolls of 0..=6 dice, assigning dense sequential
/// ids. The empty roll comes first, so the zero id corresponds to a farkle
/// hold.
pub(crate) fn make_weighted_rolls() -> [Vec<WeightedRoll>; (MAX_NUM_DICE + 1) as usize] {
    let mut next_id: u16 = 0;
    std::array::from_fn(|ndice| {
        Roll::all_of_size(ndice as u8)
            .into_iter()
            .map(|roll| {
                let id = next_id;
                next_id += 1;
                WeightedRoll {
                    roll,
                    id,
                    prob: roll.p_roll(),
                }
            })
            .collect()
    })
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_roll_counts() {
        assert_eq!(0, Roll::new(&[]).num_dice());
        assert_eq!(1, Roll::new(&[1]).num_dice());
        assert_eq!(2, Roll::new(&[4, 2]).num_dice());
        assert_eq!(6, Roll::new(&[6, 5, 4, 3, 2, 1]).num_dice());

        assert_eq!(1, Roll::new(&[6, 5, 4, 3, 2, 1]).get_count(6));
        assert_eq!(3, Roll::new(&[6, 5, 3, 3, 3]).get_count(3));
        assert_eq!(0, Roll::new(&[6, 5, 3, 3, 3]).get_count(1));
        assert_eq!(6, Roll::new(&[3, 3, 3, 3, 3, 3]).get_count(3));
    }

    #[test]
    #[should_panic]
    fn test_new_roll_bad_face() {
        let _ = Roll::new(&[1, 7]);
    }

    #[test]
    #[should_panic]
    fn test_new_roll_too_many() {
        let _ = Roll::new(&[1, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_combine_subtract() {
        let a = Roll::new(&[1, 1, 5]);
        let b = Roll::new(&[1, 2]);
        assert_eq!(Roll::new(&[1, 1, 1, 2, 5]), a.combine(b));
        assert_eq!(Roll::new(&[1, 5]), a.subtract(Roll::new(&[1])));
        assert_eq!(Roll::default(), a.subtract(a));
    }

    #[test]
    #[should_panic]
    fn test_subtract_underflow() {
        let _ = Roll::new(&[1, 5]).subtract(Roll::new(&[2]));
    }

    #[test]
    fn test_roll_probability() {
        assert_relative_eq!(3.0 / 6.0_f64.powi(3), Roll::new(&[1, 1, 3]).p_roll());
        assert_relative_eq!(1.0, Roll::new(&[]).p_roll());

        for n in 1..=MAX_NUM_DICE {
            assert_relative_eq!(
                1.0,
                Roll::all_of_size(n).iter().map(Roll::p_roll).sum::<f64>(),
                epsilon = 1e-12,
            );
        }
    }

    #[test]
    fn test_all_of_size_counts() {
        let expected = [1, 6, 21, 56, 126, 252, 462];
        for (n, expected) in expected.into_iter().enumerate() {
            let rolls = Roll::all_of_size(n as u8);
            assert_eq!(expected, rolls.len());

            // all distinct, all the right size
            let set = HashSet::<Roll>::from_iter(rolls.iter().copied());
            assert_eq!(expected, set.len());
            assert!(rolls.iter().all(|roll| roll.num_dice() == n as u8));
        }
    }

    #[test]
    fn test_make_weighted_rolls_ids() {
        let all_rolls = make_weighted_rolls();

        // the empty roll always gets id 0
        assert_eq!(0, all_rolls[0][0].id);
        assert!(all_rolls[0][0].roll.is_empty());

        // ids are dense and sequential across sizes
        let mut expected_id = 0;
        for rolls in &all_rolls {
            for wroll in rolls {
                assert_eq!(expected_id, wroll.id);
                expected_id += 1;
            }
        }
        assert_eq!(924, expected_id);
    }

    #[test]
    fn test_parse_display_round_trip() {
        for s in ["115", "1,1,5", "[1, 1, 5]"] {
            assert_eq!(Roll::new(&[1, 1, 5]), Roll::from_str(s).unwrap());
        }
        assert_eq!(Roll::default(), Roll::from_str("").unwrap());
        assert!(Roll::from_str("117").is_err());
        assert!(Roll::from_str("1111111").is_err());

        assert_eq!("[1, 1, 5]", Roll::new(&[5, 1, 1]).to_string());
    }

    fn arb_roll() -> impl Strategy<Value = Roll> {
        prop::collection::vec(1_u8..=NUM_SIDES, 0..=MAX_NUM_DICE as usize)
            .prop_map(|dice| Roll::new(&dice))
    }

    proptest! {
        #[test]
        fn test_display_parse_round_trip(roll in arb_roll()) {
            prop_assert_eq!(roll, Roll::from_str(&roll.to_string()).unwrap());
        }

        #[test]
        fn test_subtract_combine_round_trip(a in arb_roll(), b in arb_roll()) {
            prop_assume!(a.is_superset_of(&b));
            prop_assert_eq!(a, a.subtract(b).combine(b));
        }
    }

    #[test]
    fn test_random_roll() {
        let mut rng = rand::rngs::mock::StepRng::new(0, 0x9e37_79b9_7f4a_7c15);
        for ndice in 0..=MAX_NUM_DICE {
            for _ in 0..100 {
                let roll = Roll::random(&mut rng, ndice);
                assert_eq!(ndice, roll.num_dice());
            }
        }
    }
}
