//! Interactive play against the solved table: the human sits in seat 1, the
//! computer players pick their actions straight from the value table, and
//! every human action is graded against the optimal one.

use crate::{
    action::{apply_action, Action},
    db::Db,
    dice::Roll,
    score::{INCR, ON_BOARD_MIN},
    solve::{select_action, unrotate},
    state::GameState,
    tables::Tables,
    Error,
};
use rand::Rng;
use std::{
    io::{self, BufRead, Write},
    str::FromStr,
};
use tabular::{row, Table};

pub fn play<D: Db + ?Sized, R: Rng>(tables: &Tables, db: &D, rng: &mut R) -> Result<(), Error> {
    let num_players = db.num_players();
    let mut state = GameState::new(num_players);

    // seat of the player at `state.player_scores[0]`; seat 0 is the human
    let mut current_seat = 0_usize;

    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        if state.is_game_over() {
            announce_winner(&state, current_seat);
            return Ok(());
        }

        let roll = Roll::random(rng, state.num_dice_to_roll);
        println!("Player {} rolled: {roll}", current_seat + 1);
        let roll_id = tables.roll_id(&roll);

        let action = if tables.is_farkle(roll_id) {
            println!("...farkle!");
            Action::FARKLE
        } else if current_seat == 0 {
            let action = prompt_action(tables, &state, roll_id, &roll, &mut input)?;
            grade_action(tables, &state, roll_id, action, db);
            action
        } else {
            let (action, _) = select_action(tables, &state, roll_id, db);
            println!("...selected action: {}", tables.describe_action(action));
            action
        };

        state = apply_action(tables, state, action);
        if !action.continue_rolling {
            current_seat = (current_seat + 1) % num_players as usize;
            print_scores(&state, current_seat);
        }
    }
}

/// Ask the human which dice to keep and whether to keep rolling.
fn prompt_action<B: BufRead>(
    tables: &Tables,
    state: &GameState,
    roll_id: u16,
    roll: &Roll,
    input: &mut B,
) -> Result<Action, Error> {
    let held = prompt_held_dice(tables, roll_id, roll, input)?;
    let held_dice_id = tables.roll_id(&held);

    let round_total = state
        .score_this_round
        .saturating_add(tables.score_cache[held_dice_id as usize]);
    let may_stop = state.player_scores[0] > 0 || round_total >= ON_BOARD_MIN;
    let continue_rolling = if may_stop {
        prompt_continue(input)?
    } else {
        // can't bank below the 500 first-round minimum
        true
    };

    Ok(Action {
        held_dice_id,
        continue_rolling,
    })
}

fn prompt_held_dice<B: BufRead>(
    tables: &Tables,
    roll_id: u16,
    roll: &Roll,
    input: &mut B,
) -> Result<Roll, Error> {
    loop {
        print!("...enter dice to keep: ");
        flush_stdout()?;

        match parse_held_dice(tables, roll_id, roll, &read_line(input)?) {
            Ok(held) => return Ok(held),
            Err(err) => println!("......{err}"),
        }
    }
}

fn parse_held_dice(tables: &Tables, roll_id: u16, roll: &Roll, line: &str) -> Result<Roll, String> {
    let held = Roll::from_str(line.trim())?;
    if !roll.is_superset_of(&held) {
        return Err(format!("can't hold {held}, only rolled {roll}"));
    }
    if !tables.is_valid_hold(roll_id, &held) {
        return Err(format!("{held} is not a set of scoring tricks"));
    }
    Ok(held)
}

fn prompt_continue<B: BufRead>(input: &mut B) -> Result<bool, Error> {
    loop {
        print!("...continue rolling (Y/N)? ");
        flush_stdout()?;

        let line = read_line(input)?;
        match parse_yes_no(&line) {
            Some(continue_rolling) => return Ok(continue_rolling),
            None => println!("......don't understand '{}'", line.trim()),
        }
    }
}

fn parse_yes_no(line: &str) -> Option<bool> {
    match line.trim().to_uppercase().as_str() {
        "Y" | "YES" | "1" => Some(true),
        "N" | "NO" | "0" => Some(false),
        _ => None,
    }
}

/// Compare the human's action against the table's optimal one.
fn grade_action<D: Db + ?Sized>(
    tables: &Tables,
    state: &GameState,
    roll_id: u16,
    action: Action,
    db: &D,
) {
    let (opt_action, opt_p_win) = select_action(tables, state, roll_id, db);
    if action == opt_action {
        println!("...selected action is optimal!");
        return;
    }

    let new_state = apply_action(tables, *state, action);
    let mut p_win = db.get(new_state.id());
    if !action.continue_rolling {
        p_win = unrotate(p_win, state.num_players);
    }

    println!(
        "...optimal action was {} with p(win) = {:.1}%",
        tables.describe_action(opt_action),
        100.0 * opt_p_win[0],
    );
    println!(
        "...selected action has p(win) = {:.1}% ({:+.1}%)",
        100.0 * p_win[0],
        100.0 * (p_win[0] - opt_p_win[0]),
    );
}

fn print_scores(state: &GameState, current_seat: usize) {
    let n = state.num_players as usize;
    let mut table = Table::new("{:>}  {:>}");
    table.add_row(row!("player", "score"));
    for i in 0..n {
        let seat = (current_seat + i) % n;
        table.add_row(row!(
            format!("Player {}", seat + 1),
            u32::from(state.player_scores[i]) * u32::from(INCR),
        ));
    }
    println!("{table}");
}

fn announce_winner(state: &GameState, current_seat: usize) {
    let n = state.num_players as usize;
    let winning_score = state.highest_score();
    for i in 0..n {
        if state.player_scores[i] == winning_score {
            let seat = (current_seat + i) % n;
            println!(
                "Player {} wins with {} points!",
                seat + 1,
                u32::from(winning_score) * u32::from(INCR),
            );
        }
    }
}

fn read_line<B: BufRead>(input: &mut B) -> Result<String, Error> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|err| Error::io("<stdin>", err))?;
    Ok(line)
}

fn flush_stdout() -> Result<(), Error> {
    io::stdout()
        .flush()
        .map_err(|err| Error::io("<stdout>", err))
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(Some(true), parse_yes_no("y\n"));
        assert_eq!(Some(true), parse_yes_no("YES"));
        assert_eq!(Some(true), parse_yes_no(" 1 "));
        assert_eq!(Some(false), parse_yes_no("n"));
        assert_eq!(Some(false), parse_yes_no("No\n"));
        assert_eq!(Some(false), parse_yes_no("0"));
        assert_eq!(None, parse_yes_no("maybe"));
        assert_eq!(None, parse_yes_no(""));
    }

    #[test]
    fn test_parse_held_dice() {
        let tables = Tables::new();
        let roll = Roll::new(&[1, 2, 3, 5, 6, 6]);
        let roll_id = tables.roll_id(&roll);

        assert_eq!(
            Roll::new(&[1, 5]),
            parse_held_dice(&tables, roll_id, &roll, "15\n").unwrap()
        );
        assert_eq!(
            Roll::new(&[1]),
            parse_held_dice(&tables, roll_id, &roll, " 1 ").unwrap()
        );

        // not in the roll
        assert!(parse_held_dice(&tables, roll_id, &roll, "11").is_err());
        // in the roll, but not a scoring hold
        assert!(parse_held_dice(&tables, roll_id, &roll, "2").is_err());
        // not dice at all
        assert!(parse_held_dice(&tables, roll_id, &roll, "x").is_err());
    }
}
