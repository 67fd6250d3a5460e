//! The value-iteration engine: optimal action selection against the value
//! table, per-depth parallel sweeps over the sorted state stream, and the
//! top-level solve driver.

use crate::{
    action::{apply_action, Action},
    db::Db,
    enumerate::{enumerate_states, iter_states, save_states},
    score::ON_BOARD_MIN,
    sort::StateSorter,
    state::{num_distinct_states, GameState, MAX_NUM_PLAYERS},
    tables::Tables,
    Error,
};
use crossbeam_channel::{bounded, Receiver};
use log::{debug, info};
use std::{path::Path, sync::RwLock, thread};

/// Database writes are batched per worker to cut write-lock contention.
const BATCH_SIZE: usize = 1024;

/// The value vector of a finished game: each player at the top score gets an
/// equal share of the win, everyone else zero.
pub fn end_game_value(state: &GameState) -> [f64; MAX_NUM_PLAYERS] {
    let n = state.num_players as usize;
    let winning_score = state.highest_score();
    let num_winners = state.player_scores[..n]
        .iter()
        .filter(|&&score| score == winning_score)
        .count();

    // how ties should count toward "win probability" is unclear; split the
    // win evenly among all players at the top score
    let p_win = 1.0 / num_winners as f64;
    let mut result = [0.0; MAX_NUM_PLAYERS];
    for (slot, &score) in result[..n].iter_mut().zip(&state.player_scores[..n]) {
        if score == winning_score {
            *slot = p_win;
        }
    }
    result
}

/// Rotate a successor's value vector back one player, so that index 0 names
/// the same player in both the current state and the successor.
pub fn unrotate(p_win: [f64; MAX_NUM_PLAYERS], num_players: u8) -> [f64; MAX_NUM_PLAYERS] {
    let n = num_players as usize;
    let mut result = [0.0; MAX_NUM_PLAYERS];
    result[0] = p_win[n - 1];
    result[1..n].copy_from_slice(&p_win[..n - 1]);
    result
}

/// Find the action after `roll_id` that maximizes the current player's win
/// probability, reading successor values from `db`.
///
/// A roll with no actions is a farkle: the sentinel action is applied and
/// its successor's value returned. If every legal action leads to a zero
/// current-player probability, the zero-initialized best (the farkle
/// sentinel) is kept.
pub fn select_action<D: Db + ?Sized>(
    tables: &Tables,
    state: &GameState,
    roll_id: u16,
    db: &D,
) -> (Action, [f64; MAX_NUM_PLAYERS]) {
    let num_players = state.num_players;
    let not_yet_on_board = state.player_scores[0] == 0;

    let mut best_action = Action::FARKLE;
    let mut best_p_win = [0.0; MAX_NUM_PLAYERS];

    let potential_actions = tables.potential_actions(roll_id);
    for &action in potential_actions {
        let mut action = action;
        if state.score_this_round == u8::MAX && action.continue_rolling {
            // the round score saturated. the chance of legitimately
            // exceeding 12,750 in one round is negligible; approximate by
            // valuing the action as a stop
            action.continue_rolling = false;
        }

        let new_state = apply_action(tables, *state, action);
        if not_yet_on_board
            && !action.continue_rolling
            && new_state.player_scores[num_players as usize - 1] < ON_BOARD_MIN
        {
            // not a valid state: must bank at least 500 to get on the board
            continue;
        }

        let mut p_subtree = db.get(new_state.id());
        if !action.continue_rolling {
            // the successor advanced to the next player, so its vector is
            // rotated relative to ours
            p_subtree = unrotate(p_subtree, num_players);
        }
        if p_subtree[0] > best_p_win[0] {
            best_p_win = p_subtree;
            best_action = action;
        }
    }

    if potential_actions.is_empty() {
        let new_state = apply_action(tables, *state, best_action);
        best_p_win = unrotate(db.get(new_state.id()), num_players);
    }

    (best_action, best_p_win)
}

/// The expected value vector of a non-terminal state: the probability-
/// weighted value of playing optimally after each possible roll.
pub fn calc_state_value<D: Db + ?Sized>(
    tables: &Tables,
    state: &GameState,
    db: &D,
) -> [f64; MAX_NUM_PLAYERS] {
    let mut p_win = [0.0; MAX_NUM_PLAYERS];
    for wroll in &tables.all_rolls[state.num_dice_to_roll as usize] {
        let (_, p_subgame) = select_action(tables, state, wroll.id, db);
        for (total, p) in p_win[..state.num_players as usize]
            .iter_mut()
            .zip(&p_subgame)
        {
            *total += wroll.prob * p;
        }
    }
    p_win
}

/// Write the exact value of every terminal state into the table. Terminal
/// states are never re-visited by the update passes, so one dense sweep over
/// the id space suffices.
pub fn seed_end_game_values<D: Db + ?Sized>(db: &mut D) {
    let num_players = db.num_players();
    info!("seeding end-game values for {num_players}-player states");

    let mut seeded = 0_u64;
    for id in 0..num_distinct_states(num_players) {
        let state = GameState::from_id(id, num_players);
        if state.is_game_over() {
            db.put(id, end_game_value(&state));
            seeded += 1;
        }
    }
    info!("seeded {seeded} end-game states");
}

/// Recalculate the value of every state in the sorted stream, updating the
/// table in place.
///
/// Runs of equal depth are dispatched to a worker pool over a bounded
/// channel; the channel is closed and the pool joined before the next depth
/// group starts, so every state's successors (all at strictly lower depth)
/// hold final values when it is computed.
pub fn update_all<D, I>(tables: &Tables, db: &RwLock<D>, states: I) -> Result<(), Error>
where
    D: Db,
    I: IntoIterator<Item = Result<(u16, GameState), Error>>,
{
    let num_workers = num_cpus::get();
    thread::scope(|scope| {
        let mut current_depth = 0_u16;
        let (mut tx, rx) = bounded(num_workers);
        let mut workers = spawn_workers(scope, tables, db, rx, num_workers);

        for record in states {
            let (depth, state) = record?;
            if depth != current_depth {
                // barrier: wait for the previous depth to complete
                drop(tx);
                join_workers(&mut workers);

                debug!("processing game states with depth={depth}");
                current_depth = depth;
                let (new_tx, new_rx) = bounded(num_workers);
                tx = new_tx;
                workers = spawn_workers(scope, tables, db, new_rx, num_workers);
            }

            tx.send(state).expect("update workers exited early");
        }

        drop(tx);
        join_workers(&mut workers);
        Ok(())
    })
}

fn spawn_workers<'scope, D: Db>(
    scope: &'scope thread::Scope<'scope, '_>,
    tables: &'scope Tables,
    db: &'scope RwLock<D>,
    rx: Receiver<GameState>,
    num_workers: usize,
) -> Vec<thread::ScopedJoinHandle<'scope, ()>> {
    (0..num_workers)
        .map(|_| {
            let rx = rx.clone();
            scope.spawn(move || update_worker(tables, db, rx))
        })
        .collect()
}

fn join_workers(workers: &mut Vec<thread::ScopedJoinHandle<'_, ()>>) {
    for worker in workers.drain(..) {
        worker.join().expect("update worker panicked");
    }
}

fn update_worker<D: Db>(tables: &Tables, db: &RwLock<D>, rx: Receiver<GameState>) {
    let mut batch: Vec<(u64, [f64; MAX_NUM_PLAYERS])> = Vec::with_capacity(BATCH_SIZE);
    for state in rx.iter() {
        let p_win = if state.is_game_over() {
            end_game_value(&state)
        } else {
            let table = db.read().expect("value table lock poisoned");
            calc_state_value(tables, &state, &*table)
        };

        batch.push((state.id(), p_win));
        if batch.len() == BATCH_SIZE {
            flush_batch(db, &mut batch);
        }
    }
    flush_batch(db, &mut batch);
}

fn flush_batch<D: Db>(db: &RwLock<D>, batch: &mut Vec<(u64, [f64; MAX_NUM_PLAYERS])>) {
    let mut table = db.write().expect("value table lock poisoned");
    for (id, p_win) in batch.drain(..) {
        table.put(id, p_win);
    }
}

/// Top-level solve: build (or reuse) the sorted-states file, seed terminal
/// values, then run `num_iter` full value-iteration passes.
///
/// Iterating the whole pass converges the self-referential values created
/// by all-farkle loops; each pass also logs the initial state's value
/// vector, which should settle to the solved win probabilities.
pub fn solve<D: Db>(
    tables: &Tables,
    db: &RwLock<D>,
    games_path: &Path,
    work_dir: &Path,
    num_iter: u32,
) -> Result<(), Error> {
    let num_players = db
        .read()
        .expect("value table lock poisoned")
        .num_players();

    if !games_path.exists() {
        info!(
            "enumerating all {} {num_players}-player game states",
            num_distinct_states(num_players),
        );
        let mut sorter = StateSorter::new(work_dir, num_players);
        let mut count = 0_u64;
        enumerate_states(tables, num_players, work_dir, |depth, state| {
            count += 1;
            if count % 100_000 == 0 {
                info!("...{count}");
            }
            sorter.append(depth, state)
        })?;

        info!("sorting {count} game states by depth");
        save_states(games_path, sorter.sort()?)?;
    }

    {
        let mut table = db.write().expect("value table lock poisoned");
        seed_end_game_values(&mut *table);
    }

    let initial_state = GameState::new(num_players);
    for cycle in 1..=num_iter {
        update_all(tables, db, iter_states(games_path, num_players)?)?;

        let p_win = db
            .read()
            .expect("value table lock poisoned")
            .get(initial_state.id());
        info!(
            "cycle {cycle}/{num_iter}: initial state win probabilities: {:?}",
            &p_win[..num_players as usize],
        );
    }

    Ok(())
}

///////////
// Tests //
///////////
