//! The command-line surface: a tiny `Command` trait over `pico_args`, one
//! struct per subcommand.

use crate::{
    db::{Db, FileDb},
    play,
    solve::solve,
    state::{GameState, MAX_NUM_PLAYERS},
    tables::Tables,
};
use std::{fmt, path::PathBuf, sync::RwLock, thread};

/// The enumerator's DFS recursion is as deep as the longest possible game,
/// so the solver runs on its own thread with a generous stack reservation.
const SOLVER_STACK_SIZE: usize = 1 << 30;

///////////////////////////
// String parser helpers //
///////////////////////////

fn parse_opt<T>(label: &'static str, opt_s: Option<&str>) -> Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    opt_s
        .map(str::parse)
        .transpose()
        .map_err(|err| format!("invalid {label}: {err}"))
}

//////////////////////
// CLI Args Wrapper //
//////////////////////

pub struct Args(pico_args::Arguments);

impl Args {
    pub fn new(inner: pico_args::Arguments) -> Self {
        Self(inner)
    }

    fn subcommand(&mut self) -> Result<Option<String>, String> {
        self.0.subcommand().map_err(|err| err.to_string())
    }

    fn opt_value(&mut self, keys: impl Into<pico_args::Keys>) -> Result<Option<String>, String> {
        self.0
            .opt_value_from_fn(keys, |s| Result::<_, pico_args::Error>::Ok(s.to_owned()))
            .map_err(|err| err.to_string())
    }

    fn expect_finished(self) -> Result<(), String> {
        let remaining = self.0.finish();
        if !remaining.is_empty() {
            Err(format!("unexpected arguments left: '{remaining:?}'"))
        } else {
            Ok(())
        }
    }

    fn maybe_help(&mut self, usage: &str) {
        if self.0.contains(["-h", "--help"]) {
            print!("{usage}");
            std::process::exit(0);
        }
    }
}

///////////////////
// Command trait //
///////////////////

pub trait Command: Sized {
    const USAGE: &'static str;

    type Output: fmt::Display;

    fn try_from_cli_args(args: Args) -> Result<Self, String>;
    fn run(self) -> Result<Self::Output, String>;
}

//////////////////
// SolveCommand //
//////////////////

#[derive(Clone, Debug)]
pub struct SolveCommand {
    num_players: u8,
    games: PathBuf,
    db: PathBuf,
    num_iter: u32,
    work_dir: PathBuf,
}

impl SolveCommand {
    pub fn try_from_str_args(
        num_players: Option<&str>,
        games: Option<&str>,
        db: Option<&str>,
        num_iter: Option<&str>,
        work_dir: Option<&str>,
    ) -> Result<Self, String> {
        let num_players: u8 = parse_opt("num players", num_players)?.unwrap_or(2);
        if !(1..=MAX_NUM_PLAYERS as u8).contains(&num_players) {
            return Err(format!(
                "num players must be in 1..={MAX_NUM_PLAYERS}, got {num_players}"
            ));
        }

        Ok(Self {
            num_players,
            games: parse_opt("games path", games)?
                .unwrap_or_else(|| PathBuf::from(format!("{num_players}player.games"))),
            db: parse_opt("db path", db)?
                .unwrap_or_else(|| PathBuf::from(format!("{num_players}player.db"))),
            num_iter: parse_opt("num iterations", num_iter)?.unwrap_or(10),
            work_dir: parse_opt("work dir", work_dir)?.unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

impl Command for SolveCommand {
    const USAGE: &'static str = "\
farkle solve - compute optimal win probabilities for every game state

USAGE:
    farkle solve [option ...]

EXAMPLES:
    farkle solve
    farkle solve -n 2 --db 2player.db --num-iter 10

OPTIONS:
    · --num-players / -n players (default: 2)
      Number of players, 1..=4. Beware: the value table is
      8 · players · 6 · 256^(players+1) bytes on disk.

    · --games path (default: <n>player.games)
      The sorted-states file. Built on the first run, reused afterwards.

    · --db path (default: <n>player.db)
      The value table. Created and filled with a neutral prior if missing;
      a partially solved table is resumed and refined.

    · --num-iter / -i iterations (default: 10)
      Full value-iteration passes. Extra passes converge the
      self-referential values created by chains of farkles.

    · --work-dir path (default: .)
      Scratch directory for sort runs and the depth map.
";

    type Output = String;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(Self::USAGE);

        let num_players = args.opt_value(["-n", "--num-players"])?;
        let games = args.opt_value("--games")?;
        let db = args.opt_value("--db")?;
        let num_iter = args.opt_value(["-i", "--num-iter"])?;
        let work_dir = args.opt_value("--work-dir")?;
        args.expect_finished()?;

        Self::try_from_str_args(
            num_players.as_deref(),
            games.as_deref(),
            db.as_deref(),
            num_iter.as_deref(),
            work_dir.as_deref(),
        )
    }

    fn run(self) -> Result<Self::Output, String> {
        let tables = time!("build lookup tables", Tables::new());

        let file_db = FileDb::open(&self.db, self.num_players).map_err(|err| err.to_string())?;
        let db = RwLock::new(file_db);

        thread::scope(|scope| {
            thread::Builder::new()
                .name("solver".to_string())
                .stack_size(SOLVER_STACK_SIZE)
                .spawn_scoped(scope, || {
                    solve(&tables, &db, &self.games, &self.work_dir, self.num_iter)
                })
                .map_err(|err| err.to_string())?
                .join()
                .expect("solver thread panicked")
                .map_err(|err| err.to_string())
        })?;

        let file_db = db.into_inner().expect("value table lock poisoned");
        let p_win = file_db.get(GameState::new(self.num_players).id());
        file_db.close().map_err(|err| err.to_string())?;

        Ok(format!(
            "p(win) at the initial state: {:?}",
            &p_win[..self.num_players as usize],
        ))
    }
}

/////////////////
// PlayCommand //
/////////////////

#[derive(Clone, Debug)]
pub struct PlayCommand {
    num_players: u8,
    db: PathBuf,
}

impl PlayCommand {
    pub fn try_from_str_args(num_players: Option<&str>, db: Option<&str>) -> Result<Self, String> {
        let num_players: u8 = parse_opt("num players", num_players)?.unwrap_or(2);
        if !(1..=MAX_NUM_PLAYERS as u8).contains(&num_players) {
            return Err(format!(
                "num players must be in 1..={MAX_NUM_PLAYERS}, got {num_players}"
            ));
        }

        Ok(Self {
            num_players,
            db: parse_opt("db path", db)?
                .unwrap_or_else(|| PathBuf::from(format!("{num_players}player.db"))),
        })
    }
}

impl Command for PlayCommand {
    const USAGE: &'static str = "\
farkle play - play against the solved table

USAGE:
    farkle play [option ...]

OPTIONS:
    · --num-players / -n players (default: 2)
      Number of players; must match the solved table.

    · --db path (default: <n>player.db)
      The value table produced by `farkle solve`.
";

    type Output = String;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(Self::USAGE);

        let num_players = args.opt_value(["-n", "--num-players"])?;
        let db = args.opt_value("--db")?;
        args.expect_finished()?;

        Self::try_from_str_args(num_players.as_deref(), db.as_deref())
    }

    fn run(self) -> Result<Self::Output, String> {
        if !self.db.exists() {
            return Err(format!(
                "no value table at {}; run `farkle solve` first",
                self.db.display()
            ));
        }

        let tables = time!("build lookup tables", Tables::new());
        let db = FileDb::open(&self.db, self.num_players).map_err(|err| err.to_string())?;

        play::play(&tables, &db, &mut rand::thread_rng()).map_err(|err| err.to_string())?;
        db.close().map_err(|err| err.to_string())?;

        Ok("thanks for playing!".to_string())
    }
}

/////////////////
// BaseCommand //
/////////////////

#[derive(Debug)]
pub enum BaseCommand {
    Solve(SolveCommand),
    Play(PlayCommand),
}

impl Command for BaseCommand {
    const USAGE: &'static str = "\
farkle - a solver for the dice game Farkle!

USAGE:
    farkle [option ...] <subcommand>

SUBCOMMANDS:
    · farkle solve - compute optimal win probabilities for every game state
    · farkle play - play against the solved table
";

    type Output = String;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        let maybe_subcommand = args.subcommand()?;

        match maybe_subcommand.as_deref() {
            Some("solve") => Ok(Self::Solve(SolveCommand::try_from_cli_args(args)?)),
            Some("play") => Ok(Self::Play(PlayCommand::try_from_cli_args(args)?)),
            Some(command) => Err(format!("'{command}' is not a recognized command")),
            None => {
                args.maybe_help(Self::USAGE);
                Err("no subcommand specified".to_string())
            }
        }
    }

    fn run(self) -> Result<String, String> {
        match self {
            Self::Solve(cmd) => cmd.run(),
            Self::Play(cmd) => cmd.run(),
        }
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_solve_command_defaults() {
        let cmd = SolveCommand::try_from_str_args(None, None, None, None, None).unwrap();
        assert_eq!(2, cmd.num_players);
        assert_eq!(PathBuf::from("2player.games"), cmd.games);
        assert_eq!(PathBuf::from("2player.db"), cmd.db);
        assert_eq!(10, cmd.num_iter);
        assert_eq!(PathBuf::from("."), cmd.work_dir);
    }

    #[test]
    fn test_solve_command_args() {
        let cmd = SolveCommand::try_from_str_args(
            Some("3"),
            Some("states.bin"),
            Some("table.db"),
            Some("5"),
            Some("/tmp"),
        )
        .unwrap();
        assert_eq!(3, cmd.num_players);
        assert_eq!(PathBuf::from("states.bin"), cmd.games);
        assert_eq!(PathBuf::from("table.db"), cmd.db);
        assert_eq!(5, cmd.num_iter);
        assert_eq!(PathBuf::from("/tmp"), cmd.work_dir);
    }

    #[test]
    fn test_bad_player_counts() {
        assert!(SolveCommand::try_from_str_args(Some("0"), None, None, None, None).is_err());
        assert!(SolveCommand::try_from_str_args(Some("5"), None, None, None, None).is_err());
        assert!(SolveCommand::try_from_str_args(Some("two"), None, None, None, None).is_err());
        assert!(PlayCommand::try_from_str_args(Some("9"), None).is_err());
    }
}
