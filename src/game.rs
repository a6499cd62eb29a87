use rand::{Rng, rngs::ThreadRng};
use tracing::info;

use crate::{
    board::{Board, MarkOutcome, RevealOutcome, Rules, build_board_with_rng},
    error::Result,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub width: usize,
    pub height: usize,
    pub mines: usize,
    pub rules: Rules,
}

impl Config {
    pub const fn new(width: usize, height: usize, mines: usize) -> Self {
        Self {
            width,
            height,
            mines,
            rules: Rules {
                flood_reveal: true,
                chord_clear: true,
            },
        }
    }

    pub const fn beginner() -> Self {
        Self::new(9, 9, 10)
    }

    pub const fn intermediate() -> Self {
        Self::new(16, 16, 40)
    }

    pub const fn expert() -> Self {
        Self::new(30, 16, 99)
    }

    pub const fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::expert()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameState {
    Alive,
    Dead,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CursorDirection {
    Up,
    Left,
    Right,
    Down,
}

/// The live board plus everything the player steers it with.
///
/// While the game is dead only `restart`, `restart_with` and the cheat toggle
/// have any effect.
pub struct Game<R = ThreadRng> {
    config: Config,
    board: Board,
    cursor: (usize, usize),
    state: GameState,
    cheat: bool,
    rng: R,
}

impl Game {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_rng(config, rand::rng())
    }
}

impl<R: Rng> Game<R> {
    pub fn with_rng(config: Config, mut rng: R) -> Result<Self> {
        let board = Self::build(&config, &mut rng)?;
        Ok(Self {
            config,
            board,
            cursor: (0, 0),
            state: GameState::Alive,
            cheat: false,
            rng,
        })
    }

    fn build(config: &Config, rng: &mut R) -> Result<Board> {
        Ok(build_board_with_rng(config.width, config.height, config.mines, rng)?
            .with_rules(config.rules))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_dead(&self) -> bool {
        self.state == GameState::Dead
    }

    /// Whether the player asked to preview the whole board. The board itself
    /// is untouched by this.
    pub fn cheat(&self) -> bool {
        self.cheat
    }

    pub fn set_cheat(&mut self, cheat: bool) {
        self.cheat = cheat;
    }

    pub fn toggle_cheat(&mut self) {
        self.cheat = !self.cheat;
    }

    fn kill(&mut self) {
        match self.board.tripped_mine() {
            Some((x, y)) => info!(x, y, "bot revealed, game over"),
            None => info!("bot revealed, game over"),
        }
        self.state = GameState::Dead;
    }

    fn settle(&mut self, outcome: RevealOutcome) -> RevealOutcome {
        if outcome.hit_mine() {
            self.kill();
        }
        outcome
    }

    pub fn reveal(&mut self) -> Result<RevealOutcome> {
        if self.is_dead() {
            return Ok(RevealOutcome::NoChange);
        }
        let outcome = self.board.open(self.cursor.0, self.cursor.1)?;
        Ok(self.settle(outcome))
    }

    pub fn flag(&mut self) -> Result<MarkOutcome> {
        if self.is_dead() {
            return Ok(MarkOutcome::NoChange);
        }
        self.board.flag(self.cursor.0, self.cursor.1)
    }

    pub fn clear(&mut self) -> Result<RevealOutcome> {
        if self.is_dead() {
            return Ok(RevealOutcome::NoChange);
        }
        let outcome = self.board.clear(self.cursor.0, self.cursor.1)?;
        Ok(self.settle(outcome))
    }

    /// Throws the board away and deals a new one of the same shape.
    pub fn restart(&mut self) -> Result<()> {
        self.board = Self::build(&self.config, &mut self.rng)?;
        self.state = GameState::Alive;
        self.cursor = (0, 0);
        info!(
            width = self.config.width,
            height = self.config.height,
            mines = self.config.mines,
            "restarted"
        );
        Ok(())
    }

    /// Starts over with a different configuration. On error the current game
    /// is left as it was.
    pub fn restart_with(&mut self, config: Config) -> Result<()> {
        self.board = Self::build(&config, &mut self.rng)?;
        self.config = config;
        self.state = GameState::Alive;
        self.cheat = false;
        self.cursor.0 = self.cursor.0.min(config.width - 1);
        self.cursor.1 = self.cursor.1.min(config.height - 1);
        info!(
            width = config.width,
            height = config.height,
            mines = config.mines,
            "restarted with new configuration"
        );
        Ok(())
    }

    pub fn move_cursor(&mut self, direction: CursorDirection) {
        if self.is_dead() {
            return;
        }
        match direction {
            CursorDirection::Up => self.cursor.1 = self.cursor.1.saturating_sub(1),
            CursorDirection::Down => self.cursor.1 = self.cursor.1.saturating_add(1),
            CursorDirection::Left => self.cursor.0 = self.cursor.0.saturating_sub(1),
            CursorDirection::Right => self.cursor.0 = self.cursor.0.saturating_add(1),
        }
        self.cursor.0 = self.cursor.0.min(self.board.width() - 1);
        self.cursor.1 = self.cursor.1.min(self.board.height() - 1);
    }

    pub fn set_cursor(&mut self, x: usize, y: usize) -> Result<()> {
        self.board.index(x, y)?;
        if !self.is_dead() {
            self.cursor = (x, y);
        }
        Ok(())
    }
}
