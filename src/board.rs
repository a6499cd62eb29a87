use std::ops::BitOr;

use rand::{Rng, seq::SliceRandom};
use tracing::{debug, info, warn};

use crate::error::{BoardError, Result};

/// Optional engine behaviors. Both are on in a regular game.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rules {
    /// Revealing a cell without mined neighbors also reveals its neighbors.
    pub flood_reveal: bool,
    /// `Board::clear` reveals the unflagged neighbors of a satisfied cell.
    pub chord_clear: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            flood_reveal: true,
            chord_clear: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    is_mined: bool,
    is_open: bool,
    is_flagged: bool,
    neighboring_mines: u8,
    neighbors: Vec<usize>,
}

impl Cell {
    pub fn is_mined(&self) -> bool {
        self.is_mined
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_flagged(&self) -> bool {
        self.is_flagged
    }

    pub fn neighboring_mines(&self) -> u8 {
        self.neighboring_mines
    }

    /// Board indices of the adjacent cells, in row-major order.
    pub fn neighbors(&self) -> &[usize] {
        &self.neighbors
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    HitMine,
}

impl RevealOutcome {
    pub const fn has_update(self) -> bool {
        !matches!(self, Self::NoChange)
    }

    pub const fn hit_mine(self) -> bool {
        matches!(self, Self::HitMine)
    }
}

impl BitOr for RevealOutcome {
    type Output = RevealOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use RevealOutcome::*;
        match (self, rhs) {
            (HitMine, _) | (_, HitMine) => HitMine,
            (Revealed, _) | (_, Revealed) => Revealed,
            (NoChange, NoChange) => NoChange,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
    NoChange,
    Changed,
}

/// A rectangular minefield stored as a flat row-major arena of cells.
#[derive(Clone, Debug)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    rules: Rules,
    tripped_mine: Option<usize>,
}

/// Builds a board with `mine_count` mines spread uniformly at random.
///
/// A `mine_count` above `width * height` mines every cell. There is no safe
/// first click.
pub fn build_board(width: usize, height: usize, mine_count: usize) -> Result<Board> {
    build_board_with_rng(width, height, mine_count, &mut rand::rng())
}

pub fn build_board_with_rng<R: Rng + ?Sized>(
    width: usize,
    height: usize,
    mine_count: usize,
    rng: &mut R,
) -> Result<Board> {
    let total = cell_count(width, height)?;
    let mine_count = mine_count.min(total);
    // mark the first `mine_count` cells, then permute the whole field
    let mut mine_mask: Vec<bool> = (0..total).map(|i| i < mine_count).collect();
    mine_mask.shuffle(rng);
    let board = Board::from_mine_mask(width, height, mine_mask)?;
    info!(width, height, mines = mine_count, "built board");
    Ok(board)
}

impl Board {
    /// Builds a board whose mines are exactly the `true` entries of the
    /// row-major `mine_mask`.
    pub fn from_mine_mask(width: usize, height: usize, mine_mask: Vec<bool>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BoardError::EmptyBoard);
        }
        let total = cell_count(width, height)?;
        if mine_mask.len() != total {
            return Err(BoardError::InvalidShape {
                expected: total,
                actual: mine_mask.len(),
            });
        }

        let mut cells: Vec<Cell> = mine_mask
            .into_iter()
            .map(|is_mined| Cell {
                is_mined,
                is_open: false,
                is_flagged: false,
                neighboring_mines: 0,
                neighbors: Vec::new(),
            })
            .collect();

        for index in 0..cells.len() {
            let neighbors = neighbours(width, height, index % width, index / width);
            let mines = neighbors.iter().filter(|&&n| cells[n].is_mined).count();
            let cell = &mut cells[index];
            cell.neighboring_mines = mines as u8;
            cell.neighbors = neighbors;
        }

        Ok(Self {
            width,
            height,
            cells,
            rules: Rules::default(),
            tripped_mine: None,
        })
    }

    pub fn with_mines(width: usize, height: usize, mines: &[(usize, usize)]) -> Result<Self> {
        let mut mine_mask = vec![false; cell_count(width, height)?];
        for &(x, y) in mines {
            if x >= width || y >= height {
                return Err(BoardError::OutOfBounds {
                    x,
                    y,
                    width,
                    height,
                });
            }
            mine_mask[y * width + x] = true;
        }
        Self::from_mine_mask(width, height, mine_mask)
    }

    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn mine_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_mined).count()
    }

    pub fn flag_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_flagged).count()
    }

    pub fn index(&self, x: usize, y: usize) -> Result<usize> {
        if x < self.width && y < self.height {
            Ok(y * self.width + x)
        } else {
            warn!(
                x,
                y,
                width = self.width,
                height = self.height,
                "coordinates outside the board"
            );
            Err(BoardError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// The first mined cell that was opened, if any.
    pub fn tripped_mine(&self) -> Option<(usize, usize)> {
        self.tripped_mine.map(|index| self.coords(index))
    }

    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    pub fn cell(&self, x: usize, y: usize) -> Result<&Cell> {
        Ok(&self.cells[self.index(x, y)?])
    }

    /// Reveals the cell as a direct player action. Flagged cells stay shut.
    pub fn open(&mut self, x: usize, y: usize) -> Result<RevealOutcome> {
        let index = self.index(x, y)?;
        if self.cells[index].is_flagged {
            return Ok(RevealOutcome::NoChange);
        }
        Ok(self.reveal_from(index))
    }

    /// Reveals the cell even when it is flagged.
    pub fn open_cell(&mut self, x: usize, y: usize) -> Result<RevealOutcome> {
        let index = self.index(x, y)?;
        Ok(self.reveal_from(index))
    }

    pub fn flag(&mut self, x: usize, y: usize) -> Result<MarkOutcome> {
        let index = self.index(x, y)?;
        let cell = &mut self.cells[index];
        if cell.is_open {
            return Ok(MarkOutcome::NoChange);
        }
        cell.is_flagged = !cell.is_flagged;
        Ok(MarkOutcome::Changed)
    }

    /// Chord: once an open cell has exactly as many flagged neighbors as it
    /// has mined ones, reveal all of its other neighbors.
    pub fn clear(&mut self, x: usize, y: usize) -> Result<RevealOutcome> {
        let index = self.index(x, y)?;
        if !self.rules.chord_clear {
            return Ok(RevealOutcome::NoChange);
        }

        let cell = &self.cells[index];
        if !cell.is_open {
            return Ok(RevealOutcome::NoChange);
        }
        let flags = cell
            .neighbors
            .iter()
            .filter(|&&n| self.cells[n].is_flagged)
            .count();
        if flags != usize::from(cell.neighboring_mines) {
            return Ok(RevealOutcome::NoChange);
        }

        let targets: Vec<usize> = cell
            .neighbors
            .iter()
            .copied()
            .filter(|&n| !self.cells[n].is_flagged)
            .collect();
        Ok(targets
            .into_iter()
            .fold(RevealOutcome::NoChange, |outcome, n| {
                outcome | self.reveal_from(n)
            }))
    }

    fn reveal_from(&mut self, start: usize) -> RevealOutcome {
        let mut outcome = RevealOutcome::NoChange;
        let mut opened = 0usize;
        let mut pending = vec![start];

        while let Some(index) = pending.pop() {
            let cell = &mut self.cells[index];
            if cell.is_open {
                continue;
            }
            cell.is_open = true;
            cell.is_flagged = false;
            opened += 1;
            if cell.is_mined {
                outcome = outcome | RevealOutcome::HitMine;
                self.tripped_mine.get_or_insert(index);
            } else {
                outcome = outcome | RevealOutcome::Revealed;
            }

            if cell.neighboring_mines != 0 || !self.rules.flood_reveal {
                continue;
            }
            for &n in &self.cells[index].neighbors {
                if !self.cells[n].is_open {
                    pending.push(n);
                }
            }
        }

        if outcome.has_update() {
            let (x, y) = self.coords(start);
            debug!(x, y, opened, ?outcome, "revealed cells");
        }
        outcome
    }
}

fn cell_count(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or(BoardError::TooLarge { width, height })
}

fn neighbours(width: usize, height: usize, x: usize, y: usize) -> Vec<usize> {
    (-1..=1)
        .flat_map(|y_offset| (-1..=1).map(move |x_offset| (x_offset, y_offset)))
        .filter(|&(x_offset, y_offset)| {
            let invalid = (x_offset == 0 && y_offset == 0)
                || (x_offset < 0 && x == 0)
                || (y_offset < 0 && y == 0)
                || (x_offset > 0 && x == width - 1)
                || (y_offset > 0 && y == height - 1);
            !invalid
        })
        .map(|(x_offset, y_offset)| {
            let x = x.wrapping_add_signed(x_offset);
            let y = y.wrapping_add_signed(y_offset);
            y * width + x
        })
        .collect()
}
