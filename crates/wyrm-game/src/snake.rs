//! Snake simulation on a fixed grid.
//!
//! The outer ring of grid cells is the wall; play happens in the interior.
//! The segment list is head-first and never empty. Direction changes are
//! queued (one slot, last writer wins) and applied at the next [`step`],
//! so a burst of inputs between ticks can never fold the snake back onto
//! its neck.
//!
//! [`step`]: Snake::step

use anyhow::{Result, ensure};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use wyrm_render::coords::Cell;

/// What a single simulation step produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepResult {
    pub ate: bool,
    pub died: bool,
    pub won: bool,
}

/// Serializable snapshot of a run, used by save/restore.
///
/// Cells are stored as plain `(x, y)` pairs to keep the save format free
/// of renderer types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnakeState {
    pub segments: Vec<(i32, i32)>,
    pub direction: (i32, i32),
    pub apple: (i32, i32),
    #[serde(default)]
    pub pending_growth: u32,
}

pub struct Snake {
    grid_w: i32,
    grid_h: i32,
    /// Head first. Nonempty at all times.
    segments: Vec<Cell>,
    direction: (i32, i32),
    pending_dir: Option<(i32, i32)>,
    pending_growth: u32,
    pub apple: Cell,
    rng: SmallRng,
}

impl Snake {
    pub fn new(grid_w: u32, grid_h: u32) -> Self {
        debug_assert!(grid_w >= 3 && grid_h >= 3, "grid must have an interior");
        let mut snake = Self {
            grid_w: grid_w as i32,
            grid_h: grid_h as i32,
            segments: Vec::new(),
            direction: (1, 0),
            pending_dir: None,
            pending_growth: 0,
            apple: Cell::default(),
            rng: SmallRng::from_entropy(),
        };
        snake.reset();
        snake
    }

    /// Restarts the run: length-1 snake at the grid center, moving right,
    /// fresh apple.
    pub fn reset(&mut self) {
        self.segments.clear();
        self.segments
            .push(Cell::new(self.grid_w / 2, self.grid_h / 2));
        self.direction = (1, 0);
        self.pending_dir = None;
        self.pending_growth = 0;
        self.respawn_apple();
    }

    /// Segment cells, head first.
    pub fn positions(&self) -> &[Cell] {
        &self.segments
    }

    pub fn head(&self) -> Cell {
        self.segments[0]
    }

    pub fn direction(&self) -> (i32, i32) {
        self.direction
    }

    /// Apples eaten so far.
    pub fn score(&self) -> u32 {
        self.segments.len().saturating_sub(1) as u32
    }

    /// Queues a direction change for the next step. A 180-degree turn is
    /// ignored while the snake has a neck; a later queued change replaces
    /// an earlier one within the same tick.
    pub fn change_dir(&mut self, dir: (i32, i32)) {
        if dir == (0, 0) {
            return;
        }
        if self.segments.len() > 1 && dir == (-self.direction.0, -self.direction.1) {
            return;
        }
        self.pending_dir = Some(dir);
    }

    /// Advances the snake one cell.
    pub fn step(&mut self) -> StepResult {
        if let Some(dir) = self.pending_dir.take() {
            self.direction = dir;
        }
        let next = self.head().offset(self.direction.0, self.direction.1);

        if self.hits_wall(next) {
            return StepResult {
                died: true,
                ..StepResult::default()
            };
        }

        let ate = next == self.apple;
        let growing = ate || self.pending_growth > 0;
        // The tail cell vacates this step unless the snake grows, so moving
        // into it is only fatal while growing.
        let body = if growing {
            &self.segments[..]
        } else {
            &self.segments[..self.segments.len() - 1]
        };
        if body.contains(&next) {
            return StepResult {
                died: true,
                ..StepResult::default()
            };
        }

        self.segments.insert(0, next);
        if ate {
            self.pending_growth += 1;
        }
        if self.pending_growth > 0 {
            self.pending_growth -= 1;
        } else {
            self.segments.pop();
        }

        // The board is won when no free cell is left for the next apple.
        let won = ate && !self.respawn_apple();
        StepResult {
            ate,
            died: false,
            won,
        }
    }

    /// Snapshot for the save file.
    pub fn snapshot(&self) -> SnakeState {
        SnakeState {
            segments: self.segments.iter().map(|c| (c.x, c.y)).collect(),
            direction: self.direction,
            apple: (self.apple.x, self.apple.y),
            pending_growth: self.pending_growth,
        }
    }

    /// Replaces the current run with a saved one.
    pub fn restore(&mut self, state: SnakeState) -> Result<()> {
        ensure!(
            !state.segments.is_empty(),
            "saved snake has no segments"
        );
        self.segments = state
            .segments
            .into_iter()
            .map(|(x, y)| Cell::new(x, y))
            .collect();
        self.direction = state.direction;
        self.pending_dir = None;
        self.pending_growth = state.pending_growth;
        self.apple = Cell::new(state.apple.0, state.apple.1);
        Ok(())
    }

    fn hits_wall(&self, c: Cell) -> bool {
        c.x <= 0 || c.y <= 0 || c.x >= self.grid_w - 1 || c.y >= self.grid_h - 1
    }

    /// Moves the apple to a uniformly random free interior cell. Returns
    /// false when the snake occupies every interior cell.
    fn respawn_apple(&mut self) -> bool {
        let (w, h) = (self.grid_w, self.grid_h);
        let free: Vec<Cell> = (1..w - 1)
            .flat_map(|x| (1..h - 1).map(move |y| Cell::new(x, y)))
            .filter(|c| !self.segments.contains(c))
            .collect();
        if free.is_empty() {
            return false;
        }
        self.apple = free[self.rng.gen_range(0..free.len())];
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_snake() -> Snake {
        Snake::new(24, 24)
    }

    fn park_apple(snake: &mut Snake) {
        // Off the straight-ahead path of a center snake moving right.
        snake.apple = Cell::new(1, 1);
    }

    // ── spawn ─────────────────────────────────────────────────────────────

    #[test]
    fn starts_with_length_one_in_the_interior() {
        let s = test_snake();
        assert_eq!(s.positions().len(), 1);
        assert_eq!(s.head(), Cell::new(12, 12));
        assert_eq!(s.direction(), (1, 0));
        assert_eq!(s.score(), 0);
        assert!(s.apple.in_bounds(24, 24));
        assert!(!s.hits_wall(s.apple));
        assert_ne!(s.apple, s.head());
    }

    // ── movement ──────────────────────────────────────────────────────────

    #[test]
    fn steps_move_one_cell_ahead() {
        let mut s = test_snake();
        park_apple(&mut s);
        for i in 1..=3 {
            let result = s.step();
            assert_eq!(result, StepResult::default());
            assert_eq!(s.head(), Cell::new(12 + i, 12));
        }
    }

    #[test]
    fn queued_turn_applies_on_the_next_step_only() {
        let mut s = test_snake();
        park_apple(&mut s);
        s.step();
        s.change_dir((0, -1));
        s.change_dir((0, 1));
        let before = s.head();
        s.step();
        // Last queued change wins; nothing stays queued afterwards.
        assert_eq!(s.head(), before.offset(0, 1));
        s.step();
        assert_eq!(s.direction(), (0, 1));
    }

    #[test]
    fn reversal_onto_the_neck_is_ignored() {
        let mut s = test_snake();
        s.apple = Cell::new(13, 12);
        let result = s.step();
        assert!(result.ate);
        assert_eq!(s.positions().len(), 2);
        park_apple(&mut s);
        s.change_dir((-1, 0));
        s.step();
        assert_eq!(s.head(), Cell::new(14, 12));
        assert_eq!(s.direction(), (1, 0));
    }

    #[test]
    fn a_length_one_snake_may_reverse() {
        let mut s = test_snake();
        park_apple(&mut s);
        s.change_dir((-1, 0));
        s.step();
        assert_eq!(s.head(), Cell::new(11, 12));
    }

    // ── eating ────────────────────────────────────────────────────────────

    #[test]
    fn eating_grows_by_one_and_respawns_the_apple() {
        let mut s = test_snake();
        s.apple = Cell::new(13, 12);
        let result = s.step();
        assert!(result.ate);
        assert!(!result.died);
        assert!(!result.won);
        assert_eq!(s.positions().len(), 2);
        assert_eq!(s.score(), 1);
        assert!(!s.positions().contains(&s.apple));
        assert!(!s.hits_wall(s.apple));
    }

    // ── death ─────────────────────────────────────────────────────────────

    #[test]
    fn the_wall_ring_kills() {
        let mut s = test_snake();
        park_apple(&mut s);
        // Interior spans x = 1..=22; from x = 12 the tenth step reaches
        // x = 22 and the eleventh hits the wall at x = 23.
        for _ in 0..10 {
            assert!(!s.step().died);
        }
        let result = s.step();
        assert!(result.died);
        assert_eq!(s.head(), Cell::new(22, 12), "death leaves the snake in place");
    }

    #[test]
    fn running_into_the_body_kills() {
        let mut s = test_snake();
        s.restore(SnakeState {
            segments: vec![(5, 5), (5, 6), (6, 6), (6, 5), (7, 5)],
            direction: (1, 0),
            apple: (20, 20),
            pending_growth: 0,
        })
        .unwrap();
        let result = s.step();
        assert!(result.died);
    }

    #[test]
    fn chasing_the_vacating_tail_is_safe() {
        let mut s = test_snake();
        s.restore(SnakeState {
            segments: vec![(5, 5), (5, 6), (6, 6), (6, 5)],
            direction: (1, 0),
            apple: (20, 20),
            pending_growth: 0,
        })
        .unwrap();
        let result = s.step();
        assert!(!result.died);
        assert_eq!(s.head(), Cell::new(6, 5));
        assert_eq!(s.positions().len(), 4);
    }

    // ── winning ───────────────────────────────────────────────────────────

    #[test]
    fn filling_the_interior_wins() {
        // Serpentine path over the whole 22x22 interior. The final path
        // cell is the apple; everything before it is snake, head last in
        // path order (so head first in the segment list).
        let mut path = Vec::new();
        for y in 1..23 {
            if y % 2 == 1 {
                for x in 1..23 {
                    path.push((x, y));
                }
            } else {
                for x in (1..23).rev() {
                    path.push((x, y));
                }
            }
        }
        let apple = path.pop().unwrap();
        let head = *path.last().unwrap();
        let direction = (apple.0 - head.0, apple.1 - head.1);
        let segments: Vec<(i32, i32)> = path.into_iter().rev().collect();

        let mut s = test_snake();
        s.restore(SnakeState {
            segments,
            direction,
            apple,
            pending_growth: 0,
        })
        .unwrap();
        let result = s.step();
        assert!(result.ate);
        assert!(result.won);
        assert_eq!(s.positions().len(), 22 * 22);
    }

    // ── save/restore ──────────────────────────────────────────────────────

    #[test]
    fn snapshot_round_trips() {
        let mut s = test_snake();
        s.apple = Cell::new(13, 12);
        s.step();
        s.change_dir((0, 1));
        s.step();
        let state = s.snapshot();

        let mut restored = test_snake();
        restored.restore(state).unwrap();
        assert_eq!(restored.positions(), s.positions());
        assert_eq!(restored.direction(), s.direction());
        assert_eq!(restored.apple, s.apple);
    }

    #[test]
    fn restore_rejects_an_empty_snake() {
        let mut s = test_snake();
        let result = s.restore(SnakeState {
            segments: Vec::new(),
            direction: (1, 0),
            apple: (5, 5),
            pending_growth: 0,
        });
        assert!(result.is_err());
    }
}
