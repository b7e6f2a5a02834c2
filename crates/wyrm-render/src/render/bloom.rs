//! Per-frame accumulation of glowing cells.
//!
//! Draw calls push their cells here; the bloom pass drains the queue once
//! per frame and replays it into the HDR target, one instanced draw per
//! distinct color. Colors are grouped by exact bit pattern, never by
//! approximate equality.

use std::collections::HashMap;

use crate::coords::Cell;

#[derive(Default)]
pub(crate) struct BloomQueue {
    cells: Vec<(Cell, [f32; 4])>,
}

impl BloomQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cells(&mut self, cells: &[Cell], color: [f32; 4]) {
        self.cells.extend(cells.iter().map(|&c| (c, color)));
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Drains the queue into color groups, first-seen order. The queue is
    /// empty afterwards even when nothing was pushed.
    pub fn take_groups(&mut self) -> Vec<([f32; 4], Vec<Cell>)> {
        let mut groups: Vec<([f32; 4], Vec<Cell>)> = Vec::new();
        let mut index: HashMap<[u32; 4], usize> = HashMap::new();
        for (cell, color) in self.cells.drain(..) {
            let key = color.map(f32::to_bits);
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push((color, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(cell);
        }
        groups
    }
}

// ── tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
    const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

    fn cells(coords: &[(i32, i32)]) -> Vec<Cell> {
        coords.iter().map(|&(x, y)| Cell::new(x, y)).collect()
    }

    #[test]
    fn queue_is_empty_after_take() {
        let mut q = BloomQueue::new();
        q.push_cells(&cells(&[(1, 1), (2, 1)]), RED);
        assert!(!q.is_empty());
        let _ = q.take_groups();
        assert!(q.is_empty());
    }

    #[test]
    fn empty_take_yields_no_groups() {
        let mut q = BloomQueue::new();
        assert!(q.take_groups().is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn pushing_no_cells_queues_nothing() {
        let mut q = BloomQueue::new();
        q.push_cells(&[], RED);
        assert!(q.is_empty());
    }

    #[test]
    fn groups_merge_by_color_in_first_seen_order() {
        let mut q = BloomQueue::new();
        q.push_cells(&cells(&[(0, 0), (1, 0)]), RED);
        q.push_cells(&cells(&[(5, 5)]), GREEN);
        q.push_cells(&cells(&[(2, 0)]), RED);

        let groups = q.take_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, RED);
        assert_eq!(groups[0].1, cells(&[(0, 0), (1, 0), (2, 0)]));
        assert_eq!(groups[1].0, GREEN);
        assert_eq!(groups[1].1, cells(&[(5, 5)]));
    }

    #[test]
    fn grouping_distinguishes_bit_patterns() {
        // -0.0 == 0.0 numerically but the bit patterns differ, so the
        // grouping must keep them apart.
        let mut q = BloomQueue::new();
        q.push_cells(&cells(&[(0, 0)]), [0.0, 0.0, 0.0, 1.0]);
        q.push_cells(&cells(&[(1, 0)]), [-0.0, 0.0, 0.0, 1.0]);
        assert_eq!(q.take_groups().len(), 2);
    }
}
