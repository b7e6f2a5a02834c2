/// A grid cell coordinate.
///
/// Origin is the top-left corner of the playfield; +X right, +Y down.
/// Values outside the grid are representable (used transiently by movement
/// code before collision checks).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the neighbor cell offset by `(dx, dy)`.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// True if the cell lies inside a `w x h` grid.
    #[inline]
    pub const fn in_bounds(self, w: i32, h: i32) -> bool {
        self.x >= 0 && self.x < w && self.y >= 0 && self.y < h
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}
