use serde::{Deserialize, Serialize};

/// Rectangular pixel-space sub-window of the full grid. `max_x`/`max_y` are
/// exclusive, so `width == max_x - min_x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl Tile {
    pub fn new(min_x: usize, min_y: usize, max_x: usize, max_y: usize) -> Self {
        assert!(max_x > min_x, "tile max_x must exceed min_x");
        assert!(max_y > min_y, "tile max_y must exceed min_y");
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }
}

/// Deterministic row-major partition of a `size_x` by `size_y` grid into
/// tiles of at most `tile_size_x` by `tile_size_y` cells. Edge tiles are
/// clamped to the grid extent, so every pixel is covered exactly once.
#[derive(Debug, Clone, Copy)]
pub struct TileScheme {
    tile_size_x: usize,
    tile_size_y: usize,
}

impl TileScheme {
    pub fn new(tile_size_x: usize, tile_size_y: usize) -> Self {
        assert!(tile_size_x > 0, "tile_size_x must be positive");
        assert!(tile_size_y > 0, "tile_size_y must be positive");
        Self {
            tile_size_x,
            tile_size_y,
        }
    }

    pub fn tiles(&self, size_x: usize, size_y: usize) -> Vec<Tile> {
        let mut tiles = Vec::new();
        let mut min_y = 0;
        while min_y < size_y {
            let max_y = (min_y + self.tile_size_y).min(size_y);
            let mut min_x = 0;
            while min_x < size_x {
                let max_x = (min_x + self.tile_size_x).min(size_x);
                tiles.push(Tile::new(min_x, min_y, max_x, max_y));
                min_x = max_x;
            }
            min_y = max_y;
        }
        tiles
    }
}
