use common::grid2::Grid2;
use glam::{DAffine2, DMat2, DVec2};
use serde::{Deserialize, Serialize};

use crate::tiling::Tile;

/// Static descriptor of the source grid file. Created once per input,
/// read-only for the duration of a check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFileDetails {
    pub size_x: usize,
    pub size_y: usize,
    /// GDAL-ordered geotransform coefficients:
    /// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
    pub geotransform: [f64; 6],
    /// Spatial reference text (WKT).
    pub projection: String,
}

impl InputFileDetails {
    pub fn affine(&self) -> Affine {
        Affine::from_geotransform(&self.geotransform)
    }

    /// Affine mapping of a tile's local pixel coordinates to world
    /// coordinates, anchored at the tile origin.
    pub fn tile_affine(&self, tile: &Tile) -> Affine {
        self.affine()
            .compose(&Affine::translation(tile.min_x as f64, tile.min_y as f64))
    }
}

/// 2D affine mapping `(col, row) -> (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine(DAffine2);

impl Affine {
    pub fn identity() -> Self {
        Self(DAffine2::IDENTITY)
    }

    /// Builds the mapping from GDAL coefficient order:
    /// `x = gt[1]*col + gt[2]*row + gt[0]`,
    /// `y = gt[4]*col + gt[5]*row + gt[3]`.
    pub fn from_geotransform(gt: &[f64; 6]) -> Self {
        Self(DAffine2::from_mat2_translation(
            DMat2::from_cols(DVec2::new(gt[1], gt[4]), DVec2::new(gt[2], gt[5])),
            DVec2::new(gt[0], gt[3]),
        ))
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self(DAffine2::from_translation(DVec2::new(dx, dy)))
    }

    /// `self` applied after `other`: `(self ∘ other)(p) = self(other(p))`.
    pub fn compose(&self, other: &Affine) -> Affine {
        Affine(self.0 * other.0)
    }

    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let point = self.0.transform_point2(DVec2::new(col, row));
        (point.x, point.y)
    }
}

/// A grid of measurements where each cell is either a valid value or
/// explicitly no-data. Masked cells never contribute to counts, histograms,
/// or geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedGrid {
    values: Grid2<f32>,
    nodata: Grid2<bool>,
}

impl MaskedGrid {
    pub fn new(values: Grid2<f32>, nodata: Grid2<bool>) -> Self {
        assert_eq!(values.width(), nodata.width(), "mask width mismatch");
        assert_eq!(values.height(), nodata.height(), "mask height mismatch");
        Self { values, nodata }
    }

    /// All cells valid.
    pub fn from_values(values: Grid2<f32>) -> Self {
        let nodata = Grid2::new_filled(values.width(), values.height(), false);
        Self { values, nodata }
    }

    /// Every cell masked, zero contribution to any check.
    pub fn fully_masked(width: usize, height: usize) -> Self {
        Self {
            values: Grid2::new_default(width, height),
            nodata: Grid2::new_filled(width, height, true),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.values.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.values.height()
    }

    #[inline]
    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        !*self.nodata.get(x, y)
    }

    #[inline]
    pub fn value(&self, x: usize, y: usize) -> f32 {
        *self.values.get(x, y)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.is_valid(x, y).then(|| self.value(x, y))
    }

    /// Iterates `(x, y, value)` over valid cells only, row-major.
    pub fn iter_valid(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.values
            .enumerate_cells()
            .filter(|&(x, y, _)| self.is_valid(x, y))
            .map(|(x, y, &v)| (x, y, v))
    }

    pub fn valid_count(&self) -> usize {
        self.nodata.iter().filter(|&&masked| !masked).count()
    }

    /// Copies the sub-window covered by `tile`.
    pub fn window(&self, tile: &Tile) -> MaskedGrid {
        MaskedGrid {
            values: self
                .values
                .window(tile.min_x, tile.min_y, tile.width(), tile.height()),
            nodata: self
                .nodata
                .window(tile.min_x, tile.min_y, tile.width(), tile.height()),
        }
    }
}
