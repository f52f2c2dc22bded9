use std::fmt::Debug;

use common::grid2::Grid2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Affine;

#[derive(Debug, Error, Clone)]
pub enum GeometryError {
    #[error("Coordinate transform failed: {0}")]
    Transform(String),
}

pub type GeometryResult<T> = std::result::Result<T, GeometryError>;

/// GeoJSON-style multi-polygon: a list of polygons, each a list of rings,
/// each ring a closed list of `[x, y]` positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    pub coordinates: Vec<Vec<Vec<[f64; 2]>>>,
}

impl MultiPolygon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn polygon_count(&self) -> usize {
        self.coordinates.len()
    }

    pub fn push_polygon(&mut self, rings: Vec<Vec<[f64; 2]>>) {
        self.coordinates.push(rings);
    }

    /// Lossless concatenation, the merge operation for footprint fragments.
    pub fn extend(&mut self, other: MultiPolygon) {
        self.coordinates.extend(other.coordinates);
    }
}

/// Reprojects positions from the source spatial reference into the
/// reporting spatial reference.
pub trait CoordTransform: Debug + Send + Sync {
    fn transform(&self, x: f64, y: f64) -> GeometryResult<(f64, f64)>;
}

/// Keeps coordinates in the source spatial reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransform;

impl CoordTransform for IdentityTransform {
    fn transform(&self, x: f64, y: f64) -> GeometryResult<(f64, f64)> {
        Ok((x, y))
    }
}

/// Outlines the true-valued regions of a boolean raster window as polygons.
/// `affine` maps window pixel corners to source-reference coordinates;
/// `projection` is the source spatial-reference text.
pub trait Polygonizer: Debug + Send + Sync {
    fn polygonize(
        &self,
        mask: &Grid2<bool>,
        affine: &Affine,
        projection: &str,
    ) -> GeometryResult<MultiPolygon>;
}

/// Polygonizer that emits one rectangle per maximal horizontal run of true
/// cells. Deterministic per window, so tile fragments concatenate cleanly.
#[derive(Debug)]
pub struct RowRunPolygonizer {
    transform: Box<dyn CoordTransform>,
}

impl RowRunPolygonizer {
    pub fn new(transform: Box<dyn CoordTransform>) -> Self {
        Self { transform }
    }

    pub fn identity() -> Self {
        Self::new(Box::new(IdentityTransform))
    }

    fn rectangle(
        &self,
        affine: &Affine,
        x0: usize,
        x1: usize,
        y: usize,
    ) -> GeometryResult<Vec<[f64; 2]>> {
        let corners = [
            (x0 as f64, y as f64),
            (x1 as f64, y as f64),
            (x1 as f64, y as f64 + 1.0),
            (x0 as f64, y as f64 + 1.0),
            (x0 as f64, y as f64),
        ];

        let mut ring = Vec::with_capacity(corners.len());
        for (col, row) in corners {
            let (sx, sy) = affine.apply(col, row);
            let (tx, ty) = self.transform.transform(sx, sy)?;
            ring.push([tx, ty]);
        }
        Ok(ring)
    }
}

impl Polygonizer for RowRunPolygonizer {
    fn polygonize(
        &self,
        mask: &Grid2<bool>,
        affine: &Affine,
        _projection: &str,
    ) -> GeometryResult<MultiPolygon> {
        let mut footprint = MultiPolygon::new();

        for (y, row) in mask.rows().enumerate() {
            let mut run_start: Option<usize> = None;
            for (x, &flagged) in row.iter().enumerate() {
                match (flagged, run_start) {
                    (true, None) => run_start = Some(x),
                    (false, Some(start)) => {
                        footprint.push_polygon(vec![self.rectangle(affine, start, x, y)?]);
                        run_start = None;
                    }
                    _ => {}
                }
            }
            if let Some(start) = run_start {
                footprint.push_polygon(vec![self.rectangle(affine, start, row.len(), y)?]);
            }
        }

        Ok(footprint)
    }
}
