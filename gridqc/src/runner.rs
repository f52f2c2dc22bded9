use std::fmt::Debug;

use common::grid2::Grid2;
use serde::Serialize;
use tracing::{debug, warn};

use crate::check::{CheckOutputs, CheckRegistry, CheckResult};
use crate::config::CheckSpec;
use crate::data::{InputFileDetails, MaskedGrid};
use crate::tiling::{Tile, TileScheme};

/// The three co-registered masked windows for one tile, plus the optional
/// survey-limit restriction mask aligned to the same window.
#[derive(Debug)]
pub struct TileWindows {
    pub depth: MaskedGrid,
    pub density: MaskedGrid,
    pub uncertainty: MaskedGrid,
    pub restriction: Option<Grid2<bool>>,
}

/// Supplies grid windows to the runner. Raster decoding and reprojection
/// live behind this trait; the engine never touches files.
pub trait GridSource: Debug {
    fn details(&self) -> &InputFileDetails;
    fn read_windows(&self, tile: &Tile) -> CheckResult<TileWindows>;
}

/// Grid source over surfaces already resident in memory. Mostly useful for
/// small surfaces and tests.
#[derive(Debug)]
pub struct MemoryGridSource {
    details: InputFileDetails,
    depth: MaskedGrid,
    density: MaskedGrid,
    uncertainty: MaskedGrid,
    restriction: Option<Grid2<bool>>,
}

impl MemoryGridSource {
    pub fn new(
        details: InputFileDetails,
        depth: MaskedGrid,
        density: MaskedGrid,
        uncertainty: MaskedGrid,
    ) -> Self {
        for grid in [&depth, &density, &uncertainty] {
            assert_eq!(grid.width(), details.size_x, "surface width mismatch");
            assert_eq!(grid.height(), details.size_y, "surface height mismatch");
        }
        Self {
            details,
            depth,
            density,
            uncertainty,
            restriction: None,
        }
    }

    pub fn with_restriction(mut self, restriction: Grid2<bool>) -> Self {
        assert_eq!(restriction.width(), self.details.size_x);
        assert_eq!(restriction.height(), self.details.size_y);
        self.restriction = Some(restriction);
        self
    }
}

impl GridSource for MemoryGridSource {
    fn details(&self) -> &InputFileDetails {
        &self.details
    }

    fn read_windows(&self, tile: &Tile) -> CheckResult<TileWindows> {
        Ok(TileWindows {
            depth: self.depth.window(tile),
            density: self.density.window(tile),
            uncertainty: self.uncertainty.window(tile),
            restriction: self
                .restriction
                .as_ref()
                .map(|r| r.window(tile.min_x, tile.min_y, tile.width(), tile.height())),
        })
    }
}

/// Outcome of one check over the whole surface.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub check_id: String,
    pub name: String,
    pub version: String,
    pub outputs: CheckOutputs,
}

/// Drives the tiled pass: partitions the grid, runs a fresh check instance
/// per tile, folds the per-tile instances with `merge`, and reads the final
/// outputs once per check.
#[derive(Debug, Clone, Copy)]
pub struct Runner {
    scheme: TileScheme,
}

impl Runner {
    pub fn new(scheme: TileScheme) -> Self {
        Self { scheme }
    }

    pub fn run(
        &self,
        source: &dyn GridSource,
        registry: &CheckRegistry,
        specs: &[CheckSpec],
    ) -> CheckResult<Vec<CheckOutcome>> {
        let ifd = source.details();
        let tiles = self.scheme.tiles(ifd.size_x, ifd.size_y);
        debug!(
            tiles = tiles.len(),
            size_x = ifd.size_x,
            size_y = ifd.size_y,
            "starting tiled pass"
        );

        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            outcomes.push(self.run_check(source, registry, spec, &tiles)?);
        }
        Ok(outcomes)
    }

    fn run_check(
        &self,
        source: &dyn GridSource,
        registry: &CheckRegistry,
        spec: &CheckSpec,
        tiles: &[Tile],
    ) -> CheckResult<CheckOutcome> {
        let ifd = source.details();

        // constructed up front so a configuration error is fatal before any
        // tile work happens; also serves as the fold target
        let mut folded = registry.create(spec.id, &spec.params)?;
        let mut run_error: Option<String> = None;

        for tile in tiles {
            let windows = match source.read_windows(tile) {
                Ok(windows) => windows,
                Err(e) => {
                    warn!(?tile, error = %e, "window extraction failed");
                    run_error = Some(e.to_string());
                    break;
                }
            };

            let mut instance = registry.create(spec.id, &spec.params)?;
            instance.check_started();
            let result = instance.run(
                ifd,
                tile,
                &windows.depth,
                &windows.density,
                &windows.uncertainty,
                windows.restriction.as_ref(),
            );
            instance.check_ended();

            match result {
                Ok(()) => folded.merge(instance.as_ref())?,
                Err(e) => {
                    // the failed tile's partial accumulator is discarded
                    warn!(?tile, error = %e, "tile run failed");
                    run_error = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(error) = run_error {
            folded.execution_mut().set_error(error);
        }

        let descriptor = folded.descriptor();
        Ok(CheckOutcome {
            check_id: descriptor.id.to_string(),
            name: descriptor.name.to_string(),
            version: descriptor.version.to_string(),
            outputs: folded.get_outputs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckError;
    use crate::tiling::Tile;

    #[derive(Debug)]
    struct FailingSource {
        inner: MemoryGridSource,
        fail_from_tile: usize,
        served: std::cell::Cell<usize>,
    }

    impl GridSource for FailingSource {
        fn details(&self) -> &InputFileDetails {
            self.inner.details()
        }

        fn read_windows(&self, tile: &Tile) -> CheckResult<TileWindows> {
            let served = self.served.get();
            self.served.set(served + 1);
            if served >= self.fail_from_tile {
                return Err(CheckError::Source("raster band unreadable".to_string()));
            }
            self.inner.read_windows(tile)
        }
    }

    fn flat_source(size_x: usize, size_y: usize) -> MemoryGridSource {
        let details = InputFileDetails {
            size_x,
            size_y,
            geotransform: [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            projection: String::new(),
        };
        MemoryGridSource::new(
            details,
            MaskedGrid::from_values(Grid2::new_filled(size_x, size_y, -40.0)),
            MaskedGrid::from_values(Grid2::new_filled(size_x, size_y, 9.0)),
            MaskedGrid::from_values(Grid2::new_filled(size_x, size_y, 0.2)),
        )
    }

    use crate::check::CheckRegistry;
    use crate::config::CheckSpec;
    use crate::density::DensityCheck;
    use crate::geometry::RowRunPolygonizer;
    use crate::tvu::TvuCheck;
    use std::sync::Arc;

    fn standard_registry() -> CheckRegistry {
        CheckRegistry::standard(Arc::new(RowRunPolygonizer::identity()))
    }

    #[test]
    fn runner_produces_one_outcome_per_spec() {
        let source = flat_source(6, 4);
        let registry = standard_registry();
        let specs = vec![
            CheckSpec::new(DensityCheck::DESCRIPTOR.check_id()),
            CheckSpec::new(TvuCheck::DESCRIPTOR.check_id()),
        ];

        let outcomes = Runner::new(TileScheme::new(3, 3))
            .run(&source, &registry, &specs)
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "Density Check");
        assert_eq!(outcomes[1].name, "Total Vertical Uncertainty Check");
        for outcome in &outcomes {
            assert!(outcome.outputs.execution.start.is_some());
            assert!(outcome.outputs.execution.end.is_some());
        }
    }

    #[test]
    fn source_failure_surfaces_as_failed_verdict() {
        let source = FailingSource {
            inner: flat_source(4, 4),
            fail_from_tile: 1,
            served: std::cell::Cell::new(0),
        };
        let registry = standard_registry();
        let specs = vec![CheckSpec::new(TvuCheck::DESCRIPTOR.check_id())];

        let outcomes = Runner::new(TileScheme::new(2, 4))
            .run(&source, &registry, &specs)
            .unwrap();

        let outputs = &outcomes[0].outputs;
        assert_eq!(outputs.state, crate::check::CheckState::Fail);
        assert!(outputs.execution.error.as_deref().unwrap().contains("unreadable"));
    }

    #[test]
    fn unknown_check_in_specs_is_fatal() {
        let source = flat_source(2, 2);
        let registry = standard_registry();
        let specs = vec![CheckSpec::new(crate::check::CheckId::unique())];

        let err = Runner::new(TileScheme::new(2, 2))
            .run(&source, &registry, &specs)
            .unwrap_err();
        assert!(matches!(err, CheckError::UnknownCheck(_)));
    }
}
