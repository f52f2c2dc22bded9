use std::sync::Arc;

use crate::check::{CheckParam, CheckParams, GridCheck};
use crate::density::DensityCheck;
use crate::geometry::RowRunPolygonizer;
use crate::tiling::{Tile, TileScheme};
use crate::tvu::TvuCheck;

use super::{survey_fixture, SurveyFixture};

fn tvu_check() -> TvuCheck {
    TvuCheck::new(&CheckParams::new(vec![
        CheckParam::new(TvuCheck::PARAM_DEPTH_ERROR, 0.1),
        CheckParam::new(TvuCheck::PARAM_DEPTH_ERROR_FACTOR, 0.007),
        CheckParam::new(TvuCheck::PARAM_ACCEPTABLE_AREA_PCT, 100.0),
    ]))
    .unwrap()
}

fn density_check() -> DensityCheck {
    DensityCheck::new(
        &CheckParams::new(vec![
            CheckParam::new(DensityCheck::PARAM_MIN_SPN, 5i64),
            CheckParam::new(DensityCheck::PARAM_MIN_SPN_AP, 5i64),
            CheckParam::new(DensityCheck::PARAM_MIN_SPN_P, 95i64),
        ]),
        Arc::new(RowRunPolygonizer::identity()),
    )
    .unwrap()
}

fn run_tile<C: GridCheck>(check: &mut C, fixture: &SurveyFixture, tile: &Tile) {
    check.check_started();
    check
        .run(
            &fixture.details,
            tile,
            &fixture.depth.window(tile),
            &fixture.density.window(tile),
            &fixture.uncertainty.window(tile),
            None,
        )
        .unwrap();
    check.check_ended();
}

fn tvu_folded(fixture: &SurveyFixture, tiles: &[Tile]) -> TvuCheck {
    let mut folded = tvu_check();
    for tile in tiles {
        let mut instance = tvu_check();
        run_tile(&mut instance, fixture, tile);
        folded.merge(&instance).unwrap();
    }
    folded
}

fn density_folded(fixture: &SurveyFixture, tiles: &[Tile]) -> DensityCheck {
    let mut folded = density_check();
    for tile in tiles {
        let mut instance = density_check();
        run_tile(&mut instance, fixture, tile);
        folded.merge(&instance).unwrap();
    }
    folded
}

#[test]
fn tvu_counts_are_partition_independent() {
    let fixture = survey_fixture();
    let whole = tvu_folded(&fixture, &[Tile::new(0, 0, 4, 5)]);

    for (tw, th) in [(1, 1), (2, 2), (3, 2), (4, 1), (1, 5)] {
        let tiles = TileScheme::new(tw, th).tiles(4, 5);
        let tiled = tvu_folded(&fixture, &tiles);
        assert_eq!(
            tiled.total_cell_count(),
            whole.total_cell_count(),
            "total differs for {}x{} tiles",
            tw,
            th
        );
        assert_eq!(
            tiled.failed_cell_count(),
            whole.failed_cell_count(),
            "failed differs for {}x{} tiles",
            tw,
            th
        );
        assert_eq!(tiled.get_outputs().state, whole.get_outputs().state);
    }
}

#[test]
fn tvu_merge_order_is_irrelevant() {
    let fixture = survey_fixture();
    let mut tiles = TileScheme::new(2, 2).tiles(4, 5);

    let forward = tvu_folded(&fixture, &tiles);
    tiles.reverse();
    let reverse = tvu_folded(&fixture, &tiles);

    assert_eq!(forward.total_cell_count(), reverse.total_cell_count());
    assert_eq!(forward.failed_cell_count(), reverse.failed_cell_count());
}

#[test]
fn density_histogram_is_partition_independent() {
    let fixture = survey_fixture();
    let whole = density_folded(&fixture, &[Tile::new(0, 0, 4, 5)]);

    for (tw, th) in [(1, 1), (2, 3), (4, 2)] {
        let tiles = TileScheme::new(tw, th).tiles(4, 5);
        let tiled = density_folded(&fixture, &tiles);
        assert_eq!(
            tiled.histogram(),
            whole.histogram(),
            "histogram differs for {}x{} tiles",
            tw,
            th
        );
        assert_eq!(tiled.get_outputs().state, whole.get_outputs().state);
    }
}

#[test]
fn merge_preserves_earliest_start_across_fold() {
    let fixture = survey_fixture();
    let tiles = TileScheme::new(2, 2).tiles(4, 5);

    let mut instances = Vec::new();
    for tile in &tiles {
        let mut instance = tvu_check();
        run_tile(&mut instance, &fixture, tile);
        instances.push(instance);
    }
    let earliest = instances
        .iter()
        .filter_map(|i| i.execution().start)
        .min()
        .unwrap();

    // fold in reverse so the earliest-started instance is merged last
    let mut folded = tvu_check();
    for instance in instances.iter().rev() {
        folded.merge(instance).unwrap();
    }
    assert_eq!(folded.execution().start, Some(earliest));
}
