use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use common::grid2::Grid2;
use tracing::debug;

use crate::check::{
    Chart, CheckData, CheckDescriptor, CheckError, CheckOutputs, CheckParam, CheckParams,
    CheckResult, CheckState, ExecutionRecord, GridCheck,
};
use crate::data::{InputFileDetails, MaskedGrid};
use crate::geometry::{MultiPolygon, Polygonizer};
use crate::tiling::Tile;

/// Sounding-density adequacy check.
///
/// Builds a histogram of soundings-per-node over all valid density cells and
/// collects the footprint of cells below the hard minimum. Fails when any
/// node is below the minimum count, or when too small a share of nodes meets
/// the at-percentage threshold.
#[derive(Debug)]
pub struct DensityCheck {
    min_spn: i64,
    min_spn_ap: i64,
    min_spn_p: f64,
    execution: ExecutionRecord,
    histogram: BTreeMap<i64, u64>,
    footprints: MultiPolygon,
    polygonizer: Arc<dyn Polygonizer>,
}

impl DensityCheck {
    pub const DESCRIPTOR: CheckDescriptor = CheckDescriptor {
        id: "5e2afd8a-2ced-4de8-80f5-111c459a7175",
        name: "Density Check",
        version: "1",
    };

    pub const PARAM_MIN_SPN: &'static str = "Minimum Soundings per node";
    pub const PARAM_MIN_SPN_AP: &'static str = "Minimum Soundings per node at percentage";
    pub const PARAM_MIN_SPN_P: &'static str = "Minimum Soundings per node percentage";

    pub fn default_params() -> CheckParams {
        CheckParams::new(vec![
            CheckParam::new(Self::PARAM_MIN_SPN, 5i64),
            CheckParam::new(Self::PARAM_MIN_SPN_AP, 5i64),
            CheckParam::new(Self::PARAM_MIN_SPN_P, 95i64),
        ])
    }

    pub fn new(params: &CheckParams, polygonizer: Arc<dyn Polygonizer>) -> CheckResult<Self> {
        let params = params.merged_over(&Self::default_params());
        Ok(Self {
            min_spn: params.get_i64(Self::PARAM_MIN_SPN)?,
            min_spn_ap: params.get_i64(Self::PARAM_MIN_SPN_AP)?,
            min_spn_p: params.get_f64(Self::PARAM_MIN_SPN_P)?,
            execution: ExecutionRecord::default(),
            histogram: BTreeMap::new(),
            footprints: MultiPolygon::new(),
            polygonizer,
        })
    }

    pub fn histogram(&self) -> &BTreeMap<i64, u64> {
        &self.histogram
    }

    pub fn footprints(&self) -> &MultiPolygon {
        &self.footprints
    }

    fn evaluate(&self) -> (CheckState, Vec<String>) {
        let mut messages = Vec::new();
        let mut state = None;

        if let Some((&lowest, &occurrences)) = self.histogram.iter().next() {
            if lowest < self.min_spn {
                messages.push(format!(
                    "Minimum sounding count of {} occurred {} times",
                    lowest, occurrences
                ));
                state = Some(CheckState::Fail);
            }
        }

        let total: u64 = self.histogram.values().sum();
        let under: u64 = self
            .histogram
            .iter()
            .take_while(|(&count, _)| count < self.min_spn_ap)
            .map(|(_, &occurrences)| occurrences)
            .sum();

        let pct_over = (1.0 - under as f64 / total as f64) * 100.0;
        if pct_over < self.min_spn_p {
            messages.push(format!(
                "{}% of nodes were found to have a sounding count below {}. \
                 This is required to be {}% of all nodes",
                pct_over, self.min_spn_ap, self.min_spn_p
            ));
            state = Some(CheckState::Fail);
        }

        (state.unwrap_or(CheckState::Pass), messages)
    }
}

impl GridCheck for DensityCheck {
    fn descriptor(&self) -> &'static CheckDescriptor {
        &Self::DESCRIPTOR
    }

    fn execution(&self) -> &ExecutionRecord {
        &self.execution
    }

    fn execution_mut(&mut self) -> &mut ExecutionRecord {
        &mut self.execution
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn run(
        &mut self,
        ifd: &InputFileDetails,
        tile: &Tile,
        _depth: &MaskedGrid,
        density: &MaskedGrid,
        _uncertainty: &MaskedGrid,
        _restriction: Option<&Grid2<bool>>,
    ) -> CheckResult<()> {
        if density.width() != tile.width() || density.height() != tile.height() {
            return Err(CheckError::WindowShape {
                got_w: density.width(),
                got_h: density.height(),
                want_w: tile.width(),
                want_h: tile.height(),
            });
        }

        let mut flagged = Grid2::new_filled(tile.width(), tile.height(), false);
        let mut any_flagged = false;

        for (x, y, value) in density.iter_valid() {
            let soundings = value as i64;
            *self.histogram.entry(soundings).or_insert(0) += 1;

            if soundings < self.min_spn {
                *flagged.get_mut(x, y) = true;
                any_flagged = true;
            }
        }

        if any_flagged {
            let fragment = self
                .polygonizer
                .polygonize(&flagged, &ifd.tile_affine(tile), &ifd.projection)
                .map_err(|e| CheckError::Geometry(e.to_string()))?;
            debug!(
                polygons = fragment.polygon_count(),
                ?tile,
                "flagged low-density cells"
            );
            self.footprints.extend(fragment);
        }

        Ok(())
    }

    fn merge(&mut self, other: &dyn GridCheck) -> CheckResult<()> {
        let other_name = other.descriptor().name;
        let other = other
            .as_any()
            .downcast_ref::<DensityCheck>()
            .ok_or(CheckError::MergeMismatch {
                this: Self::DESCRIPTOR.name,
                other: other_name,
            })?;

        self.execution.merge(&other.execution);

        for (&soundings, &occurrences) in &other.histogram {
            *self.histogram.entry(soundings).or_insert(0) += occurrences;
        }
        self.footprints.extend(other.footprints.clone());

        Ok(())
    }

    fn get_outputs(&self) -> CheckOutputs {
        if let Some(error) = &self.execution.error {
            return CheckOutputs {
                execution: self.execution.clone(),
                state: CheckState::Fail,
                messages: vec![error.clone()],
                data: None,
            };
        }

        if self.histogram.is_empty() {
            return CheckOutputs {
                execution: self.execution.clone(),
                state: CheckState::Fail,
                messages: vec![
                    "No counts were extracted, was a valid raster provided".to_string(),
                ],
                data: None,
            };
        }

        let (state, messages) = self.evaluate();

        let chart = Chart::Histogram {
            data: self
                .histogram
                .iter()
                .map(|(&count, &occurrences)| (count, occurrences))
                .collect(),
        };

        CheckOutputs {
            execution: self.execution.clone(),
            state,
            messages,
            data: Some(CheckData {
                chart: Some(chart),
                map: Some(self.footprints.clone()),
            }),
        }
    }
}
