use std::any::Any;

use common::grid2::Grid2;

use crate::check::{
    CheckDescriptor, CheckError, CheckOutputs, CheckParam, CheckParams, CheckResult, CheckState,
    ExecutionRecord, GridCheck,
};
use crate::data::{InputFileDetails, MaskedGrid};
use crate::tiling::Tile;

/// Total vertical uncertainty compliance check.
///
/// Each cell's allowable uncertainty is derived from a constant depth error,
/// a depth-dependent error factor, and the cell's own depth. The check
/// passes when the share of compliant cells meets the acceptable area
/// percentage.
#[derive(Debug)]
pub struct TvuCheck {
    depth_error: f64,
    depth_error_factor: f64,
    acceptable_area_pct: f64,
    execution: ExecutionRecord,
    total_cell_count: u64,
    failed_cell_count: u64,
}

impl TvuCheck {
    pub const DESCRIPTOR: CheckDescriptor = CheckDescriptor {
        id: "b5c0469c-6559-4aea-bf9c-d0b337550e89",
        name: "Total Vertical Uncertainty Check",
        version: "1",
    };

    pub const PARAM_DEPTH_ERROR: &'static str = "Constant Depth Error";
    pub const PARAM_DEPTH_ERROR_FACTOR: &'static str = "Factor of Depth Dependent Errors";
    pub const PARAM_ACCEPTABLE_AREA_PCT: &'static str = "Acceptable Area Percentage";

    pub fn default_params() -> CheckParams {
        CheckParams::new(vec![
            CheckParam::new(Self::PARAM_DEPTH_ERROR, 1.0),
            CheckParam::new(Self::PARAM_DEPTH_ERROR_FACTOR, 1.0),
            CheckParam::new(Self::PARAM_ACCEPTABLE_AREA_PCT, 100.0),
        ])
    }

    pub fn new(params: &CheckParams) -> CheckResult<Self> {
        let params = params.merged_over(&Self::default_params());
        Ok(Self {
            depth_error: params.get_f64(Self::PARAM_DEPTH_ERROR)?,
            depth_error_factor: params.get_f64(Self::PARAM_DEPTH_ERROR_FACTOR)?,
            acceptable_area_pct: params.get_f64(Self::PARAM_ACCEPTABLE_AREA_PCT)?,
            execution: ExecutionRecord::default(),
            total_cell_count: 0,
            failed_cell_count: 0,
        })
    }

    /// Root sum square of the constant error and the depth-proportional
    /// error for a node at the given depth.
    pub fn allowable_uncertainty(&self, depth: f64) -> f64 {
        let depth_dependent = self.depth_error_factor * depth.abs();
        (self.depth_error * self.depth_error + depth_dependent * depth_dependent).sqrt()
    }

    pub fn total_cell_count(&self) -> u64 {
        self.total_cell_count
    }

    pub fn failed_cell_count(&self) -> u64 {
        self.failed_cell_count
    }
}

impl GridCheck for TvuCheck {
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
        _ifd: &InputFileDetails,
        tile: &Tile,
        depth: &MaskedGrid,
        density: &MaskedGrid,
        uncertainty: &MaskedGrid,
        restriction: Option<&Grid2<bool>>,
    ) -> CheckResult<()> {
        for grid in [depth, density, uncertainty] {
            if grid.width() != tile.width() || grid.height() != tile.height() {
                return Err(CheckError::WindowShape {
                    got_w: grid.width(),
                    got_h: grid.height(),
                    want_w: tile.width(),
                    want_h: tile.height(),
                });
            }
        }
        if let Some(inside) = restriction {
            if inside.width() != tile.width() || inside.height() != tile.height() {
                return Err(CheckError::WindowShape {
                    got_w: inside.width(),
                    got_h: inside.height(),
                    want_w: tile.width(),
                    want_h: tile.height(),
                });
            }
        }

        for y in 0..tile.height() {
            for x in 0..tile.width() {
                // cells outside the survey-limit restriction do not count
                // towards the surface at all
                if let Some(inside) = restriction {
                    if !*inside.get(x, y) {
                        continue;
                    }
                }

                // a cell masked in any of the three surfaces is excluded
                if !density.is_valid(x, y) {
                    continue;
                }
                let (depth_value, uncertainty_value) = match (depth.get(x, y), uncertainty.get(x, y))
                {
                    (Some(d), Some(u)) => (d as f64, u as f64),
                    _ => continue,
                };

                self.total_cell_count += 1;
                if uncertainty_value.abs() > self.allowable_uncertainty(depth_value) {
                    self.failed_cell_count += 1;
                }
            }
        }

        Ok(())
    }

    fn merge(&mut self, other: &dyn GridCheck) -> CheckResult<()> {
        let other_name = other.descriptor().name;
        let other = other
            .as_any()
            .downcast_ref::<TvuCheck>()
            .ok_or(CheckError::MergeMismatch {
                this: Self::DESCRIPTOR.name,
                other: other_name,
            })?;

        self.execution.merge(&other.execution);
        self.total_cell_count += other.total_cell_count;
        self.failed_cell_count += other.failed_cell_count;

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

        if self.total_cell_count == 0 {
            return CheckOutputs {
                execution: self.execution.clone(),
                state: CheckState::Fail,
                messages: vec![
                    "No cells were extracted, was a valid raster provided".to_string(),
                ],
                data: None,
            };
        }

        let passing_pct = (self.total_cell_count - self.failed_cell_count) as f64
            / self.total_cell_count as f64
            * 100.0;

        let mut messages = Vec::new();
        let state = if passing_pct >= self.acceptable_area_pct {
            CheckState::Pass
        } else {
            messages.push(format!(
                "{} of {} nodes exceeded the allowable uncertainty ({:.2}% passed, \
                 {}% required)",
                self.failed_cell_count,
                self.total_cell_count,
                passing_pct,
                self.acceptable_area_pct
            ));
            CheckState::Fail
        };

        CheckOutputs {
            execution: self.execution.clone(),
            state,
            messages,
            data: None,
        }
    }
}
