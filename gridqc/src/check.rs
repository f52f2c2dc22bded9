use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::grid2::Grid2;
use common::id_type;
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::data::{InputFileDetails, MaskedGrid};
use crate::density::DensityCheck;
use crate::geometry::{MultiPolygon, Polygonizer};
use crate::tiling::Tile;
use crate::tvu::TvuCheck;

id_type!(CheckId);

#[derive(Debug, Error, Clone)]
pub enum CheckError {
    #[error("No parameter named \"{0}\"")]
    MissingParameter(String),
    #[error("Parameter \"{name}\" is not {expected}")]
    ParameterType {
        name: String,
        expected: &'static str,
    },
    #[error("Cannot merge a {other} accumulator into a {this} check")]
    MergeMismatch {
        this: &'static str,
        other: &'static str,
    },
    #[error("No check registered with id {0}")]
    UnknownCheck(CheckId),
    #[error("Tile window is {got_w}x{got_h}, expected {want_w}x{want_h}")]
    WindowShape {
        got_w: usize,
        got_h: usize,
        want_w: usize,
        want_h: usize,
    },
    #[error("Geometry extraction failed: {0}")]
    Geometry(String),
    #[error("Grid source failed: {0}")]
    Source(String),
}

pub type CheckResult<T> = std::result::Result<T, CheckError>;

/// Final verdict of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckState {
    Pass,
    Warning,
    Fail,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Draft,
    Running,
    Completed,
}

/// Timing and status of one check over the whole tiled pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Idempotent with respect to `start`: repeated calls across tiles keep
    /// the true first start time.
    pub fn mark_started(&mut self) {
        if self.start.is_none() {
            self.start = Some(Utc::now());
        }
        self.status = ExecutionStatus::Running;
    }

    pub fn mark_ended(&mut self) {
        self.end = Some(Utc::now());
        if self.status == ExecutionStatus::Running {
            self.status = ExecutionStatus::Completed;
        }
    }

    pub fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }

    /// Folds another tile's record into this one. Earliest start and latest
    /// end win; the furthest-along status is kept.
    pub fn merge(&mut self, other: &ExecutionRecord) {
        self.start = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.status = self.status.max(other.status);
        if self.error.is_none() {
            self.error = other.error.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}
impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}
impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}
impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckParam {
    pub name: String,
    pub value: ParamValue,
}

impl CheckParam {
    pub fn new(name: &str, value: impl Into<ParamValue>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Immutable parameter list for one check. Lookup is fail-fast: a missing
/// name is a configuration error, never a silent default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckParams(Vec<CheckParam>);

impl CheckParams {
    pub fn new(params: Vec<CheckParam>) -> Self {
        Self(params)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first parameter with the given name.
    pub fn get(&self, name: &str) -> CheckResult<&ParamValue> {
        self.0
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
            .ok_or_else(|| CheckError::MissingParameter(name.to_string()))
    }

    pub fn get_i64(&self, name: &str) -> CheckResult<i64> {
        self.get(name)?
            .as_i64()
            .ok_or_else(|| CheckError::ParameterType {
                name: name.to_string(),
                expected: "an integer",
            })
    }

    pub fn get_f64(&self, name: &str) -> CheckResult<f64> {
        self.get(name)?
            .as_f64()
            .ok_or_else(|| CheckError::ParameterType {
                name: name.to_string(),
                expected: "a number",
            })
    }

    /// Overlays these parameters on a default set: every default name is
    /// present in the result, supplied values win.
    pub fn merged_over(&self, defaults: &CheckParams) -> CheckParams {
        let mut merged: Vec<CheckParam> = defaults
            .0
            .iter()
            .map(|def| {
                self.0
                    .iter()
                    .find(|p| p.name == def.name)
                    .unwrap_or(def)
                    .clone()
            })
            .collect();

        for param in &self.0 {
            if !defaults.0.iter().any(|def| def.name == param.name) {
                merged.push(param.clone());
            }
        }

        CheckParams(merged)
    }
}

impl FromIterator<CheckParam> for CheckParams {
    fn from_iter<I: IntoIterator<Item = CheckParam>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Static identity of a check kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CheckDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

impl CheckDescriptor {
    pub fn check_id(&self) -> CheckId {
        CheckId::from(self.id)
    }
}

/// Diagnostic chart payload. Serializes as
/// `{"type": "histogram", "data": [[key, count], ...]}` with ascending keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Chart {
    Histogram { data: Vec<(i64, u64)> },
}

/// Structured diagnostic payload of a check's outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<Chart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MultiPolygon>,
}

/// Report contract for one completed check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutputs {
    pub execution: ExecutionRecord,
    pub state: CheckState,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CheckData>,
}

/// Contract every grid check implements.
///
/// An instance owns one accumulator. The driver creates a fresh instance per
/// tile, calls `check_started`, `run`, `check_ended` on it, then folds all
/// per-tile instances together with `merge` and calls `get_outputs` once on
/// the folded instance. `merge` must be associative and commutative over the
/// accumulated aggregates; a merged-from instance must not be reused.
pub trait GridCheck: Any + Debug + Send {
    fn descriptor(&self) -> &'static CheckDescriptor;
    fn execution(&self) -> &ExecutionRecord;
    fn execution_mut(&mut self) -> &mut ExecutionRecord;
    fn as_any(&self) -> &dyn Any;

    fn check_started(&mut self) {
        self.execution_mut().mark_started();
    }

    fn check_ended(&mut self) {
        self.execution_mut().mark_ended();
    }

    /// Per-tile computation. Mutates only this instance's accumulator. A
    /// fully masked tile is a valid zero-contribution input.
    fn run(
        &mut self,
        ifd: &InputFileDetails,
        tile: &Tile,
        depth: &MaskedGrid,
        density: &MaskedGrid,
        uncertainty: &MaskedGrid,
        restriction: Option<&Grid2<bool>>,
    ) -> CheckResult<()>;

    /// Folds `other`'s accumulator into this one, including its execution
    /// record (earliest start wins).
    fn merge(&mut self, other: &dyn GridCheck) -> CheckResult<()>;

    /// Pure function of the final accumulator.
    fn get_outputs(&self) -> CheckOutputs;
}

pub type CheckFactory = Box<dyn Fn(&CheckParams) -> CheckResult<Box<dyn GridCheck>> + Send + Sync>;

/// Maps check ids to constructors.
pub struct CheckRegistry {
    factories: HashMap<CheckId, CheckFactory>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with both built-in checks. The polygonizer is handed to
    /// every density instance.
    pub fn standard(polygonizer: Arc<dyn Polygonizer>) -> Self {
        let mut registry = Self::new();
        registry.register(
            DensityCheck::DESCRIPTOR.check_id(),
            Box::new(move |params| {
                DensityCheck::new(params, polygonizer.clone())
                    .map(|check| Box::new(check) as Box<dyn GridCheck>)
            }),
        );
        registry.register(
            TvuCheck::DESCRIPTOR.check_id(),
            Box::new(|params| {
                TvuCheck::new(params).map(|check| Box::new(check) as Box<dyn GridCheck>)
            }),
        );
        registry
    }

    pub fn register(&mut self, id: CheckId, factory: CheckFactory) {
        match self.factories.entry(id) {
            Entry::Occupied(_) => {
                panic!("Check {} is already registered", id);
            }
            Entry::Vacant(entry) => {
                entry.insert(factory);
            }
        }
    }

    pub fn create(&self, id: CheckId, params: &CheckParams) -> CheckResult<Box<dyn GridCheck>> {
        let factory = self
            .factories
            .get(&id)
            .ok_or(CheckError::UnknownCheck(id))?;
        factory(params)
    }

    pub fn ids(&self) -> impl Iterator<Item = CheckId> + '_ {
        self.factories.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.factories.len())
            .finish()
    }
}
