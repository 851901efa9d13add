//! Landgraph core library.
//!
//! Turns raw ecological survey tables into the patch-graph file format the
//! external landscape-connectivity optimizer consumes, and generates small
//! adversarial instances that defeat greedy restoration policies. Both
//! producers are single-threaded batch transforms: read everything, build
//! the whole [`PatchGraph`] in memory, serialize once.

mod error;
mod files;
mod model;

pub mod geometry;
pub mod survey;
pub mod threat;
pub mod worst_case;

pub use crate::{
    error::{FileSetError, GeneratorError, GeometryError, ModelError, SurveyError, ThreatError},
    files::GraphFileSet,
    model::{ActionElement, Link, Patch, PatchGraph, PatchId, RestorationAction},
    survey::{Bounds, SurveyEdge, SurveyVertex},
    threat::ThreatGraphBuilder,
    worst_case::{WorstCaseGenerator, WorstCaseKind},
};
