//! Error types for the landgraph core library.
//!
//! Each pipeline stage owns one error enum. Every variant carries a stable
//! machine-readable code so the CLI can log failures without matching on
//! display strings.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::model::PatchId;

/// An invariant violation raised while assembling or validating a
/// [`crate::PatchGraph`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    /// A link connected a patch to itself.
    #[error("self-loop on patch {id}")]
    SelfLoop {
        /// Patch that appeared at both ends of the link.
        id: PatchId,
    },
    /// A link probability fell outside `[0, 1]`.
    #[error("link {from} -> {to} has probability {probability} outside [0, 1]")]
    ProbabilityOutOfRange {
        /// Source patch of the offending link.
        from: PatchId,
        /// Target patch of the offending link.
        to: PatchId,
        /// The rejected probability value.
        probability: f64,
    },
    /// A link or restoration action referenced a patch that was never emitted.
    #[error("reference to unknown patch {id}")]
    DanglingReference {
        /// The referenced id with no corresponding patch.
        id: PatchId,
    },
    /// A patch weight was negative or not a number.
    #[error("patch {id} has invalid weight {weight}")]
    InvalidWeight {
        /// Patch carrying the rejected weight.
        id: PatchId,
        /// The rejected weight value.
        weight: f64,
    },
    /// A restoration action was priced at zero.
    #[error("restoration action {index} has zero cost")]
    ZeroCostAction {
        /// Position of the action in emission order.
        index: usize,
    },
    /// A restoration action carried no elements.
    #[error("restoration action {index} has no elements")]
    EmptyAction {
        /// Position of the action in emission order.
        index: usize,
    },
    /// A directed link had no mirror row with equal probability.
    #[error("link {from} -> {to} has no mirror with equal probability")]
    AsymmetricLink {
        /// Source patch of the unmatched link.
        from: PatchId,
        /// Target patch of the unmatched link.
        to: PatchId,
    },
    /// Patch ids were not dense and ascending from zero.
    #[error("expected patch id {expected}, found {found}")]
    NonDenseIds {
        /// The id required by dense zero-based numbering.
        expected: PatchId,
        /// The id actually present at that position.
        found: PatchId,
    },
}

impl ModelError {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SelfLoop { .. } => "MODEL_SELF_LOOP",
            Self::ProbabilityOutOfRange { .. } => "MODEL_PROBABILITY_OUT_OF_RANGE",
            Self::DanglingReference { .. } => "MODEL_DANGLING_REFERENCE",
            Self::InvalidWeight { .. } => "MODEL_INVALID_WEIGHT",
            Self::ZeroCostAction { .. } => "MODEL_ZERO_COST_ACTION",
            Self::EmptyAction { .. } => "MODEL_EMPTY_ACTION",
            Self::AsymmetricLink { .. } => "MODEL_ASYMMETRIC_LINK",
            Self::NonDenseIds { .. } => "MODEL_NON_DENSE_IDS",
        }
    }
}

/// An error raised while reading or validating raw survey records.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SurveyError {
    /// The input could not be read.
    #[error("failed to read survey input: {source}")]
    Io {
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The input contained no header row.
    #[error("survey input is missing its header row")]
    MissingHeader,
    /// The header row did not name a required column.
    #[error("survey header does not name column `{column}`")]
    MissingColumn {
        /// Name of the absent column.
        column: &'static str,
    },
    /// A data row had fewer fields than the header promised.
    #[error("line {line} is missing a value for column `{column}`")]
    MissingField {
        /// 1-based line number of the short row.
        line: usize,
        /// Column whose value was absent.
        column: &'static str,
    },
    /// A field could not be parsed as a number.
    #[error("line {line}: cannot parse `{value}` in column `{column}`")]
    MalformedNumber {
        /// 1-based line number of the offending row.
        line: usize,
        /// Column whose value failed to parse.
        column: &'static str,
        /// The raw unparsable text.
        value: String,
    },
    /// Two vertex rows shared the same external id.
    #[error("line {line}: duplicate vertex id {external}")]
    DuplicateVertex {
        /// 1-based line number of the second occurrence.
        line: usize,
        /// The repeated external id.
        external: u64,
    },
    /// A menace value fell outside the `[0, 100]` percentage range.
    #[error("vertex {external} has menace {menace} outside [0, 100]")]
    MenaceOutOfRange {
        /// External id of the offending vertex.
        external: u64,
        /// The rejected menace value.
        menace: f64,
    },
    /// An edge probability fell outside `[0, 1]`.
    #[error("edge {from} -> {to} has probability {probability} outside [0, 1]")]
    EdgeProbabilityOutOfRange {
        /// External id of the edge source.
        from: u64,
        /// External id of the edge target.
        to: u64,
        /// The rejected probability value.
        probability: f64,
    },
    /// An edge endpoint named a vertex id that never appeared in the survey.
    ///
    /// Edges touching vertices removed by the bounding filter are dropped
    /// silently; this variant covers ids that never existed at all.
    #[error("edge references vertex {external}, which does not exist in the survey")]
    UnknownVertex {
        /// The nonexistent external id.
        external: u64,
    },
}

impl SurveyError {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "SURVEY_IO",
            Self::MissingHeader => "SURVEY_MISSING_HEADER",
            Self::MissingColumn { .. } => "SURVEY_MISSING_COLUMN",
            Self::MissingField { .. } => "SURVEY_MISSING_FIELD",
            Self::MalformedNumber { .. } => "SURVEY_MALFORMED_NUMBER",
            Self::DuplicateVertex { .. } => "SURVEY_DUPLICATE_VERTEX",
            Self::MenaceOutOfRange { .. } => "SURVEY_MENACE_OUT_OF_RANGE",
            Self::EdgeProbabilityOutOfRange { .. } => "SURVEY_EDGE_PROBABILITY_OUT_OF_RANGE",
            Self::UnknownVertex { .. } => "SURVEY_UNKNOWN_VERTEX",
        }
    }
}

/// An error raised by the threat-splitting graph builder.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ThreatError {
    /// The configured split offset was not a finite number.
    #[error("split offset {got} is not finite")]
    NonFiniteOffset {
        /// The rejected offset value.
        got: f64,
    },
    /// Survey input was malformed.
    #[error(transparent)]
    Survey(#[from] SurveyError),
    /// Assembling the output graph violated a model invariant.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// A split was recorded without a matching finalization.
    ///
    /// Unreachable through valid input; indicates an internal logic fault.
    #[error("recorded {recorded} split nodes but finalized {finalized}")]
    SplitStateMismatch {
        /// Number of vertices entered into the split map.
        recorded: usize,
        /// Number of split nodes actually finalized.
        finalized: usize,
    },
}

impl ThreatError {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NonFiniteOffset { .. } => "THREAT_NON_FINITE_OFFSET",
            Self::Survey(err) => err.code(),
            Self::Model(err) => err.code(),
            Self::SplitStateMismatch { .. } => "THREAT_SPLIT_STATE_MISMATCH",
        }
    }
}

/// An error raised by the adversarial instance generator.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The budget must be at least one.
    #[error("budget must be at least 1 (got {got})")]
    InvalidBudget {
        /// The rejected budget.
        got: u64,
    },
    /// Epsilon must lie strictly between zero and one.
    #[error("epsilon {got} is outside (0, 1)")]
    InvalidEpsilon {
        /// The rejected epsilon.
        got: f64,
    },
    /// Assembling the instance violated a model invariant.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl GeneratorError {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidBudget { .. } => "GENERATOR_INVALID_BUDGET",
            Self::InvalidEpsilon { .. } => "GENERATOR_INVALID_EPSILON",
            Self::Model(err) => err.code(),
        }
    }
}

/// An error raised while writing or re-reading a serialized file set.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FileSetError {
    /// A file could not be created, written, or read.
    #[error("i/o failure on `{path}`: {source}")]
    Io {
        /// Path of the file that failed.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// A file's contents did not match the expected table format.
    #[error("`{path}` line {line}: {reason}")]
    Malformed {
        /// Path of the malformed file.
        path: PathBuf,
        /// 1-based line number of the offending row.
        line: usize,
        /// Human-readable description of the problem.
        reason: String,
    },
    /// The re-read graph violated a model invariant.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl FileSetError {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "FILESET_IO",
            Self::Malformed { .. } => "FILESET_MALFORMED",
            Self::Model(err) => err.code(),
        }
    }
}

/// An error raised by the geometry helpers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Latitude and longitude slices differed in length.
    #[error("latitude has {latitudes} entries but longitude has {longitudes}")]
    MismatchedLengths {
        /// Number of latitude values supplied.
        latitudes: usize,
        /// Number of longitude values supplied.
        longitudes: usize,
    },
}

impl GeometryError {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MismatchedLengths { .. } => "GEOMETRY_MISMATCHED_LENGTHS",
        }
    }
}
