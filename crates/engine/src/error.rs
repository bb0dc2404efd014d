use crate::world::position::{Direction, PlotId};

/// Failures the engine reports to its caller.
///
/// Structural inconsistencies (asymmetric merge flags) never show up here:
/// they are healed during traversal and only logged.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlotError {
    #[error("unknown plot world `{0}`")]
    UnknownWorld(String),

    #[error("plot {0} has no neighbour to the {1}: coordinate overflow")]
    CoordinateOverflow(PlotId, Direction),

    #[error("invalid grid layout: {0}")]
    InvalidLayout(&'static str),

    #[error("plot {0} has an operation in progress")]
    OperationRunning(PlotId),

    #[error("plot {0} is not claimed")]
    Unowned(PlotId),

    #[error("plot {0} is already claimed")]
    AlreadyClaimed(PlotId),

    #[error("plot {0} is merged and cannot be relocated")]
    Merged(PlotId),

    #[error("plots {0}..{1} do not share a single owner")]
    MixedOwnership(PlotId, PlotId),
}
