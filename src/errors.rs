use thiserror::Error;

use crate::point::Point;

/// Errors raised while validating or executing a move against the engine.
///
/// All variants but [`EngineError::BackendFailure`] are rejections: the
/// circuit and classical board are left untouched and the caller may retry
/// with a different command. `BackendFailure` is fatal — the embedding
/// caller should discard the engine instance.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("point {0:?} is out of bounds")]
    OutOfBounds(Point),

    #[error("source square {0:?} is empty")]
    EmptySource(Point),

    #[error("piece at {0:?} cannot move to {1:?}")]
    IllegalGeometry(Point, Point),

    #[error("split/merge requires two distinct squares, got {0:?} twice")]
    SameSquare(Point),

    #[error("target square {0:?} is occupied by a different piece")]
    TargetOccupiedWrongPiece(Point),

    #[error("merge sources {0:?} and {1:?} do not hold the same piece")]
    MergeMismatch(Point, Point),

    #[error("pawn at {0:?} has no valid move to {1:?}")]
    InvalidPawnMove(Point, Point),

    #[error("quantum backend returned a malformed or empty sample: {0}")]
    BackendFailure(String),
}

/// Errors raised by the CLI / configuration layer (out of the core engine).
#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid algebraic command: {0}")]
    BadCommand(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type EngineResult<T> = Result<T, EngineError>;
pub type CliResult<T> = Result<T, CliError>;
