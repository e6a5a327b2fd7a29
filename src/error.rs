//! Errors
//!
//! Every failure that aborts a rank computation. Apart from [`RankError::InvalidRank`], which is raised while
//! generating the input before any process starts working, all of them are fatal to the whole process group:
//! the elimination requires agreement of every participant at every column, so nothing is retried.
//!

use super::util::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RankError {
    #[error("requested rank {rank} is greater than the matrix size {size}")]
    InvalidRank { rank: usize, size: usize },

    #[error("a process group must have at least one participant")]
    EmptyGroup,

    #[error("the coordinating process does not hold the global matrix")]
    MissingMatrix,

    #[error("matrix data has {actual} entries, expected {rows} x {cols}")]
    InvalidShape { rows: usize, cols: usize, actual: usize },

    #[error("row block mismatch at process {process}: expected {expected}, found {actual}")]
    BlockMismatch {
        process: ProcessRank,
        expected: usize,
        actual: usize,
    },

    #[error("pivot row {row} reported by process {process} is outside its block {block:?}")]
    ForeignPivot {
        process: ProcessRank,
        row: RowIndex,
        block: RowRange,
    },

    #[error("process {peer} is not a member of a group of size {size}")]
    InvalidPeer { peer: ProcessRank, size: usize },

    #[error("process {peer} left the group")]
    PeerDisconnected { peer: ProcessRank },

    #[error("unexpected message from process {peer}")]
    UnexpectedMessage { peer: ProcessRank },

    #[error("message transport failed: {0}")]
    Transport(String),

    #[error("a participant panicked")]
    ParticipantPanicked,

    #[error("cannot build thread pool: {0}")]
    ThreadPool(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for RankError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RankError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type RankResult<T> = Result<T, RankError>;
