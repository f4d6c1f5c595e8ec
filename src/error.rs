//! Error types for gridband

use thiserror::Error;

/// Result type for gridband operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for group and collective operations
#[derive(Error, Debug)]
pub enum Error {
    /// The group size does not match the number of grid rows
    #[error("The number of processes should be equal to {expected} (got {actual})")]
    GroupSizeMismatch {
        /// Required group size (grid rows)
        expected: usize,
        /// Group size that was requested
        actual: usize,
    },

    /// Invalid rank specified
    #[error("Invalid rank: {rank} (group size {size})")]
    InvalidRank {
        /// The offending rank
        rank: usize,
        /// Size of the group
        size: usize,
    },

    /// Buffer length does not fit the collective
    #[error("Invalid buffer: expected {expected} elements, got {actual}")]
    InvalidBuffer {
        /// Length the collective requires
        expected: usize,
        /// Length that was provided
        actual: usize,
    },

    /// Invalid count specified
    #[error("Invalid count: {0}")]
    InvalidCount(usize),

    /// A record layout failed to commit
    #[error("Invalid record layout for {record}: {reason}")]
    InvalidLayout {
        /// Name of the record type
        record: &'static str,
        /// Why the layout was rejected
        reason: String,
    },

    /// Peers entered different collectives in the same round
    #[error("Collective mismatch at rank {rank}: called {expected}, rank {peer} called {found}")]
    CollectiveMismatch {
        /// Rank that detected the mismatch
        rank: usize,
        /// Operation this rank called
        expected: String,
        /// Peer whose call differed
        peer: usize,
        /// Operation the peer called
        found: String,
    },

    /// The group was aborted by one of its members
    #[error("Process group aborted with code {code}")]
    Aborted {
        /// Abort status
        code: i32,
    },

    /// A worker thread panicked
    #[error("Worker rank {0} panicked")]
    WorkerPanicked(usize),

    /// Grid input could not be used
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error while loading input
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit status a process should report for this error.
    ///
    /// Group aborts carry their own code; everything else maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Aborted { code } => *code,
            _ => 1,
        }
    }

    /// Whether this error is a consequence of another rank aborting the group.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_size_message_names_expected_count() {
        let err = Error::GroupSizeMismatch {
            expected: 31,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "The number of processes should be equal to 31 (got 4)"
        );
        assert_eq!(err.exit_code(), 1);
        assert!(!err.is_abort());
    }

    #[test]
    fn abort_keeps_its_code() {
        let err = Error::Aborted { code: 3 };
        assert_eq!(err.exit_code(), 3);
        assert!(err.is_abort());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
