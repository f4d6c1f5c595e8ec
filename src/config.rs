//! Group sizing and analysis options.
//!
//! # Environment Variables
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `GRIDBAND_WORKERS` | Group size to launch (defaults to the grid's row count) |
//! | `GRIDBAND_FLUSH_FINAL_BAND` | `1`/`true`/`yes` reports the band still open after the last row |
//!
//! Unset or unparseable values are ignored.

use std::env;

use crate::error::{Error, Result};

/// Environment variable holding the group size.
pub const WORKERS_ENV: &str = "GRIDBAND_WORKERS";

/// Environment variable enabling [`MergeMode::FlushOnExit`].
pub const FLUSH_ENV: &str = "GRIDBAND_FLUSH_FINAL_BAND";

/// One worker per row: the group is only valid when both counts agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupConfig {
    /// Rows of the grid
    pub rows: usize,
    /// Workers in the group
    pub workers: usize,
}

impl GroupConfig {
    /// Check that the group has exactly one worker per row.
    pub fn validate(&self) -> Result<()> {
        if self.rows != self.workers {
            return Err(Error::GroupSizeMismatch {
                expected: self.rows,
                actual: self.workers,
            });
        }
        Ok(())
    }
}

/// How the band merge treats the band still open after the last row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeMode {
    /// Only bands closed by a disjoint row are reported.
    #[default]
    Faithful,
    /// Additionally report the open band after the loop if its height is
    /// greater than one.
    FlushOnExit,
}

/// Options for [`analyze`](crate::analyze).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Group size; `None` launches one worker per grid row.
    pub workers: Option<usize>,
    /// Band merge behavior.
    pub merge: MergeMode,
}

impl AnalysisOptions {
    /// Defaults overridden by `GRIDBAND_*` environment variables.
    pub fn from_env() -> Self {
        let workers = env::var(WORKERS_ENV).ok().and_then(|s| s.trim().parse().ok());
        let flush = env::var(FLUSH_ENV).ok().is_some_and(|s| parse_flag(&s));
        AnalysisOptions {
            workers,
            merge: if flush {
                MergeMode::FlushOnExit
            } else {
                MergeMode::Faithful
            },
        }
    }

    /// Group configuration for a grid with `rows` rows.
    pub fn group(&self, rows: usize) -> GroupConfig {
        GroupConfig {
            rows,
            workers: self.workers.unwrap_or(rows),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_group_validates() {
        assert!(GroupConfig { rows: 31, workers: 31 }.validate().is_ok());
    }

    #[test]
    fn mismatched_group_fails() {
        let err = GroupConfig { rows: 31, workers: 4 }.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::GroupSizeMismatch {
                expected: 31,
                actual: 4
            }
        ));
    }

    #[test]
    fn group_defaults_to_rows() {
        let opts = AnalysisOptions::default();
        assert_eq!(opts.group(9), GroupConfig { rows: 9, workers: 9 });
        let opts = AnalysisOptions {
            workers: Some(3),
            ..Default::default()
        };
        assert_eq!(opts.group(9).workers, 3);
    }

    #[test]
    fn flag_values() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }

    /// Environment mutation is kept in one test to avoid races between
    /// tests running in parallel.
    #[test]
    fn env_overrides() {
        unsafe {
            env::set_var(WORKERS_ENV, "12");
            env::set_var(FLUSH_ENV, "true");
        }
        let opts = AnalysisOptions::from_env();
        assert_eq!(opts.workers, Some(12));
        assert_eq!(opts.merge, MergeMode::FlushOnExit);

        unsafe {
            env::set_var(WORKERS_ENV, "many");
            env::remove_var(FLUSH_ENV);
        }
        let opts = AnalysisOptions::from_env();
        assert_eq!(opts.workers, None);
        assert_eq!(opts.merge, MergeMode::Faithful);

        unsafe {
            env::remove_var(WORKERS_ENV);
        }
    }
}
