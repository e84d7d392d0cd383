//! The end-of-batch report. A [`Report`] is derived once from the run state
//! when a batch stops, whether it ran out of hosts or was cancelled.

use std::fmt;
use std::time::Duration;

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

use crate::batch::RunState;

#[derive(Getters, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Hosts in the job, not hosts attempted.
    total: usize,
    success: usize,
    failure: usize,
    failed_hosts: Vec<String>,
    elapsed: Duration,
    cancelled: bool,
}

/// Which summary a report renders as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary<'a> {
    /// At least one host failed.
    Failed {
        failure: usize,
        total: usize,
        failed_hosts: &'a [String],
    },
    /// Nothing failed. `success` may be lower than `total` after a cancel.
    Succeeded { success: usize, total: usize },
    /// The job had no hosts at all.
    NothingToDo,
}

impl Report {
    pub fn from_state(state: &RunState, total: usize, cancelled: bool) -> Self {
        Self {
            total,
            success: *state.success(),
            failure: *state.failure(),
            failed_hosts: state.failed_hosts().clone(),
            elapsed: *state.elapsed(),
            cancelled,
        }
    }

    /// Hosts that were actually attempted.
    pub fn attempted(&self) -> usize {
        self.success + self.failure
    }

    pub fn summary(&self) -> Summary<'_> {
        if self.failure > 0 {
            Summary::Failed {
                failure: self.failure,
                total: self.total,
                failed_hosts: &self.failed_hosts,
            }
        } else if self.total == 0 {
            Summary::NothingToDo
        } else {
            Summary::Succeeded {
                success: self.success,
                total: self.total,
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure == 0 && !self.cancelled && self.success == self.total
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.summary() {
            Summary::Failed {
                failure,
                total,
                failed_hosts,
            } => {
                writeln!(f, "{}/{} hosts failed.", failure, total)?;
                writeln!(f, "Hosts that failed:")?;
                writeln!(f, "{}", "*".repeat(15))?;
                for host in failed_hosts {
                    writeln!(f, "{}", host)?;
                }
            }
            Summary::Succeeded { success, total } => {
                writeln!(f, "{}/{} hosts succeeded.", success, total)?;
            }
            Summary::NothingToDo => {
                writeln!(f, "No hosts to process, nothing to do.")?;
            }
        }
        if self.cancelled {
            writeln!(
                f,
                "Batch was cancelled after {} of {} hosts.",
                self.attempted(),
                self.total
            )?;
        }
        writeln!(f)?;
        write!(f, "Total time taken: {:?}", self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(success: usize, failed_hosts: &[&str], total: usize, cancelled: bool) -> Report {
        Report {
            total,
            success,
            failure: failed_hosts.len(),
            failed_hosts: failed_hosts.iter().map(|h| h.to_string()).collect(),
            elapsed: Duration::from_millis(1500),
            cancelled,
        }
    }

    #[test]
    fn test_that_any_failure_selects_the_failure_summary() {
        let report = report(3, &["10.0.0.4"], 4, false);
        assert_eq!(
            Summary::Failed {
                failure: 1,
                total: 4,
                failed_hosts: &["10.0.0.4".to_string()],
            },
            report.summary()
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_that_failure_rendering_lists_hosts_in_order() {
        let rendered = report(0, &["b", "a"], 2, false).to_string();
        assert_eq!(
            "2/2 hosts failed.\nHosts that failed:\n***************\nb\na\n\nTotal time taken: 1.5s",
            rendered
        );
    }

    #[test]
    fn test_that_success_rendering_shows_the_ratio() {
        let report = report(2, &[], 2, false);
        assert!(report.is_success());
        assert_eq!(
            "2/2 hosts succeeded.\n\nTotal time taken: 1.5s",
            report.to_string()
        );
    }

    #[test]
    fn test_that_an_empty_job_has_nothing_to_do() {
        let report = report(0, &[], 0, false);
        assert_eq!(Summary::NothingToDo, report.summary());
        assert!(report.to_string().starts_with("No hosts to process"));
    }

    #[test]
    fn test_that_cancelled_reports_say_how_far_they_got() {
        let report = report(1, &[], 3, true);
        assert_eq!(
            Summary::Succeeded {
                success: 1,
                total: 3
            },
            report.summary()
        );
        assert!(!report.is_success());
        assert!(report
            .to_string()
            .contains("Batch was cancelled after 1 of 3 hosts."));
    }
}
