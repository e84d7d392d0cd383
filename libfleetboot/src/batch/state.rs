use std::time::Duration;

use derive_getters::Getters;

/// What happened to one host. Consumed as soon as it is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// Session was ready and the command result classified as success.
    CommandOk,
    /// Session was ready but the command failed or produced output.
    CommandFailed { reason: String },
    /// No usable session: connect fault, auth rejection, or not ready.
    ConnectionFailed { reason: String },
}

impl HostOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, HostOutcome::CommandOk)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            HostOutcome::CommandOk => None,
            HostOutcome::CommandFailed { reason } | HostOutcome::ConnectionFailed { reason } => {
                Some(reason)
            }
        }
    }
}

/// Counters for one run. Reset at the start of every run.
///
/// `success + failure` is always the number of hosts processed so far and
/// `failed_hosts.len() == failure`.
#[derive(Getters, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    success: usize,
    failure: usize,
    failed_hosts: Vec<String>,
    elapsed: Duration,
}

impl RunState {
    pub fn processed(&self) -> usize {
        self.success + self.failure
    }

    pub(crate) fn record(&mut self, host: &str, outcome: &HostOutcome) {
        if outcome.is_success() {
            self.success += 1;
        } else {
            self.failure += 1;
            self.failed_hosts.push(host.to_string());
        }
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_that_failures_keep_encounter_order() {
        let mut state = RunState::default();
        let refused = HostOutcome::ConnectionFailed {
            reason: "refused".into(),
        };
        state.record("c", &refused);
        state.record("a", &HostOutcome::CommandOk);
        state.record(
            "b",
            &HostOutcome::CommandFailed {
                reason: "output".into(),
            },
        );
        state.record("c", &refused);

        assert_eq!(1, *state.success());
        assert_eq!(3, *state.failure());
        assert_eq!(4, state.processed());
        assert_eq!(&vec!["c", "b", "c"], state.failed_hosts());
        assert_eq!(state.failed_hosts().len(), *state.failure());
    }

    #[test]
    fn test_that_only_failures_carry_a_reason() {
        assert_eq!(None, HostOutcome::CommandOk.reason());
        assert_eq!(
            Some("timed out"),
            HostOutcome::ConnectionFailed {
                reason: "timed out".into()
            }
            .reason()
        );
    }
}
