//! Logging macros used across the crate, plus the panic/error report hook
//! binaries install at startup.
pub use color_eyre::eyre::eyre;
pub use tracing::{debug, error, info, span, trace, warn};

/// Crate prefixes whose frames only add noise to a failed batch report: the
/// async runtime, the SSH transport, and the reporting machinery itself.
const NOISY_FRAME_PREFIXES: &[&str] = &[
    "tokio::",
    "tracing::",
    "color_eyre::",
    "thrussh::",
    "thrussh_keys::",
    "futures_util::",
    "<core::",
];

fn is_noisy_frame(name: &str) -> bool {
    NOISY_FRAME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Install color_eyre as the global error handler, pointing users at the
/// fleetboot issue tracker and hiding runtime and transport frames.
#[tracing::instrument]
pub fn install_color_eyre() -> color_eyre::eyre::Result<()> {
    color_eyre::config::HookBuilder::default()
        .issue_url(concat!(env!("CARGO_PKG_REPOSITORY"), "/issues/new"))
        .add_issue_metadata("version", env!("CARGO_PKG_VERSION"))
        .add_default_filters()
        .add_frame_filter(Box::new(|frames| {
            frames.retain(|frame| {
                frame
                    .name
                    .as_deref()
                    .map_or(true, |name| !is_noisy_frame(name))
            });
        }))
        .install()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_that_transport_and_runtime_frames_are_hidden() {
        assert!(is_noisy_frame("thrussh::client::connect"));
        assert!(is_noisy_frame("thrussh_keys::key::PublicKey::fingerprint"));
        assert!(is_noisy_frame("tokio::runtime::park::CachedParkThread::block_on"));
    }

    #[test]
    fn test_that_fleetboot_frames_are_kept() {
        assert!(!is_noisy_frame("libfleetboot::batch::runner::BatchRunner<P>::run"));
        assert!(!is_noisy_frame("fleetboot::commands::run::RunCommand::run"));
    }
}
