//! Turns batch events into terminal output. This is the only place that
//! writes progress to stdout.

use std::io::Write;

use color_eyre::eyre::Result;
use libfleetboot::event::{BatchEvent, ChannelEventSource};
use libfleetboot::log::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    /// One JSON object per event, one per line.
    Json,
    /// No stdout progress; events only go to the tracing subscriber.
    Log,
}

impl OutputFormat {
    pub fn from_arg(arg: &str) -> Self {
        match arg {
            "json" => OutputFormat::Json,
            "log" => OutputFormat::Log,
            _ => OutputFormat::Text,
        }
    }
}

/// Render a single event. Attempt lines are left open so the verdict lands
/// on the same line.
pub fn render_text(event: &BatchEvent) -> String {
    match event {
        BatchEvent::Started { total } => format!(
            "* Starting batch on {} hosts, one at a time. This may take a few minutes...\n\n",
            total
        ),
        BatchEvent::AttemptingHost { host } => format!("** {}...", host),
        BatchEvent::HostSucceeded { .. } => " [OK]\n".to_string(),
        BatchEvent::HostFailed {
            reason: Some(reason),
            ..
        } => format!(" [ERR] {}\n", reason),
        BatchEvent::HostFailed { reason: None, .. } => " [ERR]\n".to_string(),
        BatchEvent::CancellationRequested => {
            "\n* A cancel operation has been initiated...\n".to_string()
        }
        BatchEvent::Finished(report) => format!("\n\n{}\n", report),
    }
}

/// Drain `source` until the batch reports, printing as events arrive.
pub async fn render(mut source: ChannelEventSource, format: OutputFormat) -> Result<()> {
    let mut stdout = std::io::stdout();
    while let Some(event) = source.source().await {
        match format {
            OutputFormat::Text => write!(stdout, "{}", render_text(&event))?,
            OutputFormat::Json => writeln!(stdout, "{}", serde_json::to_string(&event)?)?,
            OutputFormat::Log => continue,
        }
        stdout.flush()?;
    }
    debug!("renderer finished");
    Ok(())
}
