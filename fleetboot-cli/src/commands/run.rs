use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use color_eyre::eyre::Result;
use libfleetboot::batch::BatchRunner;
use libfleetboot::error_log::{FileErrorLog, DEFAULT_ERROR_LOG_FILE_NAME};
use libfleetboot::event::{ChannelEventSink, EventSink, TracingEventSink};
use libfleetboot::log::*;
use libfleetboot::session::ssh::SshSessionProvider;

use super::{resolve_job, CommandErrors, Interactive};
use crate::render::{self, OutputFormat};

pub struct RunCommand;

#[async_trait]
impl<'a> super::Command<'a> for RunCommand {
    fn new() -> Self
    where
        Self: Sized,
    {
        Self
    }

    async fn run(&self, context: &'a super::CliContext) -> Result<()> {
        let matches = context.matches;
        let (job, file) = resolve_job(self, matches, true).await?;

        let error_log = matches
            .get_one::<String>("error-log")
            .map(PathBuf::from)
            .or(file.error_log)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ERROR_LOG_FILE_NAME));
        let connect_timeout = matches
            .get_one::<u64>("connect-timeout")
            .copied()
            .or(file.connect_timeout_secs)
            .map(Duration::from_secs);
        let format = matches
            .get_one::<String>("output")
            .map(|output| OutputFormat::from_arg(output))
            .unwrap_or(OutputFormat::Text);

        let mut provider = SshSessionProvider::new();
        if let Some(timeout) = connect_timeout {
            provider = provider.with_connect_timeout(timeout);
        }

        let (sink, renderer) = match format {
            OutputFormat::Log => (Arc::new(TracingEventSink) as Arc<dyn EventSink>, None),
            _ => {
                let (sink, source) = ChannelEventSink::channel(1024);
                let renderer = tokio::task::spawn(render::render(source, format));
                (Arc::new(sink) as Arc<dyn EventSink>, Some(renderer))
            }
        };
        let mut runner = BatchRunner::new(job, provider, sink)
            .with_error_sink(Arc::new(FileErrorLog::new(error_log)));

        let handle = runner.cancel_handle();
        let ctrl_c = tokio::task::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => handle.cancel().await,
                Err(err) => warn!("could not listen for ctrl-c: {}", err),
            }
        });

        let report = runner.run().await;
        ctrl_c.abort();
        drop(runner);
        if let Some(renderer) = renderer {
            renderer.await??;
        }

        if *report.failure() > 0 {
            return Err(CommandErrors::HostsFailed(*report.failure(), *report.total()).into());
        }
        if *report.cancelled() {
            return Err(CommandErrors::Cancelled(report.attempted(), *report.total()).into());
        }
        Ok(())
    }
}

impl<'a> Interactive<'a> for RunCommand {}
