use async_trait::async_trait;
use color_eyre::eyre::Result;
use libfleetboot::batch::BatchJob;
use libfleetboot::log::*;

use super::{resolve_job, Interactive};

/// Resolve the job exactly as `run` would, print it, and connect to nothing.
pub struct CheckCommand;

impl CheckCommand {
    fn describe(&self, job: &BatchJob) -> String {
        let mut out = String::new();
        out.push_str("* job is valid.\n");
        out.push_str(&format!("** command: {}\n", job.command()));
        out.push_str(&format!("** port: {}\n", job.port()));
        let username = job.credentials().username();
        if username.is_empty() {
            out.push_str("** username: (will prompt)\n");
        } else {
            out.push_str(&format!("** username: {}\n", username));
        }
        out.push_str(&format!("** log errors: {}\n", job.log_errors()));
        out.push_str(&format!("** hosts ({}):\n", job.hosts().len()));
        for host in job.hosts() {
            out.push_str(&format!("*** {}\n", host));
        }
        out
    }
}

#[async_trait]
impl<'a> super::Command<'a> for CheckCommand {
    fn new() -> Self
    where
        Self: Sized,
    {
        Self
    }

    async fn run(&self, context: &'a super::CliContext) -> Result<()> {
        let (job, _file) = resolve_job(self, context.matches, false).await?;
        info!("job is valid: {} hosts", job.hosts().len());
        print!("{}", self.describe(&job));
        Ok(())
    }
}

impl<'a> Interactive<'a> for CheckCommand {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_that_descriptions_list_every_host_in_order() -> Result<()> {
        let job = BatchJob::builder()
            .hosts(["ap-2", "ap-1"])
            .username("")
            .password("")
            .build()?;
        let described = CheckCommand.describe(&job);
        assert!(described.contains("** command: reboot\n"));
        assert!(described.contains("** port: 22\n"));
        assert!(described.contains("** username: (will prompt)\n"));
        assert!(described.ends_with("** hosts (2):\n*** ap-2\n*** ap-1\n"));
        Ok(())
    }
}
