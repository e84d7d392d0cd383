use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Optional YAML job file. Every field can also be given as a flag, and
/// flags take precedence. Passwords are deliberately not read from here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobFile {
    pub hosts_file: Option<PathBuf>,
    pub hosts: Option<Vec<String>>,
    pub username: Option<String>,
    pub port: Option<u16>,
    pub command: Option<String>,
    pub log_errors: Option<bool>,
    pub error_log: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
}

#[tracing::instrument(skip_all)]
pub async fn read_job_file<P: AsRef<Path>>(path: P) -> Result<JobFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed reading config file {}", path.display()))?;
    parse_job_file(&contents)
}

pub fn parse_job_file(contents: &str) -> Result<JobFile> {
    serde_yaml::from_str(contents).wrap_err("deserializing job config")
}

#[tracing::instrument(skip_all)]
pub async fn read_hosts_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed reading hosts file {}", path.display()))?;
    Ok(parse_hosts(&contents))
}

/// One host per line. Blank lines and `#` comments are skipped; order and
/// duplicates are kept.
pub fn parse_hosts(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use color_eyre::eyre::Result;

    use super::*;

    #[test]
    fn test_that_hosts_files_keep_order_and_duplicates() {
        let contents = "10.0.0.2\r\n\r\n  10.0.0.1  \n# spare\n10.0.0.2\n";
        assert_eq!(
            vec!["10.0.0.2", "10.0.0.1", "10.0.0.2"],
            parse_hosts(contents)
        );
    }

    #[test]
    fn test_that_an_empty_hosts_file_yields_no_hosts() {
        assert!(parse_hosts("\n\n# nothing here\n").is_empty());
    }

    #[tokio::test]
    async fn test_that_hosts_files_are_read_from_disk() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "ap-lobby")?;
        writeln!(file, "ap-kitchen")?;
        assert_eq!(
            vec!["ap-lobby", "ap-kitchen"],
            read_hosts_file(file.path()).await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_that_missing_hosts_files_are_an_error() {
        assert!(read_hosts_file("/definitely/not/here/hosts.txt")
            .await
            .is_err());
    }

    #[test]
    fn test_that_job_files_parse_partially() -> Result<()> {
        let file = parse_job_file(
            "hosts_file: aps.txt\nusername: ubnt\nport: 2222\nlog_errors: true\n",
        )?;
        assert_eq!(
            JobFile {
                hosts_file: Some(PathBuf::from("aps.txt")),
                username: Some("ubnt".into()),
                port: Some(2222),
                log_errors: Some(true),
                ..Default::default()
            },
            file
        );
        Ok(())
    }

    #[test]
    fn test_that_job_files_reject_unknown_keys() {
        assert!(parse_job_file("password: hunter2\n").is_err());
    }
}
