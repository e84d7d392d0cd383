use std::path::PathBuf;

use async_trait::async_trait;
use clap::ArgMatches;
use color_eyre::eyre::{Result, WrapErr};
use dialoguer::{Input, Password};
use libfleetboot::batch::{BatchError, BatchJob};
use libfleetboot::log::*;
use thiserror::Error;

use crate::config::{self, JobFile};

pub mod check;
pub mod run;

pub const PASSWORD_ENV_VAR: &str = "FLEETBOOT_PASSWORD";

#[derive(Error, Debug)]
pub enum CommandErrors {
    #[error("Prompt interaction failed.")]
    PromptInteractionFailed(
        #[from]
        #[source]
        dialoguer::Error,
    ),
    #[error("Invalid subcommand `{0}`.")]
    InvalidSubcommand(String),
    #[error("No subcommand provided.")]
    NoSubcommandProvided,
    #[error("{0}/{1} hosts failed.")]
    HostsFailed(usize, usize),
    #[error("Batch was cancelled after {0}/{1} hosts.")]
    Cancelled(usize, usize),
}

pub struct CliContext<'a> {
    pub matches: &'a ArgMatches,
}

impl<'a> CliContext<'a> {
    pub fn new(matches: &'a ArgMatches) -> Self {
        Self { matches }
    }
}

#[async_trait]
pub trait Command<'a> {
    fn new() -> Self
    where
        Self: Sized;

    async fn run(&self, context: &'a CliContext) -> Result<()>;
}

pub trait Interactive<'a> {
    fn prompt_for_input(&self, message: &'a str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(message)
            .interact_text()
            .map_err(CommandErrors::PromptInteractionFailed)
            .wrap_err("Prompting user input failed.")
    }

    fn prompt_for_password(&self, message: &'a str) -> Result<String> {
        Password::new()
            .with_prompt(message)
            .interact()
            .map_err(CommandErrors::PromptInteractionFailed)
            .wrap_err("Prompting for password failed.")
    }
}

/// Assemble a [`BatchJob`] from the config file and flags of a subcommand.
/// Flags win over the config file. Missing credentials are prompted for when
/// `prompt` is set and left empty otherwise.
pub(crate) async fn resolve_job<'a, I: Interactive<'a> + ?Sized>(
    interactive: &I,
    matches: &'a ArgMatches,
    prompt: bool,
) -> Result<(BatchJob, JobFile)> {
    let file = match matches.get_one::<String>("config") {
        Some(path) => config::read_job_file(path).await?,
        None => JobFile::default(),
    };

    let hosts = match matches
        .get_one::<String>("hosts")
        .map(PathBuf::from)
        .or_else(|| file.hosts_file.clone())
    {
        Some(path) => Some(config::read_hosts_file(&path).await?),
        None => file.hosts.clone(),
    };
    // Fail before prompting for credentials that would go unused.
    let hosts = hosts
        .ok_or(BatchError::MissingHosts)
        .wrap_err("Pass --hosts or set hosts_file/hosts in the config file")?;

    let username = match matches
        .get_one::<String>("username")
        .cloned()
        .or_else(|| file.username.clone())
    {
        Some(username) => username,
        None if prompt => interactive.prompt_for_input("Username")?,
        None => String::new(),
    };

    let password = match matches
        .get_one::<String>("password")
        .cloned()
        .or_else(|| std::env::var(PASSWORD_ENV_VAR).ok())
    {
        Some(password) => password,
        None if prompt => interactive.prompt_for_password("Password")?,
        None => String::new(),
    };

    let mut builder = BatchJob::builder()
        .username(username)
        .password(password)
        .hosts(hosts)
        .log_errors(matches.get_flag("log-errors") || file.log_errors.unwrap_or(false));
    if let Some(port) = matches.get_one::<u16>("port").copied().or(file.port) {
        builder = builder.port(port);
    }
    if let Some(command) = matches
        .get_one::<String>("command")
        .cloned()
        .or_else(|| file.command.clone())
    {
        builder = builder.command(command);
    }

    let job = builder.build().wrap_err("Invalid batch configuration")?;
    debug!("resolved job for {} hosts", job.hosts().len());
    Ok((job, file))
}
