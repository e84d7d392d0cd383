#![forbid(unsafe_code)]

use clap::{command, value_parser, Arg, ArgAction, ArgMatches};
use color_eyre::eyre::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::commands::{Command, CommandErrors};

mod commands;
mod config;
mod render;

use libfleetboot::log::*;

/// Arguments shared by every subcommand that resolves a job.
fn job_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .help("Path to a YAML job file. Flags override its values.")
            .long("config"),
        Arg::new("hosts")
            .help("Path to the hosts file, one host per line.")
            .short('H')
            .long("hosts"),
        Arg::new("username")
            .help("Admin username for every host. Prompted for if missing.")
            .short('u')
            .long("username"),
        Arg::new("password")
            .help("Admin password. Falls back to $FLEETBOOT_PASSWORD, then a prompt.")
            .long("password"),
        Arg::new("port")
            .help("SSH port. Defaults to 22.")
            .short('p')
            .long("port")
            .value_parser(value_parser!(u16)),
        Arg::new("command")
            .help("Command to run on every host. Defaults to `reboot`.")
            .short('c')
            .long("command"),
        Arg::new("log-errors")
            .help("Append connection and execution faults to the error log.")
            .short('e')
            .long("log-errors")
            .action(ArgAction::SetTrue),
    ]
}

fn install_logger(matches: &ArgMatches) {
    let quiet = matches.get_flag("quiet");
    let verbose = matches.get_count("verbose") as usize;
    let level = if quiet && verbose == 0 {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::ERROR,
            1 => LevelFilter::WARN,
            2 => LevelFilter::INFO,
            3 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let timer = tracing_subscriber::fmt::time::UtcTime::new(time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ));
    let builder = tracing_subscriber::fmt::SubscriberBuilder::default()
        .with_timer(timer)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .with_max_level(level);

    if matches.get_flag("log-json") {
        builder.json().finish().init();
    } else {
        builder.compact().finish().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre()?;

    // Command configuration
    let matches = command!()
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Turn debugging information on. Overrides -q. Can specify up to -vvvv.")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Silence all log output. Overridden by -v.")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help("Write logs to stderr as JSON.")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            command!("run")
                .about("Run the command on every host, one at a time. Ctrl-C cancels after the current host.")
                .args(job_args())
                .arg(
                    Arg::new("error-log")
                        .help("Where --log-errors appends faults. Defaults to ./error.log.")
                        .long("error-log"),
                )
                .arg(
                    Arg::new("connect-timeout")
                        .help("Give up connecting to a host after this many seconds.")
                        .long("connect-timeout")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("output")
                        .help("Progress output: text on stdout, JSON lines on stdout, or log records only.")
                        .short('o')
                        .long("output")
                        .value_parser(["text", "json", "log"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("check")
                .about("Validate the job configuration and list the hosts without connecting.")
                .args(job_args()),
        )
        .subcommand_required(true)
        .get_matches();

    // Set up logging
    install_logger(&matches);

    // Run the commands
    if let Some((subcommand, matches)) = matches.subcommand() {
        let ctx = commands::CliContext::new(matches);
        debug!(
            "matched subcommand {} with matches: {:?}",
            &subcommand,
            &matches.ids().map(|id| id.as_str()).collect::<Vec<_>>()
        );
        match subcommand {
            "run" => commands::run::RunCommand::new().run(&ctx).await?,
            "check" => commands::check::CheckCommand::new().run(&ctx).await?,
            _ => return Err(CommandErrors::InvalidSubcommand(subcommand.to_string()).into()),
        }
    } else {
        return Err(CommandErrors::NoSubcommandProvided.into());
    }
    Ok(())
}
