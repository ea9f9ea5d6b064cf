use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use ctlwire_channel::Tag;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod drive;
pub mod ping;
pub mod send;
pub mod version;
pub mod worker;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a peer and check that it acknowledges PING.
    Ping(PingArgs),
    /// Send one text-carrying message and wait for its ACK.
    Send(SendArgs),
    /// Connect to a driver and serve its requests.
    Worker(WorkerArgs),
    /// Accept one worker, hand it a task, and report the result.
    Drive(DriveArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ping(args) => ping::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Worker(args) => worker::run(args, format),
        Command::Drive(args) => drive::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Tags that may carry text.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum TextTag {
    Done,
    Run,
}

impl From<TextTag> for Tag {
    fn from(tag: TextTag) -> Self {
        match tag {
            TextTag::Done => Tag::Done,
            TextTag::Run => Tag::Run,
        }
    }
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Peer address (host:port).
    #[arg(env = "CTLWIRE_ADDR")]
    pub addr: String,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Peer address (host:port).
    #[arg(env = "CTLWIRE_ADDR")]
    pub addr: String,
    /// Message tag.
    #[arg(long, value_enum)]
    pub tag: TextTag,
    /// Text to send.
    #[arg(long)]
    pub data: String,
    /// Use the legacy buffered layout, which delivers all but the last
    /// eight bytes of the text.
    #[arg(long)]
    pub buffered: bool,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Driver address (host:port).
    #[arg(env = "CTLWIRE_ADDR")]
    pub addr: String,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DriveArgs {
    /// Address to listen on (host:port; port 0 picks a free port).
    pub bind: String,
    /// Task text sent to the worker with RUN.
    #[arg(long)]
    pub task: String,
    /// How long to wait for the worker's DONE (e.g. 30s).
    #[arg(long, default_value = "30s")]
    pub wait: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms`, or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
