use std::time::{Duration, Instant};

use ctlwire_channel::{ChannelListener, Clock, MessageChannel, Tag};
use ctlwire_transport::TimedStream;
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, DriveArgs};
use crate::exit::{
    channel_error, CliError, CliResult, CONNECTION_ERROR, FAILURE, SUCCESS, TIMEOUT,
};
use crate::output::{print_exchange, ExchangeOutput, OutputFormat};

pub fn run(args: DriveArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let listener =
        ChannelListener::bind(&args.bind).map_err(|err| channel_error("bind failed", err))?;

    let mut channel = listener
        .accept()
        .map_err(|err| channel_error("accept failed", err))?;
    let peer = channel.peer().to_string();

    let started = Instant::now();
    channel
        .send_text(Tag::Run, &args.task)
        .map_err(|err| channel_error("RUN failed", err))?;
    info!(%peer, task = %args.task, "task handed to worker");

    let result = wait_for_done(&mut channel, wait)?;

    let send_timeout = channel.config().send_timeout;
    let acknowledged = channel
        .send(Tag::Exit, send_timeout)
        .map_err(|err| channel_error("EXIT failed", err))?;
    if !acknowledged {
        warn!(%peer, "worker did not acknowledge EXIT");
    }
    channel.close();

    let out = ExchangeOutput {
        event: "drive",
        peer: &peer,
        acknowledged,
        text: Some(result.as_str()),
        elapsed_ms: ExchangeOutput::elapsed(started.elapsed()),
    };
    print_exchange(&out, format);

    Ok(SUCCESS)
}

/// Wait for the worker's `DONE`, answering any `PING` on the way.
fn wait_for_done<T: TimedStream, C: Clock>(
    channel: &mut MessageChannel<T, C>,
    wait: Duration,
) -> CliResult<String> {
    let deadline = Instant::now() + wait;
    let send_timeout = channel.config().send_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let received = channel
            .receive(remaining)
            .map_err(|err| channel_error("receive failed", err))?;
        let Some(message) = received else {
            if channel.peer_closed() {
                return Err(CliError::new(
                    CONNECTION_ERROR,
                    "worker disconnected before reporting DONE",
                ));
            }
            return Err(CliError::new(
                TIMEOUT,
                format!("worker sent no DONE within {wait:?}"),
            ));
        };

        match message.tag {
            Tag::Done => return Ok(message.text.unwrap_or_default()),
            Tag::Ping => {
                channel
                    .send(Tag::Ack, send_timeout)
                    .map_err(|err| channel_error("ACK failed", err))?;
            }
            Tag::Error => return Err(CliError::new(FAILURE, "worker reported ERROR")),
            Tag::Exiting => {
                return Err(CliError::new(FAILURE, "worker left before reporting DONE"))
            }
            other => debug!(tag = %other, "ignoring message while waiting for DONE"),
        }
    }
}
