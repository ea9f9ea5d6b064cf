use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ctlwire_channel::{Clock, Message, MessageChannel, Result as ChannelResult, Tag};
use ctlwire_transport::TimedStream;
use tracing::{info, warn};

use crate::cmd::{parse_duration, WorkerArgs};
use crate::exit::{channel_error, CliError, CliResult, CONNECTION_ERROR, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

/// Longest a single receive blocks before Ctrl-C is checked again.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub fn run(args: WorkerArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut channel = MessageChannel::connect(&args.addr, timeout)
        .map_err(|err| channel_error("connect failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    serve(&mut channel, &running, args.count, timeout, |message| {
        print_message(message, &args.addr, format)
    })?;

    channel.close();
    Ok(SUCCESS)
}

/// Receive and answer messages until the driver ends the session, `count`
/// messages have been handled, or `running` is cleared.
///
/// A driver that disconnects without saying goodbye is a connection error.
fn serve<T: TimedStream, C: Clock>(
    channel: &mut MessageChannel<T, C>,
    running: &AtomicBool,
    count: Option<usize>,
    timeout: Duration,
    mut report: impl FnMut(&Message),
) -> CliResult<()> {
    let mut received = 0usize;
    while running.load(Ordering::SeqCst) {
        let message = match channel.receive(POLL_INTERVAL) {
            Ok(Some(message)) => message,
            Ok(None) if channel.peer_closed() => {
                return Err(CliError::new(
                    CONNECTION_ERROR,
                    "driver closed the connection",
                ));
            }
            Ok(None) => continue,
            Err(err) => return Err(channel_error("receive failed", err)),
        };

        report(&message);
        received = received.saturating_add(1);

        let flow = respond(channel, &message, timeout)
            .map_err(|err| channel_error("reply failed", err))?;
        if flow == Flow::Stop {
            info!(tag = %message.tag, "driver ended the session");
            break;
        }
        if count.is_some_and(|count| received >= count) {
            break;
        }
    }
    Ok(())
}

/// Answer one message the way a worker must.
///
/// `PING` gets an `ACK`, `RUN` is answered with `DONE` echoing its text,
/// and `EXIT` or `EXITING` end the session. Acknowledgements the protocol
/// requires of every receiver have already been sent by `receive`.
fn respond<T: TimedStream, C: Clock>(
    channel: &mut MessageChannel<T, C>,
    message: &Message,
    timeout: Duration,
) -> ChannelResult<Flow> {
    match message.tag {
        Tag::Ping => {
            if !channel.send(Tag::Ack, timeout)? {
                warn!("ACK for PING was not fully written");
            }
            Ok(Flow::Continue)
        }
        Tag::Run => {
            channel.send_text(Tag::Done, message.text())?;
            Ok(Flow::Continue)
        }
        Tag::Exit | Tag::Exiting => Ok(Flow::Stop),
        Tag::Null | Tag::Ack | Tag::Done | Tag::Error => Ok(Flow::Continue),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
