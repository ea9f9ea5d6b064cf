use std::borrow::Cow;
use std::time::Instant;

use ctlwire_channel::{MessageChannel, Tag};
use ctlwire_frame::buffered_payload;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_exchange, ExchangeOutput, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let tag = Tag::from(args.tag);
    let delivered = delivered_text(&args.data, args.buffered)?;

    let mut channel = MessageChannel::connect(&args.addr, timeout)
        .map_err(|err| channel_error("connect failed", err))?;

    let started = Instant::now();
    let sent = if args.buffered {
        channel.send_buffer(tag, &args.data)
    } else {
        channel.send_text(tag, &args.data)
    };
    sent.map_err(|err| channel_error("send failed", err))?;

    let out = ExchangeOutput {
        event: "send",
        peer: &args.addr,
        acknowledged: !delivered.is_empty(),
        text: Some(&*delivered),
        elapsed_ms: ExchangeOutput::elapsed(started.elapsed()),
    };
    print_exchange(&out, format);

    Ok(SUCCESS)
}

/// The text the peer will actually see.
///
/// A buffered send that would deliver nothing is refused: the receiver
/// would wait for an acknowledgement that never comes.
fn delivered_text(data: &str, buffered: bool) -> CliResult<Cow<'_, str>> {
    if !buffered {
        return Ok(Cow::Borrowed(data));
    }
    let payload = buffered_payload(data);
    if payload.is_empty() {
        return Err(CliError::new(
            USAGE,
            "--buffered needs more than 8 bytes of --data; the last 8 are not delivered",
        ));
    }
    Ok(String::from_utf8_lossy(payload))
}
