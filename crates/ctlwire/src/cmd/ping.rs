use std::time::Instant;

use ctlwire_channel::MessageChannel;

use crate::cmd::{parse_duration, PingArgs};
use crate::exit::{channel_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_exchange, ExchangeOutput, OutputFormat};

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut channel = MessageChannel::connect(&args.addr, timeout)
        .map_err(|err| channel_error("connect failed", err))?;

    let started = Instant::now();
    let acknowledged = channel
        .ping()
        .map_err(|err| channel_error("ping failed", err))?;

    let out = ExchangeOutput {
        event: "ping",
        peer: &args.addr,
        acknowledged,
        text: None,
        elapsed_ms: ExchangeOutput::elapsed(started.elapsed()),
    };
    print_exchange(&out, format);

    Ok(if acknowledged { SUCCESS } else { FAILURE })
}
