use ctlwire_channel::{
    Tag, BUFFERED_REPLY_WAIT, DEFAULT_MAX_CONSECUTIVE_NULLS, LIVENESS_INTERVAL, REPLY_WAIT,
};
use ctlwire_frame::DEFAULT_MAX_PAYLOAD;
use serde_json::{Map, Value};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.extended {
        println!("ctlwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let fields = build_info();
    match format {
        OutputFormat::Json => {
            let object: Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| (key.to_string(), Value::String(value)))
                .collect();
            println!("{}", Value::Object(object));
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            for (key, value) in fields {
                println!("{key}: {value}");
            }
        }
    }

    Ok(SUCCESS)
}

/// Build provenance plus the wire parameters a peer must agree on.
fn build_info() -> Vec<(&'static str, String)> {
    vec![
        ("version", env!("CARGO_PKG_VERSION").to_string()),
        (
            "target",
            option_env!("CTLWIRE_TARGET_TRIPLE")
                .unwrap_or("unknown")
                .to_string(),
        ),
        (
            "profile",
            option_env!("CTLWIRE_BUILD_PROFILE")
                .unwrap_or("unknown")
                .to_string(),
        ),
        ("tags", tag_range()),
        ("max_payload", DEFAULT_MAX_PAYLOAD.to_string()),
        ("null_limit", DEFAULT_MAX_CONSECUTIVE_NULLS.to_string()),
        ("liveness_interval", format!("{}s", LIVENESS_INTERVAL.as_secs())),
        (
            "reply_wait",
            format!(
                "{}s (buffered {}s)",
                REPLY_WAIT.as_secs(),
                BUFFERED_REPLY_WAIT.as_secs()
            ),
        ),
    ]
}

fn tag_range() -> String {
    let first = Tag::ALL[0];
    let last = Tag::ALL[Tag::ALL.len() - 1];
    format!(
        "{first}={:#x}..{last}={:#x}",
        first.as_i32(),
        last.as_i32()
    )
}
