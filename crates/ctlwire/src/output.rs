use std::io::IsTerminal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ctlwire_channel::Message;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    event: &'static str,
    tag: &'a str,
    text: Option<&'a str>,
    peer: &'a str,
    timestamp: String,
}

/// One line per message a worker receives.
pub fn print_message(message: &Message, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                event: "message",
                tag: message.tag.name(),
                text: message.text.as_deref(),
                peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TAG", "PEER", "TEXT"])
                .add_row(vec![
                    message.tag.name().to_string(),
                    peer.to_string(),
                    message.text().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match &message.text {
            Some(text) => println!("{} from {peer}: {text}", message.tag),
            None => println!("{} from {peer}", message.tag),
        },
    }
}

/// Outcome of a single exchange (`ping`, `send`, `drive`).
#[derive(Serialize)]
pub struct ExchangeOutput<'a> {
    pub event: &'static str,
    pub peer: &'a str,
    pub acknowledged: bool,
    pub text: Option<&'a str>,
    pub elapsed_ms: f64,
}

impl ExchangeOutput<'_> {
    pub fn elapsed(duration: Duration) -> f64 {
        (duration.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
    }
}

pub fn print_exchange(out: &ExchangeOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "PEER", "ACK", "TEXT", "ELAPSED"])
                .add_row(vec![
                    out.event.to_string(),
                    out.peer.to_string(),
                    out.acknowledged.to_string(),
                    out.text.unwrap_or("").to_string(),
                    format!("{:.2}ms", out.elapsed_ms),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}:", out.event);
            println!("  Peer:         {}", out.peer);
            println!("  Acknowledged: {}", out.acknowledged);
            if let Some(text) = out.text {
                println!("  Text:         {text}");
            }
            println!("  Elapsed:      {:.2}ms", out.elapsed_ms);
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
