//! Minimal worker: connects to a driver and echoes every task back as DONE.
//!
//! Run with:
//!   cargo run --example worker -- 127.0.0.1:7400

use std::time::Duration;

use ctlwire::channel::{MessageChannel, Tag};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7400".to_string());

    let mut channel = MessageChannel::connect(&addr, Duration::from_secs(5))?;
    eprintln!("Connected to {addr}");

    loop {
        let Some(message) = channel.receive(Duration::from_secs(1))? else {
            continue;
        };
        eprintln!("Received {message}");

        match message.tag {
            Tag::Ping => {
                channel.send(Tag::Ack, Duration::from_secs(5))?;
            }
            Tag::Run => channel.send_text(Tag::Done, message.text())?,
            Tag::Exit | Tag::Exiting => break,
            _ => {}
        }
    }

    Ok(())
}
