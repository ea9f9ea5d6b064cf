//! Minimal driver: waits for one worker, hands it a task, prints the result.
//!
//! Run with:
//!   cargo run --example driver -- 127.0.0.1:7400 "suite=smoke"
//!
//! In another terminal:
//!   cargo run --example worker -- 127.0.0.1:7400

use std::time::Duration;

use ctlwire::channel::{ChannelListener, Tag};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let bind = args.next().unwrap_or_else(|| "127.0.0.1:7400".to_string());
    let task = args.next().unwrap_or_else(|| "suite=smoke".to_string());

    let listener = ChannelListener::bind(&bind)?;
    eprintln!("Listening on {}", listener.local_addr());

    let mut channel = listener.accept()?;
    eprintln!("Worker connected: {}", channel.peer());

    channel.send_text(Tag::Run, &task)?;

    loop {
        match channel.receive(Duration::from_secs(30))? {
            Some(message) if message.tag == Tag::Done => {
                println!("{}", message.text());
                break;
            }
            Some(message) => eprintln!("Ignoring {message}"),
            None => return Err("worker went quiet".into()),
        }
    }

    channel.send(Tag::Exit, Duration::from_secs(5))?;
    Ok(())
}
