#![cfg(all(unix, feature = "cli"))]

use std::net::TcpListener;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use ctlwire::channel::{ChannelListener, Message};
use ctlwire::frame::Tag;

const CONNECTION_ERROR: i32 = 3;

fn free_addr() -> String {
    let reserved = TcpListener::bind("127.0.0.1:0").expect("port reservation should bind");
    reserved
        .local_addr()
        .expect("reservation should have an address")
        .to_string()
}

fn ctlwire() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ctlwire"));
    command.env_remove("CTLWIRE_ADDR");
    command.arg("--log-level").arg("error");
    command
}

/// Run a worker, retrying while the driver is not yet listening.
fn run_worker(addr: &str, timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        let output = ctlwire()
            .arg("--format")
            .arg("json")
            .arg("worker")
            .arg(addr)
            .arg("--timeout")
            .arg("1s")
            .output()
            .expect("worker should run");
        if output.status.code() != Some(CONNECTION_ERROR) || start.elapsed() >= timeout {
            return output;
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn json_lines(output: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout should be json lines"))
        .collect()
}

#[test]
fn drive_and_worker_complete_a_task() {
    let addr = free_addr();

    let driver = ctlwire()
        .arg("--format")
        .arg("json")
        .arg("drive")
        .arg(&addr)
        .arg("--task")
        .arg("task-7")
        .arg("--wait")
        .arg("10s")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("drive should start");

    let worker = run_worker(&addr, Duration::from_secs(5));
    assert!(
        worker.status.success(),
        "worker failed: {}",
        String::from_utf8_lossy(&worker.stderr)
    );

    let driver = driver.wait_with_output().expect("drive should finish");
    assert!(
        driver.status.success(),
        "drive failed: {}",
        String::from_utf8_lossy(&driver.stderr)
    );

    let report = json_lines(&driver.stdout);
    assert_eq!(report.len(), 1);
    assert_eq!(report[0]["event"], "drive");
    assert_eq!(report[0]["text"], "task-7");
    assert_eq!(report[0]["acknowledged"], true);

    let seen: Vec<(String, Option<String>)> = json_lines(&worker.stdout)
        .iter()
        .map(|line| {
            (
                line["tag"].as_str().unwrap_or_default().to_string(),
                line["text"].as_str().map(str::to_string),
            )
        })
        .collect();
    assert_eq!(
        seen,
        vec![
            (Tag::Run.name().to_string(), Some("task-7".to_string())),
            (Tag::Exit.name().to_string(), None),
        ]
    );
}

#[test]
fn ping_without_listener_is_a_connection_error() {
    let output = ctlwire()
        .arg("ping")
        .arg(free_addr())
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("ping should run");

    assert_eq!(output.status.code(), Some(CONNECTION_ERROR));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"), "stderr: {stderr}");
}

#[test]
fn address_comes_from_environment() {
    let output = ctlwire()
        .env("CTLWIRE_ADDR", free_addr())
        .arg("ping")
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("ping should run");

    assert_eq!(output.status.code(), Some(CONNECTION_ERROR));
}

#[test]
fn send_delivers_the_whole_text() {
    let listener = ChannelListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().to_string();
    let receiver = thread::spawn(move || {
        let mut channel = listener.accept().expect("listener should accept");
        let message = channel
            .receive(Duration::from_secs(5))
            .expect("receive should succeed");
        let teardown = channel
            .receive_tag(Duration::from_secs(5))
            .expect("receive should succeed");
        (message, teardown)
    });

    let started = Instant::now();
    let output = ctlwire()
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(&addr)
        .arg("--tag")
        .arg("done")
        .arg("--data")
        .arg("rows=3")
        .output()
        .expect("send should run");
    assert!(
        output.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(started.elapsed() < Duration::from_secs(30));

    let report = json_lines(&output.stdout);
    assert_eq!(report.len(), 1);
    assert_eq!(report[0]["text"], "rows=3");
    assert_eq!(report[0]["acknowledged"], true);

    let (message, teardown) = receiver.join().expect("receiver thread");
    assert_eq!(message, Some(Message::with_text(Tag::Done, "rows=3")));
    assert_eq!(teardown, Some(Tag::Exiting));
}

#[test]
fn buffered_send_of_short_text_is_usage_error() {
    let output = ctlwire()
        .arg("send")
        .arg(free_addr())
        .arg("--tag")
        .arg("done")
        .arg("--data")
        .arg("rows=3")
        .arg("--buffered")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn invalid_duration_is_usage_error() {
    let output = ctlwire()
        .arg("send")
        .arg("127.0.0.1:1")
        .arg("--tag")
        .arg("done")
        .arg("--data")
        .arg("x")
        .arg("--timeout")
        .arg("0s")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_reports_package_version() {
    let output = ctlwire()
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("ctlwire {}", env!("CARGO_PKG_VERSION")));
}
