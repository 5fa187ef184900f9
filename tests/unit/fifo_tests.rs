use std::os::unix::fs::FileTypeExt;

use serial_test::serial;

use scope_intercom::channel::fifo::{ensure_fifo, FifoChannel};
use scope_intercom::channel::MessageChannel;

fn is_fifo(path: &std::path::Path) -> bool {
    path.metadata()
        .map(|meta| meta.file_type().is_fifo())
        .unwrap_or(false)
}

#[test]
#[serial]
fn creates_a_fresh_fifo_where_nothing_existed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("toController.ser");

    ensure_fifo(&path).expect("fifo created");
    assert!(is_fifo(&path));
}

#[test]
#[serial]
fn replaces_a_stale_fifo() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("toController.ser");

    ensure_fifo(&path).expect("first creation");
    ensure_fifo(&path).expect("idempotent re-creation");
    assert!(is_fifo(&path));
}

#[test]
#[serial]
fn replaces_a_conflicting_regular_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("toController.ser");
    std::fs::write(&path, b"stale bytes from a crashed run").expect("write stale file");

    ensure_fifo(&path).expect("conflicting entry replaced");
    assert!(is_fifo(&path));
}

#[tokio::test]
#[serial]
async fn one_line_round_trips_through_the_fifo() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("handshake.ser");

    let reader = FifoChannel::new(path.clone());
    let writer = FifoChannel::new(path);
    reader.prepare().expect("fifo ready");

    let (received, sent) = tokio::join!(reader.recv_line(), writer.send_line("startInitProcess"));
    sent.expect("send completes once the reader attaches");
    assert_eq!(received.expect("one line"), "startInitProcess");
}

#[tokio::test]
#[serial]
async fn terminator_is_stripped_from_the_payload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("handshake.ser");

    let reader = FifoChannel::new(path.clone());
    let writer = FifoChannel::new(path);
    reader.prepare().expect("fifo ready");

    let (received, sent) = tokio::join!(reader.recv_line(), writer.send_line("run42"));
    sent.expect("send");
    let line = received.expect("recv");
    assert_eq!(line, "run42");
    assert!(!line.ends_with('\n'));
}
