use crate::supervisor::log_stream::{LogStreamProcessor, StreamKind, append_line};
use crate::supervisor::rules::{DEFAULT_RULES, LineEvent, RCON_READY_MARKER};

use std::io::Cursor;

use tempfile::tempdir;
use tokio::sync::mpsc;

/// **VALUE**: Documents that readiness is not deduplicated.
///
/// **WHY THIS MATTERS**: Each marker line triggers one RCON attempt. If this
/// ever changes it must be a deliberate decision, not an accident.
///
/// **BUG THIS CATCHES**: Would catch a silent "only first marker" dedup.
#[tokio::test]
async fn given_n_marker_lines_when_scanned_then_n_rcon_events() {
    // GIVEN: Output with three readiness lines among other output
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("console.log");
    let marker = format!("1.0 Info {RCON_READY_MARKER} 0.0.0.0:27015");
    let output = format!("hello\n{marker}\nworld\n{marker}\r\n{marker}");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let processor = LogStreamProcessor::new(StreamKind::Stdout, &log_path, DEFAULT_RULES, tx);

    // WHEN: Scanning the stream
    let lines = processor.scan(Cursor::new(output.into_bytes())).await.unwrap();
    drop(processor);

    // THEN: Every line was seen and every marker produced an event
    assert_eq!(lines, 5);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            LineEvent::RconReady {
                stream: StreamKind::Stdout
            };
            3
        ]
    );
}

/// **VALUE**: Verifies lines are logged verbatim without line terminators.
///
/// **BUG THIS CATCHES**: Would catch `\r` from Windows-style output leaking
/// into the log, or a final unterminated line being dropped.
#[tokio::test]
async fn given_mixed_line_endings_when_scanned_then_log_has_clean_lines() {
    // GIVEN: CRLF, LF and an unterminated last line
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("console.log");
    let (tx, _rx) = mpsc::unbounded_channel();
    let processor = LogStreamProcessor::new(StreamKind::Stderr, &log_path, DEFAULT_RULES, tx);

    // WHEN: Scanning
    processor
        .scan(Cursor::new(b"first\r\nsecond\nthird".to_vec()))
        .await
        .unwrap();

    // THEN: The log has one clean line per input line
    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(contents, "first\nsecond\nthird\n");
}

/// **VALUE**: Verifies invalid UTF-8 does not abort the scan.
///
/// **BUG THIS CATCHES**: Would catch a switch to `lines()`, which errors on
/// invalid UTF-8 and would stop all further log processing.
#[tokio::test]
async fn given_invalid_utf8_when_scanned_then_continues_with_lossy_text() {
    // GIVEN: A line with invalid bytes followed by an error line
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("console.log");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let processor = LogStreamProcessor::new(StreamKind::Stdout, &log_path, DEFAULT_RULES, tx);
    let mut bytes = b"bad \xff\xfe bytes\n".to_vec();
    bytes.extend_from_slice(b"3.0 Error something broke\n");

    // WHEN: Scanning
    let lines = processor.scan(Cursor::new(bytes)).await.unwrap();
    drop(processor);

    // THEN: Both lines were processed and the error was reported
    assert_eq!(lines, 2);
    match rx.recv().await {
        Some(LineEvent::ServerError { stream, tokens }) => {
            assert_eq!(stream, StreamKind::Stdout);
            assert_eq!(tokens[1], "Error");
        }
        other => panic!("Expected a server error event, got {other:?}"),
    }
}

/// **VALUE**: Verifies a log that cannot be written does not stop scanning.
///
/// **BUG THIS CATCHES**: Would catch `?` on the append, which would end the
/// scan and leave the game blocked on a full pipe.
#[tokio::test]
async fn given_unwritable_log_when_scanned_then_events_still_flow() {
    // GIVEN: A log path inside a directory that does not exist
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("missing").join("console.log");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let processor = LogStreamProcessor::new(StreamKind::Stdout, &log_path, DEFAULT_RULES, tx);
    let output = format!("1.0 Info {RCON_READY_MARKER} x\n");

    // WHEN: Scanning
    let lines = processor.scan(Cursor::new(output.into_bytes())).await.unwrap();

    // THEN: The line still produced its event
    assert_eq!(lines, 1);
    assert!(matches!(rx.recv().await, Some(LineEvent::RconReady { .. })));
    assert!(!log_path.exists());
}

/// **VALUE**: Verifies concurrent writers interleave only at line granularity.
///
/// **WHY THIS MATTERS**: stdout and stderr are appended to the same file by
/// two tasks with no ordering between them.
///
/// **BUG THIS CATCHES**: Would catch holding a shared handle and writing the
/// line and newline separately, which lets lines from both streams merge.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_two_concurrent_writers_when_appending_then_no_line_is_split() {
    // GIVEN: Two writers with distinct line shapes
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("console.log");
    const LINES_PER_WRITER: usize = 200;

    // WHEN: Both append concurrently
    let writer = |tag: &'static str, path: std::path::PathBuf| async move {
        for i in 0..LINES_PER_WRITER {
            append_line(&path, &format!("{tag}-{i}-{}", tag.repeat(20)))
                .await
                .unwrap();
        }
    };
    let a = tokio::spawn(writer("out", log_path.clone()));
    let b = tokio::spawn(writer("err", log_path.clone()));
    a.await.unwrap();
    b.await.unwrap();

    // THEN: Every line is intact and none is missing
    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), LINES_PER_WRITER * 2);
    for line in lines {
        let (tag, rest) = line.split_once('-').unwrap();
        assert!(tag == "out" || tag == "err", "Corrupted line: {line}");
        assert!(rest.ends_with(&tag.repeat(20)), "Corrupted line: {line}");
    }
}
