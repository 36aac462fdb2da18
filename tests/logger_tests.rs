//! Facade behaviour: backend selection, forwarding and line output.

mod test_utils;

use std::net::UdpSocket;
use std::time::Duration;

use rlog::{
    Backend, Facility, LineFlags, LogError, Logger, LoggerConfig, LoggerKind, Priority, Severity,
    SeverityMask, store::memory::MemoryStore,
};
use rstest::rstest;
use test_utils::SharedBuf;
use test_utils::fixtures::{TAG, dial_memory, stderr_logger, store, user_info};

#[rstest]
fn stderr_logger_labels_each_severity(stderr_logger: (SharedBuf, Logger)) {
    let (buffer, logger) = stderr_logger;
    logger.emerg("a").expect("emerg");
    logger.alert("b").expect("alert");
    logger.crit("c").expect("crit");
    logger.err("d").expect("err");
    logger.warning("e").expect("warning");
    logger.notice("f").expect("notice");
    logger.info("g").expect("info");
    logger.debug("h").expect("debug");

    let tails: Vec<String> = buffer
        .lines()
        .iter()
        .map(|line| line[20..].to_string())
        .collect();
    assert_eq!(
        tails,
        vec![
            "emerg-> a",
            "alert-> b",
            "critical-> c",
            "error-> d",
            "warning-> e",
            "notice-> f",
            "info-> g",
            "debug-> h",
        ]
    );
}

#[rstest]
fn stderr_mask_is_honoured(
    #[with(SeverityMask::only(Severity::Err))] stderr_logger: (SharedBuf, Logger),
) {
    let (buffer, logger) = stderr_logger;
    logger.info("hidden").expect("filtered");
    logger.err("shown").expect("printed");
    let lines = buffer.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("error-> shown"));
}

#[rstest]
fn print_writes_prefix_and_message(stderr_logger: (SharedBuf, Logger)) {
    let (buffer, logger) = stderr_logger;
    let logger = logger.with_prefix("api: ");
    logger.print("ready").expect("print");
    logger
        .print_fmt(format_args!("listening on {}", 8080))
        .expect("print");
    assert_eq!(
        buffer.text(),
        "api: ready\napi: listening on 8080\n"
    );
}

#[rstest]
fn print_header_has_date_and_time_by_default(stderr_logger: (SharedBuf, Logger)) {
    let (buffer, logger) = stderr_logger;
    let logger = logger.with_flags(LineFlags::default());
    logger.print("tick").expect("print");
    let text = buffer.text();
    let (header, message) = text.split_at(20);
    assert_eq!(message, "tick\n");
    assert_eq!(&header[4..5], "/");
    assert_eq!(&header[10..11], " ");
    assert_eq!(&header[13..14], ":");
}

#[rstest]
fn custom_backend_routes_to_document_store(store: MemoryStore) {
    let writer = dial_memory(&store, "", user_info(), TAG).expect("dial");
    let logger = Logger::with_backend(Backend::Custom(Box::new(writer)))
        .with_flags(LineFlags::NONE);

    logger.crit("db failover").expect("crit");
    logger.print("plain").expect("print");
    logger.close().expect("close");

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].priority,
        Priority::combine(Facility::USER, Severity::Crit)
    );
    assert_eq!(records[1].priority, user_info());
    assert_eq!(records[1].message, "plain\n");
    assert_eq!(store.closes(), 1);
}

#[rstest]
fn syslog_backend_dials_through_config() {
    let server = UdpSocket::bind("127.0.0.1:0").expect("bind udp");
    server
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set timeout");
    let addr = server.local_addr().expect("local addr").to_string();

    let logger = LoggerConfig::new(LoggerKind::Syslog)
        .with_network("udp")
        .with_target(addr)
        .with_tag("billing")
        .with_priority(Priority::combine(Facility::LOCAL0, Severity::Notice))
        .build()
        .expect("dial syslog");
    assert_eq!(logger.kind(), Some(LoggerKind::Syslog));
    logger.alert("card declined").expect("alert");

    let mut buf = [0u8; 1024];
    let n = server.recv(&mut buf).expect("datagram");
    let frame = String::from_utf8_lossy(&buf[..n]);
    assert!(frame.starts_with("<129>"), "got {frame}");
    assert!(frame.contains(" billing["), "got {frame}");
    assert!(frame.ends_with("]: card declined\n"), "got {frame}");
}

#[rstest]
fn unknown_syslog_network_is_config_error() {
    let err = Logger::dial(LoggerKind::Syslog, "pigeon", "coop", TAG, SeverityMask::ALL)
        .expect_err("unknown network");
    assert!(matches!(err, LogError::Config(_)), "unexpected {err:?}");
}

#[rstest]
fn std_logger_never_fails_to_build() {
    let logger = Logger::new(LoggerKind::Std, SeverityMask::NONE).expect("stderr logger");
    assert_eq!(logger.kind(), Some(LoggerKind::Std));
    logger.emerg("masked").expect("masked write is ok");
}
