//! Tests for `src/logging.rs`.

use modwatch::logging::LoggingGuard;

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("nested").join("logs");
    assert!(!logs_dir.exists());

    // The global subscriber can be installed once per process, so only the
    // directory is asserted.
    let _guard = modwatch::logging::init_production(&logs_dir);
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn init_cli_tolerates_existing_subscriber() {
    modwatch::logging::init_cli();
    modwatch::logging::init_cli();
}

#[test]
fn filter_prefers_crate_variable_then_rust_log() {
    use modwatch::logging::{filter_directives, DEFAULT_DIRECTIVES};

    assert_eq!(filter_directives(|_| None), DEFAULT_DIRECTIVES);
    assert_eq!(
        filter_directives(|key| (key == "RUST_LOG").then(|| "debug".to_owned())),
        "debug"
    );
    assert_eq!(
        filter_directives(|key| match key {
            "MODWATCH_LOG" => Some("modwatch::duty=trace".to_owned()),
            "RUST_LOG" => Some("debug".to_owned()),
            _ => None,
        }),
        "modwatch::duty=trace"
    );
    assert_eq!(
        filter_directives(|key| (key == "MODWATCH_LOG").then(|| "  ".to_owned())),
        DEFAULT_DIRECTIVES
    );
}
