use super::HubError;
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Repeated initialisation must not panic.
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn parse_level_falls_back_to_info() {
    assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
    assert_eq!(logging::parse_level(" trace "), tracing::Level::TRACE);
    assert_eq!(logging::parse_level("loud"), tracing::Level::INFO);
}

#[test]
fn json_errors_convert_into_hub_error() {
    let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: HubError = err.into();
    assert!(err.to_string().starts_with("malformed envelope"));
}
