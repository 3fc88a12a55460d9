//! CLI parsing as the binary itself would see it.

use clap::Parser;
use config::Settings;

#[test]
fn parses_required_flags() {
    let settings = Settings::parse_from([
        "dispatchd",
        "--topology",
        r#"{"nodes":[]}"#,
        "--rs",
        "tcp://127.0.0.1:5555",
        "--ts",
        "tcp://127.0.0.1:5556",
        "--s",
        "tcp://127.0.0.1:5557",
    ]);

    assert_eq!(settings.ingress_threads, 1);
    assert_eq!(settings.simulator_pool_size, 1);
    assert_eq!(settings.state_type, "chp_state");
    assert!(settings.validate().is_ok());
}

#[test]
fn state_type_flag_overrides_default() {
    let settings = Settings::parse_from([
        "dispatchd",
        "--topology",
        r#"{"nodes":[]}"#,
        "--rs",
        "tcp://127.0.0.1:5555",
        "--ts",
        "tcp://127.0.0.1:5556",
        "--s",
        "tcp://127.0.0.1:5557",
        "--state-type",
        "stabilizer_state",
    ]);

    assert_eq!(settings.state_type, "stabilizer_state");
}

#[test]
fn missing_required_flag_fails_to_parse() {
    let result = Settings::try_parse_from(["dispatchd", "--topology", r#"{"nodes":[]}"#]);
    assert!(result.is_err());
}
