use super::*;

fn strings(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn parse_fields_keeps_order_and_splits_on_first_equals() {
    let fields = parse_fields(&strings(&["Target=abc", "Amount=10", "Note=a=b"])).unwrap();
    assert_eq!(fields.to_query_string(), "Target=abc&Amount=10&Note=a%3Db");
}

#[test]
fn parse_fields_rejects_missing_key_or_separator() {
    assert!(matches!(parse_fields(&strings(&["nope"])), Err(CliError::InvalidField(f)) if f == "nope"));
    assert!(matches!(parse_fields(&strings(&["=1"])), Err(CliError::InvalidField(_))));
}

#[test]
fn send_flags_map_to_signing_override() {
    assert_eq!(send_options(false, false), SendOptions::default());
    assert_eq!(send_options(true, false), SendOptions::signed());
    assert_eq!(send_options(false, true), SendOptions::unsigned());
}

#[test]
fn cli_arguments_build_client_config() {
    let cli = Cli::try_parse_from([
        "simgate-cli",
        "--api-root",
        "https://gw.example/api",
        "--session-id",
        "sid-9",
        "--signature",
        "secret",
        "--signed-call-count",
        "42",
        "--stale-after-secs",
        "20",
        "logout",
    ])
    .unwrap();

    let config = build_config(&cli).unwrap();

    assert_eq!(config.api_root, "https://gw.example/api/");
    assert_eq!(config.session_id, "sid-9");
    assert_eq!(config.initial_signed_calls, 42);
    assert_eq!(config.proxy_url, "https://gw.example/api/differentorigin.kat");
    assert_eq!(config.watchdog.stale_after, Duration::from_secs(20));
    assert!(matches!(cli.command, Command::Logout));
}

#[test]
fn non_http_api_root_is_rejected() {
    let cli = Cli::try_parse_from([
        "simgate-cli",
        "--api-root",
        "ftp://gw.example",
        "--session-id",
        "s",
        "--signature",
        "x",
        "logout",
    ])
    .unwrap();
    assert!(matches!(build_config(&cli), Err(CliError::Config(ConfigError::Invalid { .. }))));
}

#[test]
fn listen_requires_at_least_one_type() {
    let parsed = Cli::try_parse_from(["simgate-cli", "--api-root", "http://x", "--session-id", "s", "--signature", "x", "listen"]);
    assert!(parsed.is_err());
}
