use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use simgate::config::{
    DEFAULT_POLL_RETRY_MS, DEFAULT_POLL_TIMEOUT_SECS, DEFAULT_SEND_TIMEOUT_SECS, DEFAULT_STALE_AFTER_SECS,
    DEFAULT_WATCHDOG_INTERVAL_SECS, Timeouts, WatchdogConfig, validate_api_root,
};
use simgate::{
    CallbackResult, ClientConfig, ClientError, ConfigError, FormFields, GatewayClient, Message, Notice, NoticeReceiver,
    SendOptions,
};
use tracing::info;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("invalid field `{0}`; expected key=value")]
    InvalidField(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "simgate-cli", about = "Gateway session client")]
struct Cli {
    #[arg(long, env = "SIMGATE_API_ROOT")]
    api_root: String,

    #[arg(long, env = "SIMGATE_SESSION_ID")]
    session_id: String,

    #[arg(long, env = "SIMGATE_SIGNATURE", hide_env_values = true)]
    signature: String,

    #[arg(long, env = "SIMGATE_SIGNED_CALL_COUNT", default_value_t = 0)]
    signed_call_count: u64,

    #[arg(long, env = "SIMGATE_PROXY_URL")]
    proxy_url: Option<String>,

    #[arg(long, env = "SIMGATE_SEND_TIMEOUT_SECS", default_value_t = DEFAULT_SEND_TIMEOUT_SECS)]
    send_timeout_secs: u64,

    #[arg(long, env = "SIMGATE_POLL_TIMEOUT_SECS", default_value_t = DEFAULT_POLL_TIMEOUT_SECS)]
    poll_timeout_secs: u64,

    #[arg(long, env = "SIMGATE_POLL_RETRY_MS", default_value_t = DEFAULT_POLL_RETRY_MS)]
    poll_retry_ms: u64,

    #[arg(long, env = "SIMGATE_WATCHDOG_INTERVAL_SECS", default_value_t = DEFAULT_WATCHDOG_INTERVAL_SECS)]
    watchdog_interval_secs: u64,

    #[arg(long, env = "SIMGATE_STALE_AFTER_SECS", default_value_t = DEFAULT_STALE_AFTER_SECS)]
    stale_after_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the event queue and print matching events as JSON lines until Ctrl-C.
    Listen {
        #[arg(long = "type", required = true)]
        types: Vec<String>,
    },
    /// Send one command; fields are `key=value`.
    Send {
        message_type: String,
        fields: Vec<String>,
        #[arg(long, conflicts_with = "unsigned")]
        signed: bool,
        #[arg(long)]
        unsigned: bool,
    },
    Logout,
    /// Relay a request to a third-party URL through the gateway proxy.
    Fetch { url: String, fields: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let (client, notices) = GatewayClient::connect(&config)?;
    info!(session = %client.session_id(), "client ready");

    match cli.command {
        Command::Listen { types } => run_listen(&client, notices, &types).await,
        Command::Send { message_type, fields, signed, unsigned } => {
            run_send(&client, notices, &message_type, &fields, send_options(signed, unsigned)).await
        }
        Command::Logout => run_logout(&client, notices).await,
        Command::Fetch { url, fields } => run_fetch(&client, notices, &url, &fields).await,
    }
}

fn build_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    validate_api_root(&cli.api_root)?;
    let mut config = ClientConfig::new(&cli.api_root, cli.session_id.clone(), cli.signature.clone());
    config.initial_signed_calls = cli.signed_call_count;
    if let Some(proxy_url) = cli.proxy_url.as_ref().filter(|s| !s.is_empty()) {
        config.proxy_url.clone_from(proxy_url);
    }
    config.timeouts = Timeouts {
        send: Duration::from_secs(cli.send_timeout_secs),
        poll: Duration::from_secs(cli.poll_timeout_secs),
        poll_retry: Duration::from_millis(cli.poll_retry_ms),
    };
    config.watchdog = WatchdogConfig {
        interval: Duration::from_secs(cli.watchdog_interval_secs),
        stale_after: Duration::from_secs(cli.stale_after_secs),
    };
    Ok(config)
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn run_listen(client: &GatewayClient, mut notices: NoticeReceiver, types: &[String]) -> Result<(), CliError> {
    for message_type in types {
        client.register_callback(message_type, print_message);
    }
    client.init();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                eprintln!("interrupted; shutting down");
                break;
            }
            notice = notices.recv() => {
                let Some(notice) = notice else { break };
                print_notice(&notice);
                if matches!(notice, Notice::ForcedDisconnect { .. }) {
                    return Ok(());
                }
            }
        }
    }

    client.shutdown();
    Ok(())
}

async fn run_send(
    client: &GatewayClient,
    notices: NoticeReceiver,
    message_type: &str,
    fields: &[String],
    options: SendOptions,
) -> Result<(), CliError> {
    let fields = parse_fields(fields)?;
    client.mark_connected();
    let result = client.send(message_type, &fields, options).await;
    client.shutdown();
    drain_notices(notices);

    print_json(&result?)?;
    eprintln!("signed calls: {}", client.signed_call_count());
    Ok(())
}

async fn run_logout(client: &GatewayClient, notices: NoticeReceiver) -> Result<(), CliError> {
    let result = client.logout(false).await;
    drain_notices(notices);
    Ok(result?)
}

async fn run_fetch(
    client: &GatewayClient,
    notices: NoticeReceiver,
    url: &str,
    fields: &[String],
) -> Result<(), CliError> {
    let fields = parse_fields(fields)?;
    let result = client.generic_request(url, &fields).await;
    drain_notices(notices);
    print_json(&result?)
}

// =============================================================================
// HELPERS
// =============================================================================

fn send_options(signed: bool, unsigned: bool) -> SendOptions {
    match (signed, unsigned) {
        (true, _) => SendOptions::signed(),
        (_, true) => SendOptions::unsigned(),
        _ => SendOptions::default(),
    }
}

fn parse_fields(raw: &[String]) -> Result<FormFields, CliError> {
    let mut fields = FormFields::new();
    for pair in raw {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => fields.insert(key, value),
            _ => return Err(CliError::InvalidField(pair.clone())),
        }
    }
    Ok(fields)
}

fn print_message(message: &Message) -> CallbackResult {
    println!("{}", serde_json::to_string(message)?);
    Ok(())
}

fn print_notice(notice: &Notice) {
    eprintln!("[{:?}] {notice}", notice.severity());
}

fn drain_notices(mut notices: NoticeReceiver) {
    while let Ok(notice) = notices.try_recv() {
        print_notice(&notice);
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
