//! botwire: command-line front end for the bot wrapper
//!
//! Usage:
//!   botwire say <channel> <text>
//!   botwire reply <channel> <text>
//!   botwire reply-private <response_url> <text>
//!   botwire upload <channel> <path-or-text>
//!   botwire download <url> <output-path>

use botwire::{
    ApiResponse, Bot, BotConfig, Delivery, FileInput, HttpTransport, MessageContext,
    OutgoingMessage, ResponseSlot, SkipReason, SlackApiClient,
};
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq)]
enum RunMode {
    Say { channel: String, text: String },
    Reply { channel: String, text: String },
    ReplyPrivate { response_url: String, text: String },
    Upload { channel: String, file: String },
    Download { url: String, output: String },
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = parse_args(&args);

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("botwire {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = BotConfig::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    let auth = config.auth_record()?;

    tracing::info!("Using Slack API at {}", config.api.base_url);

    run(mode, &auth, &config).await
}

/// Execute one command
async fn run(mode: RunMode, auth: &botwire::AuthRecord, config: &BotConfig) -> anyhow::Result<()> {
    let build = |context: MessageContext| -> anyhow::Result<Bot<HttpTransport, SlackApiClient>> {
        // Nothing answers an inbound request from the command line.
        let (slot, _rx) = ResponseSlot::channel();
        Ok(Bot::new(auth, context, HttpTransport::new(slot), config)?)
    };

    match mode {
        RunMode::Say { channel, text } => {
            let bot = build(MessageContext::default())?;
            let response = bot.say(OutgoingMessage::text(text).with_channel(channel)).await?;
            print_response(&response)
        }
        RunMode::Reply { channel, text } => {
            let bot = build(MessageContext::for_channel(channel))?;
            report_delivery(bot.reply(text, false).await?)
        }
        RunMode::ReplyPrivate { response_url, text } => {
            let bot = build(MessageContext::default().with_response_url(response_url))?;
            report_delivery(bot.reply_private(text).await?)
        }
        RunMode::Upload { channel, file } => {
            let bot = build(MessageContext::for_channel(channel))?;
            let response = bot.reply_file(FileInput::detect(file)).await?;
            print_response(&response)
        }
        RunMode::Download { url, output } => {
            let bot = build(MessageContext::default())?;
            let bytes = bot.get_file(&url).await?;
            tokio::fs::write(&output, &bytes).await?;
            tracing::info!("Saved {} bytes to {}", bytes.len(), output);
            Ok(())
        }
        RunMode::Help | RunMode::Version => Ok(()),
    }
}

fn report_delivery(delivery: Delivery) -> anyhow::Result<()> {
    match delivery {
        Delivery::Sent(response) => print_response(&response),
        Delivery::Skipped(SkipReason::NoResponseUrl) => {
            anyhow::bail!("reply skipped: no response URL")
        }
        Delivery::Skipped(SkipReason::NoChannel) => anyhow::bail!("reply skipped: no channel"),
    }
}

fn print_response(response: &ApiResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> RunMode {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["--version" | "-v", ..] => RunMode::Version,
        ["say", channel, text @ ..] if !text.is_empty() => RunMode::Say {
            channel: channel.to_string(),
            text: text.join(" "),
        },
        ["reply", channel, text @ ..] if !text.is_empty() => RunMode::Reply {
            channel: channel.to_string(),
            text: text.join(" "),
        },
        ["reply-private", response_url, text @ ..] if !text.is_empty() => RunMode::ReplyPrivate {
            response_url: response_url.to_string(),
            text: text.join(" "),
        },
        ["upload", channel, file] => RunMode::Upload {
            channel: channel.to_string(),
            file: file.to_string(),
        },
        ["download", url, output] => RunMode::Download {
            url: url.to_string(),
            output: output.to_string(),
        },
        _ => RunMode::Help,
    }
}

/// Print help message
fn print_help() {
    println!("botwire - Slack bot wrapper");
    println!();
    println!("Usage:");
    println!("  botwire say <channel> <text>                 Post a message");
    println!("  botwire reply <channel> <text>               Reply in a channel");
    println!("  botwire reply-private <response_url> <text>  Ephemeral reply");
    println!("  botwire upload <channel> <path-or-text>      Upload a file or inline content");
    println!("  botwire download <url> <output-path>         Download a private file");
    println!("  botwire --help                               Show this help message");
    println!("  botwire --version                            Show version");
    println!();
    println!("Configuration is read from ./botwire.toml when present.");
    println!();
    println!("Environment Variables:");
    println!("  SLACK_BOT_TOKEN          Bot token (preferred)");
    println!("  SLACK_ACCESS_TOKEN       User token");
    println!("  SLACK_API_BASE_URL       API base URL (default: https://slack.com/api)");
    println!("  SLACK_HTTP_TIMEOUT_SECS  Request timeout (default: 30)");
}
