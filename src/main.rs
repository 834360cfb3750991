use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;

use lead_intake::bot::Bot;
use lead_intake::channels::{ChannelManager, CliChannel, TelegramChannel};
use lead_intake::config::{BotConfig, ChannelKind};
use lead_intake::flow::{ConversationEngine, MenuCatalog, SessionStore};
use lead_intake::presentation::Presenter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("🤖 Lead intake bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channel: {:?}", config.channel);
    eprintln!("   Site: {}", config.site_url);

    let mut channels = ChannelManager::new();
    match config.channel {
        ChannelKind::Telegram => {
            let token: SecretString = config
                .telegram_token
                .context("TELEGRAM_BOT_TOKEN is required for the Telegram channel")?;
            channels.add(Box::new(TelegramChannel::new(token, config.allowed_users)));
        }
        ChannelKind::Cli => {
            channels.add(Box::new(CliChannel::new()));
        }
    }

    channels
        .health_check_all()
        .await
        .context("Channel health check failed")?;

    let engine = ConversationEngine::new(
        Arc::new(SessionStore::new()),
        Arc::new(MenuCatalog::default()),
    );
    let presenter = Presenter::new(config.site_url);

    tracing::info!("Bot is starting (polling)...");
    Bot::new(engine, presenter, channels)
        .run()
        .await
        .context("Bot stopped with an error")?;

    Ok(())
}
