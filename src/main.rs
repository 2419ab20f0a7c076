mod broadcast;
mod config;
mod filter;
mod poller;
mod render;
mod source;
mod store;
mod telegram;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use config::Config;
use filter::latest_match;
use poller::Poller;
use render::render_test_reply;
use source::BybitSource;
use store::{CHAT_IDS, SetStore};
use telegram::TelegramClient;

struct BotState {
    config: Config,
    /// Guards every load-modify-save on the persisted sets. The poll cycle
    /// and command handlers both go through this lock.
    store: Arc<Mutex<SetStore>>,
    source: BybitSource,
    telegram: Arc<TelegramClient>,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
enum Command {
    #[command(description = "subscribe this chat to announcement alerts")]
    Start,
    #[command(description = "show the newest matching announcement")]
    Test,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "splashwatch.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet; this has to reach the operator anyway.
            eprintln!("Fatal: {e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("splashwatch.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting splashwatch...");
    info!("Loaded config from {config_path}");
    info!(
        "Keyword: \"{}\", polling every {:?}",
        config.keyword, config.poll_interval
    );

    let bot = Bot::new(&config.telegram_bot_token);
    let telegram = Arc::new(TelegramClient::new(bot.clone()));
    let store = Arc::new(Mutex::new(SetStore::new(&config.data_dir)));

    let poller = Poller::new(
        BybitSource::new(config.source_url.clone(), config.locale.clone()),
        broadcast::Dispatcher::new(telegram.clone(), config.send_delay),
        store.clone(),
        config.keyword.clone(),
        config.poll_interval,
        config.warmup,
    );
    tokio::spawn(poller.run());

    let state = Arc::new(BotState {
        source: BybitSource::new(config.source_url.clone(), config.locale.clone()),
        config,
        store,
        telegram,
    });

    let handler = Update::filter_message()
        .filter_command::<Command>()
        .endpoint(handle_command);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg, state).await,
        Command::Test => handle_test(bot, msg, state).await,
    }
}

/// `/start` — add the chat to the broadcast list.
async fn handle_start(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;

    let newly_added = {
        let store = state.store.lock().await;
        let mut chat_ids = store.load(CHAT_IDS);
        let added = chat_ids.insert(chat_id.to_string());
        if added {
            if let Err(e) = store.save(CHAT_IDS, &chat_ids) {
                warn!("Failed to persist chat list: {e}");
            }
        }
        added
    };

    if newly_added {
        info!("New chat subscribed: {chat_id}");
        bot.send_message(
            chat_id,
            format!(
                "Hi! This chat is now on the broadcast list.\n\
                 I'll post new Bybit announcements matching \"{}\" here.",
                state.config.keyword
            ),
        )
        .await?;
    } else {
        bot.send_message(chat_id, "This chat is already on the broadcast list.")
            .await?;
    }
    Ok(())
}

/// `/test` — fetch the feed and show the newest keyword match, with no
/// novelty filtering and no persisted state touched.
async fn handle_test(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let keyword = &state.config.keyword;

    bot.send_message(chat_id, format!("🔎 Looking for the latest \"{keyword}\" announcement..."))
        .await?;

    let announcements = match state.source.fetch().await {
        Ok(list) => list,
        Err(e) => {
            warn!("/test fetch failed: {e}");
            bot.send_message(
                chat_id,
                "Couldn't fetch announcements from Bybit. Please try again later.",
            )
            .await?;
            return Ok(());
        }
    };

    match latest_match(&announcements, keyword) {
        Some(announcement) => {
            state
                .telegram
                .send_html(chat_id, &render_test_reply(announcement))
                .await?;
        }
        None => {
            bot.send_message(
                chat_id,
                format!("😕 No announcement matching \"{keyword}\" among the latest news."),
            )
            .await?;
        }
    }
    Ok(())
}
