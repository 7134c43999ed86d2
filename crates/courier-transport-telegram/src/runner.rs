use crate::bot;
use crate::bot::handlers::{get_user_id_safe, Command, TelegramRelay};
use crate::bot::{TelegramSink, UnauthorizedCache};
use crate::config::{
    get_unauthorized_cache_max_size, get_unauthorized_cooldown, BotSettings,
    PENDING_LABEL_MAX_SIZE,
};
use courier_runtime::relay::DEFAULT_LABEL;
use courier_runtime::{spawn_task_reaper, HelperLauncher, PendingLabels, RelayConfig};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let engine = init_relay_engine(&bot, &settings);
    let launcher = init_launcher(&settings);
    let unauthorized_cache = init_unauthorized_cache();
    let handler = setup_handler();

    let shutdown = CancellationToken::new();
    let reaper = spawn_task_reaper(
        engine.clone(),
        settings.telegram.reaper_interval(),
        shutdown.clone(),
    );

    info!(
        helper_user_id = settings.telegram.helper_user_id,
        "Bot is running..."
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, engine, launcher, unauthorized_cache])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    if let Err(e) = reaper.await {
        error!("Task reaper terminated abnormally: {e}");
    }
}

fn init_relay_engine(bot: &Bot, settings: &BotSettings) -> Arc<TelegramRelay> {
    let labels = PendingLabels::new(
        settings.telegram.pending_label_ttl_secs,
        PENDING_LABEL_MAX_SIZE,
    );
    let config = RelayConfig {
        pacing: settings.telegram.relay_pacing(),
        task_deadline: settings.telegram.task_deadline(),
        default_label: DEFAULT_LABEL.to_string(),
    };
    info!(
        pacing_ms = settings.telegram.relay_pacing_ms,
        deadline_secs = settings.telegram.task_deadline_secs,
        "Relay engine initialized"
    );
    Arc::new(TelegramRelay::new(
        TelegramSink::new(bot.clone()),
        labels,
        config,
    ))
}

fn init_launcher(settings: &BotSettings) -> Arc<HelperLauncher> {
    let program = settings.telegram.helper_binary();
    info!(
        program = %program.display(),
        timeout_secs = settings.telegram.helper_timeout_secs,
        "Helper launcher initialized"
    );
    Arc::new(HelperLauncher::new(
        program,
        settings.telegram.helper_timeout(),
    ))
}

fn init_unauthorized_cache() -> Arc<UnauthorizedCache> {
    let cooldown = get_unauthorized_cooldown();
    let max_size = get_unauthorized_cache_max_size();

    info!(
        "Initializing UnauthorizedCache (cooldown: {}s, max_size: {})",
        cooldown, max_size
    );

    Arc::new(UnauthorizedCache::new(cooldown, max_size))
}

fn is_helper(msg: &Message, settings: &BotSettings) -> bool {
    get_user_id_safe(msg) == settings.telegram.helper_user_id
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            // Helper traffic: control lines and forwarded items
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<BotSettings>| is_helper(&msg, &settings))
                .endpoint(handle_helper_message),
        )
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery, settings: Arc<BotSettings>| {
                    settings.telegram.is_allowed(q.from.id.0.cast_signed())
                })
                .endpoint(handle_menu_callback),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<BotSettings>| {
                    settings.telegram.is_allowed(get_user_id_safe(&msg))
                })
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<BotSettings>| {
                    !settings.telegram.is_allowed(get_user_id_safe(&msg))
                })
                .endpoint(handle_unauthorized),
        )
}

async fn handle_unauthorized(
    bot: Bot,
    msg: Message,
    cache: Arc<UnauthorizedCache>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);

    if cache.should_send(user_id).await {
        info!(user_id, "⛔️ Unauthorized access, sending denial message");

        if let Err(e) = bot.send_message(msg.chat.id, bot::views::ACCESS_DENIED).await {
            error!("Failed to send access denied message to {}: {}", user_id, e);
        } else {
            cache.mark_sent(user_id).await;
        }
    }

    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, settings).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_menu_callback(
    bot: Bot,
    q: CallbackQuery,
    settings: Arc<BotSettings>,
    engine: Arc<TelegramRelay>,
    launcher: Arc<HelperLauncher>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) =
        bot::handlers::handle_menu_callback(bot, q, settings, engine, launcher).await
    {
        error!("Menu callback handler error: {}", e);
    }
    respond(())
}

async fn handle_helper_message(
    msg: Message,
    engine: Arc<TelegramRelay>,
) -> Result<(), teloxide::RequestError> {
    bot::handlers::handle_helper_message(&msg, &engine).await;
    respond(())
}
