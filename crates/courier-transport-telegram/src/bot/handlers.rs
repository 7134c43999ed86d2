use crate::bot::inbound::decode_helper_message;
use crate::bot::relay_sink::TelegramSink;
use crate::bot::resilient::{
    edit_message_resilient, edit_message_safe_resilient, send_message_resilient,
};
use crate::bot::views;
use crate::config::BotSettings;
use anyhow::{anyhow, Result};
use courier_core::menu::{MenuCallback, ROOT_MENU};
use courier_core::orchestrator::OrchestrationRequest;
use courier_runtime::dispatcher::requesting_text;
use courier_runtime::{DispatchOutcome, HelperLauncher, RelayEngine, RequesterId};
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{MessageId, ParseMode},
    utils::command::BotCommands,
};
use tracing::{debug, error, info, warn};

/// Relay engine wired to the Bot API.
pub type TelegramRelay = RelayEngine<TelegramSink>;

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the main menu
    #[command(description = "Show the main menu.")]
    Start,
}

/// Send the root menu.
///
/// # Errors
///
/// Returns an error if the root menu is missing or Telegram rejects the send.
pub async fn start(bot: Bot, msg: Message, settings: Arc<BotSettings>) -> Result<()> {
    let entries = settings
        .menu
        .menu(ROOT_MENU)
        .ok_or_else(|| anyhow!("root menu is not configured"))?;

    bot.send_message(msg.chat.id, views::menu_text(ROOT_MENU))
        .parse_mode(ParseMode::Html)
        .reply_markup(views::menu_keyboard(entries))
        .await?;
    Ok(())
}

/// Handle an inline menu press.
///
/// # Errors
///
/// Returns an error if the press carries no message or an edit fails.
pub async fn handle_menu_callback(
    bot: Bot,
    q: CallbackQuery,
    settings: Arc<BotSettings>,
    engine: Arc<TelegramRelay>,
    launcher: Arc<HelperLauncher>,
) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        debug!("Failed to answer callback query: {e}");
    }

    let (chat_id, msg_id) = q
        .message
        .as_ref()
        .map(|msg| (msg.chat().id, msg.id()))
        .ok_or_else(|| anyhow!("Callback message missing chat id"))?;

    info!(user = q.from.id.0, data = %data, "Menu button pressed");

    match data.parse::<MenuCallback>() {
        Ok(MenuCallback::Noop) => Ok(()),
        Ok(MenuCallback::Navigate(menu_id)) => {
            navigate(&bot, chat_id, msg_id, &menu_id, &settings).await
        }
        Ok(MenuCallback::Action(key)) => {
            dispatch_action(bot, chat_id, msg_id, &key, &settings, engine, launcher).await
        }
        Err(e) => {
            warn!("Invalid callback data: {e}");
            bot.edit_message_text(chat_id, msg_id, views::INVALID_OPTION)
                .await?;
            Ok(())
        }
    }
}

async fn navigate(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    menu_id: &str,
    settings: &BotSettings,
) -> Result<()> {
    let Some(entries) = settings.menu.menu(menu_id) else {
        warn!(menu = %menu_id, "Navigation to unknown menu");
        bot.edit_message_text(chat_id, msg_id, views::INVALID_OPTION)
            .await?;
        return Ok(());
    };

    if let Err(e) = edit_message_resilient(
        bot,
        chat_id,
        msg_id,
        views::menu_text(menu_id),
        Some(ParseMode::Html),
        Some(views::menu_keyboard(entries)),
    )
    .await
    {
        error!("Error editing message for navigation: {e}");
    }
    Ok(())
}

async fn dispatch_action(
    bot: Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    key: &str,
    settings: &BotSettings,
    engine: Arc<TelegramRelay>,
    launcher: Arc<HelperLauncher>,
) -> Result<()> {
    let Some(action) = settings.menu.action(key) else {
        error!(action = %key, "Action not found in configuration");
        bot.edit_message_text(chat_id, msg_id, views::ACTION_NOT_CONFIGURED)
            .await?;
        return Ok(());
    };

    let requester = RequesterId(chat_id.0);
    let label = action.button_label.clone();
    engine.labels().set(requester, label.clone()).await;

    let me = bot.get_me().await.map(|me| me.user.username);
    let bot_handle = match resolve_bot_handle(me) {
        Ok(handle) => handle,
        Err(notice) => {
            engine.labels().clear(requester).await;
            edit_message_safe_resilient(&bot, chat_id, msg_id, notice).await;
            return Ok(());
        }
    };

    edit_message_safe_resilient(&bot, chat_id, msg_id, &requesting_text(&label)).await;

    let request = OrchestrationRequest {
        source_channel: action.private_channel_id.clone(),
        identifier: action.messages_identifier.clone(),
        bot_handle,
        requester: requester.0,
    };

    // The helper may run for minutes; keep this chat responsive meanwhile.
    tokio::spawn(async move {
        let result = launcher.launch(&request).await;
        let outcome = DispatchOutcome::from_launch(&result, &label);
        if outcome.is_failure() {
            engine.labels().clear(requester).await;
        }
        match outcome {
            DispatchOutcome::Status { text, .. } => {
                edit_message_safe_resilient(&bot, chat_id, msg_id, &text).await;
            }
            DispatchOutcome::Notice { text } => {
                if let Err(e) = send_message_resilient(&bot, chat_id, text, None).await {
                    error!("Failed to send dispatch notice to {chat_id}: {e}");
                }
            }
        }
    });
    Ok(())
}

/// Public username of the bot, or the notice to show when there is none.
fn resolve_bot_handle<E: std::fmt::Display>(
    me: Result<Option<String>, E>,
) -> Result<String, &'static str> {
    match me {
        Ok(Some(handle)) => Ok(handle),
        Ok(None) => {
            error!("Bot account has no username");
            Err(views::NEED_USERNAME)
        }
        Err(e) => {
            error!("Failed to look up the bot account: {e}");
            Err(views::UNEXPECTED_ERROR)
        }
    }
}

/// Feed a helper message into the relay engine.
pub async fn handle_helper_message(msg: &Message, engine: &TelegramRelay) {
    let outcome = engine.handle_inbound(decode_helper_message(msg)).await;
    debug!(message_id = msg.id.0, ?outcome, "Helper message handled");
}
