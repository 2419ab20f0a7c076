//! Telegram delivery transport using teloxide.

use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, ParseMode};
use tracing::warn;

use crate::broadcast::{DeliveryError, Transport};

fn no_link_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Map a Telegram API failure onto the dispatcher's two failure classes.
///
/// Telegram reports "this chat is gone" through dedicated API error
/// variants, so no error-text matching is needed here.
fn classify(err: RequestError) -> DeliveryError {
    match &err {
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::ChatNotFound
            | ApiError::GroupDeactivated
            | ApiError::UserDeactivated,
        ) => DeliveryError::Unreachable(err.to_string()),
        _ => DeliveryError::Transient(err.to_string()),
    }
}

/// Telegram API client. Sends HTML messages with link previews suppressed.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send an HTML-formatted message to a chat.
    pub async fn send_html(&self, chat_id: ChatId, text: &str) -> Result<(), RequestError> {
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .link_preview_options(no_link_preview())
            .await?;
        Ok(())
    }
}

impl Transport for TelegramClient {
    async fn deliver(&self, recipient: &str, text: &str) -> Result<(), DeliveryError> {
        // Recipients are stored as opaque strings; an entry that is not a
        // chat id can never be delivered to, so let it get pruned.
        let chat_id: i64 = recipient.parse().map_err(|_| {
            warn!("Recipient '{recipient}' is not a chat id");
            DeliveryError::Unreachable(format!("malformed recipient '{recipient}'"))
        })?;

        self.send_html(ChatId(chat_id), text)
            .await
            .map_err(classify)
    }
}
