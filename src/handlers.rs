use crate::access::DENIED_MESSAGE;
use crate::extract;
use crate::flow::{
    Button, CallbackAction, Flow, Reply, EXTRACTING_CONTENT, FETCHING_BATCHES, INTERNAL_ERROR,
    SELECTION_EXPIRED,
};
use crate::session::ConversationId;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, instrument, warn};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "choose a batch and download its links.")]
    Start,
    #[command(description = "show this text.")]
    Help,
    #[command(description = "admin: grant access, /add <user_id> <days>.")]
    Add(String),
    #[command(description = "admin: revoke access, /remove <user_id>.")]
    Remove(String),
    #[command(description = "admin: list authorized users.")]
    Users,
}

/// Publish the command list to Telegram. Failures are logged only.
pub async fn register_commands(bot: &Bot) {
    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(?err, "failed to register bot commands");
    }
}

/// Dispatcher endpoint for commands. Never fails; errors are logged and the
/// user gets a generic apology.
pub async fn on_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    flow: Arc<Flow>,
) -> ResponseResult<()> {
    if let Err(err) = handle_command(&bot, &flow, &msg, cmd).await {
        error!(?err, chat_id = msg.chat.id.0, "failed to handle command");
        let _ = bot.send_message(msg.chat.id, INTERNAL_ERROR).await;
    }
    Ok(())
}

/// Dispatcher endpoint for inline keyboard presses.
pub async fn on_callback(bot: Bot, q: CallbackQuery, flow: Arc<Flow>) -> ResponseResult<()> {
    let chat_id = q.message.as_ref().map(|m| m.chat.id);
    if let Err(err) = handle_callback(&bot, &flow, q).await {
        error!(?err, "failed to handle callback");
        if let Some(chat_id) = chat_id {
            let _ = bot.send_message(chat_id, INTERNAL_ERROR).await;
        }
    }
    Ok(())
}

#[instrument(skip_all, fields(chat_id = msg.chat.id.0))]
pub async fn handle_command(bot: &Bot, flow: &Flow, msg: &Message, cmd: Command) -> Result<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    info!(user_id, ?cmd, "command received");

    let reply = match cmd {
        Command::Start => {
            flow.start(ConversationId::new(msg.chat.id.0, user_id))
                .await?
        }
        Command::Help => Reply::text(Command::descriptions().to_string()),
        Command::Add(args) => flow.add_user(user_id, &args).await?,
        Command::Remove(args) => flow.remove_user(user_id, &args).await?,
        Command::Users => flow.list_users(user_id).await?,
    };
    send_reply(bot, msg.chat.id, reply).await
}

#[instrument(skip_all, fields(user_id = q.from.id.0))]
pub async fn handle_callback(bot: &Bot, flow: &Flow, q: CallbackQuery) -> Result<()> {
    let data = q.data.clone().unwrap_or_default();
    let (Some(message), Some(action)) = (q.message.as_ref(), CallbackAction::parse(&data)) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let chat_id = message.chat.id;
    let message_id = message.id;
    let user_id = q.from.id.0 as i64;
    let conv = ConversationId::new(chat_id.0, user_id);

    if !flow.authorize(user_id).await? {
        bot.answer_callback_query(q.id)
            .text(DENIED_MESSAGE)
            .show_alert(true)
            .await?;
        return Ok(());
    }
    if let CallbackAction::ChooseBatch(token) = &action {
        // Leave the menu untouched when it belongs to someone else or is stale.
        if !flow.holds_selection(conv, token).await {
            bot.answer_callback_query(q.id)
                .text(SELECTION_EXPIRED)
                .show_alert(true)
                .await?;
            return Ok(());
        }
    }
    bot.answer_callback_query(q.id).await?;

    let reply = match action {
        CallbackAction::ChooseKind(kind) => {
            bot.edit_message_text(chat_id, message_id, FETCHING_BATCHES)
                .await?;
            flow.choose_kind(conv, kind).await
        }
        CallbackAction::ChooseBatch(token) => {
            bot.edit_message_text(chat_id, message_id, EXTRACTING_CONTENT)
                .await?;
            flow.choose_batch(conv, &token).await?
        }
    };
    edit_reply(bot, chat_id, message_id, reply).await
}

/// One button per row, in the given order.
pub fn keyboard(buttons: &[Button]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        buttons
            .iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label.clone(), b.data.clone())]),
    )
}

/// Upload the export under its display name, then delete it whether or not
/// the upload succeeded.
async fn send_document(
    bot: &Bot,
    chat_id: ChatId,
    file_name: String,
    path: PathBuf,
    link_count: usize,
) -> Result<()> {
    let file = InputFile::file(path.clone()).file_name(file_name);
    let sent = bot
        .send_document(chat_id, file)
        .caption(format!("🔗 {link_count} links"))
        .await;
    if let Err(err) = extract::remove_export(&path).await {
        warn!(?err, "failed to remove export");
    }
    sent?;
    Ok(())
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    match reply {
        Reply::Denied => {
            bot.send_message(chat_id, DENIED_MESSAGE).await?;
        }
        Reply::Text(text) => {
            bot.send_message(chat_id, text).await?;
        }
        Reply::Menu { text, buttons } => {
            bot.send_message(chat_id, text)
                .reply_markup(keyboard(&buttons))
                .await?;
        }
        Reply::Document {
            file_name,
            path,
            link_count,
        } => send_document(bot, chat_id, file_name, path, link_count).await?,
    }
    Ok(())
}

/// Replace the menu message in place; documents are sent as a new message.
async fn edit_reply(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    reply: Reply,
) -> Result<()> {
    match reply {
        // Callbacks are authorized before the flow runs.
        Reply::Denied => unreachable!("callback flow never denies"),
        Reply::Text(text) => {
            bot.edit_message_text(chat_id, message_id, text).await?;
        }
        Reply::Menu { text, buttons } => {
            bot.edit_message_text(chat_id, message_id, text)
                .reply_markup(keyboard(&buttons))
                .await?;
        }
        Reply::Document {
            file_name,
            path,
            link_count,
        } => {
            let edited = bot
                .edit_message_text(chat_id, message_id, format!("✅ {file_name}"))
                .await;
            send_document(bot, chat_id, file_name, path, link_count).await?;
            edited?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!(Command::parse("/start", "bot").unwrap(), Command::Start);
        assert_eq!(
            Command::parse("/add 123 5", "bot").unwrap(),
            Command::Add("123 5".into())
        );
        assert_eq!(
            Command::parse("/remove 9", "bot").unwrap(),
            Command::Remove("9".into())
        );
        assert_eq!(Command::parse("/users", "bot").unwrap(), Command::Users);
    }

    #[test]
    fn keyboard_has_one_button_per_row() {
        let markup = keyboard(&[
            Button {
                label: "A".into(),
                data: "batch_a".into(),
            },
            Button {
                label: "B".into(),
                data: "batch_b".into(),
            },
        ]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert!(markup.inline_keyboard.iter().all(|row| row.len() == 1));
        assert_eq!(markup.inline_keyboard[1][0].text, "B");
    }
}
