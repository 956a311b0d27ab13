use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::sugar::request::RequestReplyExt;
use teloxide::types::{InputFile, Me, MessageId, ParseMode, ThreadId};
use teloxide::update_listeners::{Polling, UpdateListener};
use teloxide::utils::command::BotCommands;
use teloxide::RequestError;
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::config::Config;
use crate::context::UpdateContext;
use crate::replies::{self, Reply};
use crate::state::AppState;

/// Long-poll window kept below the HTTP client timeout.
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Build a bot whose HTTP client honours the configured request timeout.
pub fn build_bot(config: &Config) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build Telegram HTTP client")?;
    Ok(Bot::with_client(config.bot_token.expose(), client))
}

/// Verify the token with `getMe`, retrying transport failures only.
pub async fn probe(bot: &Bot, max_retries: u32) -> Result<Me> {
    let attempts = max_retries.max(1);
    let mut attempt = 1;
    loop {
        match bot.get_me().await {
            Ok(me) => return Ok(me),
            Err(err) if attempt < attempts && is_transient(&err) => {
                let delay = retry_delay(attempt);
                warn!(
                    "getMe attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, attempts, err, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Telegram getMe failed after {attempt} attempt(s)"));
            }
        }
    }
}

fn is_transient(err: &RequestError) -> bool {
    matches!(
        err,
        RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
    )
}

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(attempt))
}

/// Publish the command list shown in Telegram's command menu.
pub async fn register_commands(bot: &Bot) {
    match bot.set_my_commands(Command::bot_commands()).await {
        Ok(_) => info!("Registered {} bot commands", Command::ALL.len()),
        Err(e) => warn!("Failed to register bot commands: {}", e),
    }
}

pub async fn polling_listener(bot: &Bot, config: &Config) -> impl UpdateListener<Err = RequestError> {
    let timeout = config
        .request_timeout
        .saturating_sub(POLL_TIMEOUT_MARGIN)
        .max(Duration::from_secs(1));
    Polling::builder(bot.clone())
        .timeout(timeout)
        .delete_webhook()
        .await
        .build()
}

fn schema() -> UpdateHandler<RequestError> {
    dptree::entry()
        .inspect(|state: Arc<AppState>| state.metrics.record_update())
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            Update::filter_edited_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        // Channel posts carry no sender
        .branch(
            Update::filter_channel_post()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callback))
}

/// Run the dispatcher until Ctrl-C or until the listener stops.
pub async fn dispatch<L>(bot: Bot, state: Arc<AppState>, listener: L)
where
    L: UpdateListener + Send,
    L::Err: Debug,
{
    info!("Starting Telegram dispatcher...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("update listener"),
        )
        .await;

    info!("Telegram dispatcher stopped");
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let ctx = UpdateContext::from_message(&msg);
    info!(
        "/{} from user {:?} in chat {} ({})",
        cmd.name(),
        ctx.from_user.as_ref().map(|u| u.id),
        ctx.chat.id,
        ctx.chat.kind
    );
    respond(&bot, &state, cmd, &ctx, Target::reply(&msg)).await
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    state.metrics.record_callback();
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(cmd) = q.data.as_deref().and_then(Command::from_callback) else {
        debug!("Ignoring callback data {:?}", q.data);
        return Ok(());
    };
    let Some(ctx) = UpdateContext::from_callback(&q) else {
        warn!("Callback /{} has no accessible message, skipping", cmd.name());
        return Ok(());
    };
    info!(
        "/{} (button) from user {} in chat {}",
        cmd.name(),
        q.from.id,
        ctx.chat.id
    );
    let target = Target::follow_up(&ctx);
    respond(&bot, &state, cmd, &ctx, target).await
}

async fn respond(
    bot: &Bot,
    state: &AppState,
    cmd: Command,
    ctx: &UpdateContext,
    target: Target,
) -> ResponseResult<()> {
    state.metrics.record_command(cmd);

    let reply = match replies::answer(cmd, ctx, bot, state.config.signature.as_deref()).await {
        Ok(reply) => reply,
        Err(err) => {
            state.metrics.record_command_error();
            warn!(
                "/{} could not be answered in chat {}: {} ({})",
                cmd.name(),
                ctx.chat.id,
                err.kind(),
                err
            );
            replies::failure(&err)
        }
    };

    if let Err(e) = deliver(bot, &target, reply).await {
        state.metrics.record_send_failure();
        return Err(e);
    }
    Ok(())
}

/// Where a reply goes: quoted under the command, or into the menu's thread.
struct Target {
    chat_id: ChatId,
    reply_to: Option<MessageId>,
    thread_id: Option<ThreadId>,
}

impl Target {
    fn reply(msg: &Message) -> Self {
        Target {
            chat_id: msg.chat.id,
            reply_to: Some(msg.id),
            thread_id: None,
        }
    }

    fn follow_up(ctx: &UpdateContext) -> Self {
        let thread_id = ctx
            .message
            .as_ref()
            .filter(|m| m.is_topic_message)
            .and_then(|m| m.thread_id)
            .map(|id| ThreadId(MessageId(id)));
        Target {
            chat_id: ChatId(ctx.chat.id),
            reply_to: None,
            thread_id,
        }
    }
}

async fn deliver(bot: &Bot, target: &Target, reply: Reply) -> ResponseResult<()> {
    match reply {
        Reply::Text {
            text,
            html,
            keyboard,
        } => {
            let mut request = bot.send_message(target.chat_id, text);
            if html {
                request = request.parse_mode(ParseMode::Html);
            }
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            if let Some(id) = target.reply_to {
                request = request.reply_to(id);
            }
            if let Some(thread) = target.thread_id {
                request = request.message_thread_id(thread);
            }
            request.await?;
        }
        Reply::Document { file_name, bytes } => {
            let mut request =
                bot.send_document(target.chat_id, InputFile::memory(bytes).file_name(file_name));
            if let Some(id) = target.reply_to {
                request = request.reply_to(id);
            }
            if let Some(thread) = target.thread_id {
                request = request.message_thread_id(thread);
            }
            request.await?;
        }
        Reply::Ping => {
            let started = Instant::now();
            let mut request = bot.send_message(target.chat_id, "Pinging...");
            if let Some(id) = target.reply_to {
                request = request.reply_to(id);
            }
            if let Some(thread) = target.thread_id {
                request = request.message_thread_id(thread);
            }
            let sent = request.await?;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            bot.edit_message_text(target.chat_id, sent.id, replies::ping_result(latency_ms))
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }
    Ok(())
}
