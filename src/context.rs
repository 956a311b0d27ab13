//! Plain snapshots of the parts of an update the commands read.
//!
//! Handlers convert teloxide's `Message` / `CallbackQuery` into an
//! [`UpdateContext`] once, and the reply logic works on these values only.
//! The same structs serialize into the `/export` document.

use chrono::{DateTime, Utc};
use serde::Serialize;
use teloxide::types::{CallbackQuery, Chat, Message, MessageEntity, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatType {
    pub fn is_group_like(self) -> bool {
        matches!(self, ChatType::Group | ChatType::Supergroup)
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatType::Private => write!(f, "private"),
            ChatType::Group => write!(f, "group"),
            ChatType::Supergroup => write!(f, "supergroup"),
            ChatType::Channel => write!(f, "channel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatInfo {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatType,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&Chat> for ChatInfo {
    fn from(chat: &Chat) -> Self {
        let kind = if chat.is_private() {
            ChatType::Private
        } else if chat.is_supergroup() {
            ChatType::Supergroup
        } else if chat.is_channel() {
            ChatType::Channel
        } else {
            ChatType::Group
        };
        ChatInfo {
            id: chat.id.0,
            kind,
            title: chat.title().map(str::to_string),
            username: chat.username().map(str::to_string),
            first_name: chat.first_name().map(str::to_string),
            last_name: chat.last_name().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub id: u64,
    pub is_bot: bool,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: String,
    pub language_code: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.id.0,
            is_bot: user.is_bot,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            language_code: user.language_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageInfo {
    pub message_id: i32,
    pub thread_id: Option<i32>,
    pub is_topic_message: bool,
    pub text: Option<String>,
    pub entities: Option<Vec<MessageEntity>>,
    pub caption: Option<String>,
    pub media_group_id: Option<String>,
    pub has_protected_content: bool,
    pub date: DateTime<Utc>,
    pub edit_date: Option<DateTime<Utc>>,
    pub reply_to_message_id: Option<i32>,
    /// File ID of the media in the replied-to message, if any.
    #[serde(skip)]
    pub replied_file_id: Option<String>,
}

impl From<&Message> for MessageInfo {
    fn from(msg: &Message) -> Self {
        let reply = msg.reply_to_message();
        MessageInfo {
            message_id: msg.id.0,
            thread_id: msg.thread_id.map(|t| t.0 .0),
            is_topic_message: msg.is_topic_message,
            text: msg.text().map(str::to_string),
            entities: msg.entities().map(|e| e.to_vec()),
            caption: msg.caption().map(str::to_string),
            media_group_id: msg.media_group_id().map(|id| id.to_string()),
            has_protected_content: msg.has_protected_content(),
            date: msg.date,
            edit_date: msg.edit_date().copied(),
            reply_to_message_id: reply.map(|r| r.id.0),
            replied_file_id: reply.and_then(media_file_id),
        }
    }
}

/// File ID of the media attached to `msg`. Photos resolve to the largest size.
pub fn media_file_id(msg: &Message) -> Option<String> {
    if let Some(sticker) = msg.sticker() {
        return Some(sticker.file.id.to_string());
    }
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(photo.file.id.to_string());
    }
    if let Some(document) = msg.document() {
        return Some(document.file.id.to_string());
    }
    if let Some(video) = msg.video() {
        return Some(video.file.id.to_string());
    }
    if let Some(animation) = msg.animation() {
        return Some(animation.file.id.to_string());
    }
    if let Some(audio) = msg.audio() {
        return Some(audio.file.id.to_string());
    }
    if let Some(voice) = msg.voice() {
        return Some(voice.file.id.to_string());
    }
    msg.video_note().map(|note| note.file.id.to_string())
}

/// Everything a command may read about the update that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateContext {
    pub chat: ChatInfo,
    pub from_user: Option<UserInfo>,
    pub message: Option<MessageInfo>,
}

impl UpdateContext {
    pub fn from_message(msg: &Message) -> Self {
        UpdateContext {
            chat: ChatInfo::from(&msg.chat),
            from_user: msg.from.as_ref().map(UserInfo::from),
            message: Some(MessageInfo::from(msg)),
        }
    }

    /// Context for an inline keyboard press. The acting user is whoever
    /// pressed the button; the message is the bot's own menu message.
    pub fn from_callback(q: &CallbackQuery) -> Option<Self> {
        let msg = q.regular_message()?;
        Some(UpdateContext {
            chat: ChatInfo::from(&msg.chat),
            from_user: Some(UserInfo::from(&q.from)),
            message: Some(MessageInfo::from(msg)),
        })
    }
}
