use chrono::{DateTime, Utc};
use serde::Serialize;
use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::utils::html;

use crate::commands::{self, Command};
use crate::context::{ChatInfo, ChatType, MessageInfo, UpdateContext, UserInfo};
use crate::directory::{AdminEntry, ChatDirectory};
use crate::error::CommandError;

pub const EXPORT_FILE_NAME: &str = "Chat_Info.json";

/// What the bot should send back for a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        text: String,
        html: bool,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Document {
        file_name: &'static str,
        bytes: Vec<u8>,
    },
    /// Round-trip probe: send a placeholder, then edit it with the latency.
    Ping,
}

impl Reply {
    fn html(text: String) -> Self {
        Reply::Text {
            text,
            html: true,
            keyboard: None,
        }
    }

    fn plain(text: String) -> Self {
        Reply::Text {
            text,
            html: false,
            keyboard: None,
        }
    }
}

/// Decide the reply for `cmd`. Only /members, /admins and /export touch
/// the directory.
pub async fn answer(
    cmd: Command,
    ctx: &UpdateContext,
    directory: &dyn ChatDirectory,
    signature: Option<&str>,
) -> Result<Reply, CommandError> {
    match cmd {
        Command::Start => Ok(Reply::Text {
            text: commands::start_text(signature),
            html: true,
            keyboard: Some(commands::menu_keyboard()),
        }),
        Command::Help => Ok(Reply::html(commands::help_text(signature))),
        Command::Id => {
            let user = ctx.from_user.as_ref().ok_or(CommandError::NoSender)?;
            Ok(Reply::html(format!(
                "Your ID : {}",
                html::code_inline(&user.id.to_string())
            )))
        }
        Command::ChatId => Ok(Reply::html(format!(
            "Chat ID : {}\nType: {}",
            html::code_inline(&ctx.chat.id.to_string()),
            ctx.chat.kind
        ))),
        Command::TopicId => topic_id(ctx).map(Reply::html),
        Command::Members => {
            let count = directory
                .member_count(ChatId(ctx.chat.id))
                .await
                .map_err(CommandError::MemberCount)?;
            Ok(Reply::html(format!("👥 Members : {}", html::bold(&count.to_string()))))
        }
        Command::Admins => {
            if ctx.chat.kind == ChatType::Private {
                return Err(CommandError::PrivateChat);
            }
            let admins = directory
                .administrators(ChatId(ctx.chat.id))
                .await
                .map_err(CommandError::Admins)?;
            Ok(Reply::html(admin_list(&admins)))
        }
        Command::Export => {
            // A failed count still yields a valid document
            let member_count = directory.member_count(ChatId(ctx.chat.id)).await.ok();
            let bytes = export_json(ctx, member_count, Utc::now())?;
            Ok(Reply::Document {
                file_name: EXPORT_FILE_NAME,
                bytes,
            })
        }
        Command::UserInfo => {
            let user = ctx.from_user.as_ref().ok_or(CommandError::NoSender)?;
            Ok(Reply::html(user_info(user)))
        }
        Command::Ping => Ok(Reply::Ping),
        Command::FileId => {
            let file_id = ctx
                .message
                .as_ref()
                .and_then(|m| m.replied_file_id.as_deref())
                .ok_or(CommandError::NoRepliedMedia)?;
            Ok(Reply::html(format!("🆔 File ID :\n{}", html::code_inline(file_id))))
        }
    }
}

/// Reply for a command that could not be answered.
pub fn failure(err: &CommandError) -> Reply {
    Reply::plain(err.to_string())
}

pub fn ping_result(latency_ms: f64) -> String {
    format!("🏓 Pong ! : {}", html::bold(&format!("{latency_ms:.2} ms")))
}

fn topic_id(ctx: &UpdateContext) -> Result<String, CommandError> {
    if !ctx.chat.kind.is_group_like() {
        return Err(CommandError::NotInGroup);
    }
    let thread_id = ctx
        .message
        .as_ref()
        .filter(|m| m.is_topic_message)
        .and_then(|m| m.thread_id)
        .ok_or(CommandError::NotInTopic)?;
    Ok(format!(
        "🧵 This Topic's ID : {}",
        html::code_inline(&thread_id.to_string())
    ))
}

fn admin_list(admins: &[AdminEntry]) -> String {
    if admins.is_empty() {
        return "👑 No Administrators Found In This Chat.".to_string();
    }
    let mut text = format!("👑 Admins ({}) :", admins.len());
    for admin in admins {
        let mention = format!(
            "<a href=\"tg://user?id={}\">{}</a>",
            admin.user_id,
            html::escape(&admin.full_name)
        );
        text.push('\n');
        text.push_str(&mention);
        if admin.is_owner {
            text.push_str(" (Owner)");
        }
        if admin.is_bot {
            text.push_str(" 🤖");
        }
    }
    text
}

fn user_info(user: &UserInfo) -> String {
    let username = user
        .username
        .as_deref()
        .map(|u| format!("@{}", html::escape(u)))
        .unwrap_or_else(|| "N/A".to_string());
    let language = user
        .language_code
        .as_deref()
        .map(html::escape)
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "👤 {}\nID : {}\nUsername : {}\nName: {}\nLanguage : {}\nBot : {}",
        html::bold("User Info"),
        html::code_inline(&user.id.to_string()),
        username,
        html::escape(&user.full_name),
        language,
        if user.is_bot { "Yes" } else { "No" }
    )
}

#[derive(Serialize)]
struct ExportChat<'a> {
    #[serde(flatten)]
    info: &'a ChatInfo,
    member_count: Option<u32>,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    chat: ExportChat<'a>,
    from_user: Option<&'a UserInfo>,
    message: Option<&'a MessageInfo>,
    exported_at: DateTime<Utc>,
}

/// Pretty-printed JSON snapshot of the update for /export.
pub fn export_json(
    ctx: &UpdateContext,
    member_count: Option<u32>,
    exported_at: DateTime<Utc>,
) -> Result<Vec<u8>, CommandError> {
    let document = ExportDocument {
        chat: ExportChat {
            info: &ctx.chat,
            member_count,
        },
        from_user: ctx.from_user.as_ref(),
        message: ctx.message.as_ref(),
        exported_at,
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::fixtures::{context, group_chat, private_chat, user};
    use async_trait::async_trait;
    use serde_json::Value;
    use teloxide::{ApiError, RequestError};

    struct FakeDirectory {
        members: Option<u32>,
        admins: Option<Vec<AdminEntry>>,
    }

    impl FakeDirectory {
        fn with(members: u32, admins: Vec<AdminEntry>) -> Self {
            Self {
                members: Some(members),
                admins: Some(admins),
            }
        }

        fn unreachable() -> Self {
            Self {
                members: None,
                admins: None,
            }
        }
    }

    #[async_trait]
    impl ChatDirectory for FakeDirectory {
        async fn member_count(&self, _chat_id: ChatId) -> Result<u32, RequestError> {
            self.members
                .ok_or(RequestError::Api(ApiError::ChatNotFound))
        }

        async fn administrators(&self, _chat_id: ChatId) -> Result<Vec<AdminEntry>, RequestError> {
            self.admins
                .clone()
                .ok_or(RequestError::Api(ApiError::ChatNotFound))
        }
    }

    fn admin(user_id: u64, name: &str, is_owner: bool) -> AdminEntry {
        AdminEntry {
            user_id,
            full_name: name.to_string(),
            is_owner,
            is_bot: false,
        }
    }

    fn text_of(reply: Reply) -> String {
        match reply {
            Reply::Text { text, .. } => text,
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    async fn run(cmd: Command, ctx: &UpdateContext, dir: &FakeDirectory) -> Result<Reply, CommandError> {
        answer(cmd, ctx, dir, None).await
    }

    #[tokio::test]
    async fn test_id_is_stable_across_calls() {
        let ctx = context(private_chat(555), Some(user(555, "Alice")), "/id");
        let dir = FakeDirectory::unreachable();

        let first = text_of(run(Command::Id, &ctx, &dir).await.unwrap());
        let second = text_of(run(Command::Id, &ctx, &dir).await.unwrap());
        assert_eq!(first, "Your ID : <code>555</code>");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_id_in_group_reports_user_not_chat() {
        let ctx = context(
            group_chat(-1001234, ChatType::Supergroup, "Team"),
            Some(user(77, "Bob")),
            "/id",
        );
        let text = text_of(run(Command::Id, &ctx, &FakeDirectory::unreachable()).await.unwrap());
        assert!(text.contains("<code>77</code>"));
        assert!(!text.contains("-1001234"));
    }

    #[tokio::test]
    async fn test_id_without_sender_is_user_facing_error() {
        let ctx = context(group_chat(-5, ChatType::Channel, "News"), None, "/id");
        let err = run(Command::Id, &ctx, &FakeDirectory::unreachable()).await.unwrap_err();
        assert!(matches!(err, CommandError::NoSender));
    }

    #[tokio::test]
    async fn test_chatid_differs_between_chats() {
        let dir = FakeDirectory::unreachable();
        let a = context(group_chat(-100, ChatType::Group, "A"), Some(user(1, "U")), "/chatid");
        let b = context(group_chat(-200, ChatType::Supergroup, "B"), Some(user(1, "U")), "/chatid");

        let text_a = text_of(run(Command::ChatId, &a, &dir).await.unwrap());
        let text_b = text_of(run(Command::ChatId, &b, &dir).await.unwrap());
        assert_eq!(text_a, "Chat ID : <code>-100</code>\nType: group");
        assert_eq!(text_b, "Chat ID : <code>-200</code>\nType: supergroup");
        assert_ne!(text_a, text_b);
    }

    #[tokio::test]
    async fn test_topicid_inside_topic() {
        let mut ctx = context(group_chat(-300, ChatType::Supergroup, "Forum"), Some(user(1, "U")), "/topicid");
        if let Some(message) = ctx.message.as_mut() {
            message.thread_id = Some(42);
            message.is_topic_message = true;
        }
        let text = text_of(run(Command::TopicId, &ctx, &FakeDirectory::unreachable()).await.unwrap());
        assert_eq!(text, "🧵 This Topic's ID : <code>42</code>");
    }

    #[tokio::test]
    async fn test_topicid_reply_thread_is_not_a_topic() {
        let mut ctx = context(group_chat(-300, ChatType::Supergroup, "Group"), Some(user(1, "U")), "/topicid");
        if let Some(message) = ctx.message.as_mut() {
            message.thread_id = Some(9);
        }
        let err = run(Command::TopicId, &ctx, &FakeDirectory::unreachable()).await.unwrap_err();
        assert!(matches!(err, CommandError::NotInTopic));
    }

    #[tokio::test]
    async fn test_topicid_outside_groups() {
        let ctx = context(private_chat(1), Some(user(1, "U")), "/topicid");
        let err = run(Command::TopicId, &ctx, &FakeDirectory::unreachable()).await.unwrap_err();
        assert!(matches!(err, CommandError::NotInGroup));
    }

    #[tokio::test]
    async fn test_members_count() {
        let ctx = context(group_chat(-1, ChatType::Group, "G"), Some(user(1, "U")), "/members");
        let text = text_of(run(Command::Members, &ctx, &FakeDirectory::with(17, vec![])).await.unwrap());
        assert_eq!(text, "👥 Members : <b>17</b>");
    }

    #[tokio::test]
    async fn test_members_failure_is_explained() {
        let ctx = context(group_chat(-1, ChatType::Group, "G"), Some(user(1, "U")), "/members");
        let err = run(Command::Members, &ctx, &FakeDirectory::unreachable()).await.unwrap_err();
        assert!(err.to_string().starts_with("⚠️ Could Not Fetch Member Count"));
        assert_eq!(err.kind(), "member_count");
    }

    #[tokio::test]
    async fn test_admins_list_length_matches_count() {
        let admins = vec![
            admin(1, "Owner <One>", true),
            admin(2, "Second", false),
            admin(3, "Third", false),
        ];
        let ctx = context(group_chat(-1, ChatType::Supergroup, "G"), Some(user(1, "U")), "/admins");
        let text = text_of(run(Command::Admins, &ctx, &FakeDirectory::with(10, admins)).await.unwrap());

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("👑 Admins (3) :"));
        let names: Vec<&str> = lines.collect();
        assert_eq!(names.len(), 3);
        assert_eq!(names[0], r#"<a href="tg://user?id=1">Owner &lt;One&gt;</a> (Owner)"#);
    }

    #[tokio::test]
    async fn test_admins_empty_channel_is_not_an_error() {
        let ctx = context(group_chat(-9, ChatType::Channel, "C"), None, "/admins");
        let reply = run(Command::Admins, &ctx, &FakeDirectory::with(0, vec![])).await.unwrap();
        assert_eq!(text_of(reply), "👑 No Administrators Found In This Chat.");
    }

    #[tokio::test]
    async fn test_admins_in_private_chat_skips_lookup() {
        let ctx = context(private_chat(1), Some(user(1, "U")), "/admins");
        let err = run(Command::Admins, &ctx, &FakeDirectory::unreachable()).await.unwrap_err();
        assert!(matches!(err, CommandError::PrivateChat));
    }

    #[tokio::test]
    async fn test_admins_failure_is_explained() {
        let ctx = context(group_chat(-1, ChatType::Group, "G"), Some(user(1, "U")), "/admins");
        let err = run(Command::Admins, &ctx, &FakeDirectory::unreachable()).await.unwrap_err();
        assert!(matches!(err, CommandError::Admins(_)));
        assert!(failure(&err) != Reply::Ping);
    }

    #[tokio::test]
    async fn test_fileid_without_reply_explains() {
        let ctx = context(private_chat(1), Some(user(1, "U")), "/fileid");
        let err = run(Command::FileId, &ctx, &FakeDirectory::unreachable()).await.unwrap_err();
        assert!(matches!(err, CommandError::NoRepliedMedia));
        match failure(&err) {
            Reply::Text { text, html, .. } => {
                assert!(!html);
                assert!(text.contains("Reply To A Sticker/Photo/Document/Video"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fileid_with_replied_media() {
        let mut ctx = context(private_chat(1), Some(user(1, "U")), "/fileid");
        if let Some(message) = ctx.message.as_mut() {
            message.reply_to_message_id = Some(3);
            message.replied_file_id = Some("AgACAgIAAxkBAAIB".to_string());
        }
        let text = text_of(run(Command::FileId, &ctx, &FakeDirectory::unreachable()).await.unwrap());
        assert_eq!(text, "🆔 File ID :\n<code>AgACAgIAAxkBAAIB</code>");
    }

    #[tokio::test]
    async fn test_export_contains_required_fields() {
        let ctx = context(group_chat(-42, ChatType::Supergroup, "Rustaceans"), Some(user(7, "Ann")), "/export");
        let reply = run(Command::Export, &ctx, &FakeDirectory::with(128, vec![])).await.unwrap();
        let Reply::Document { file_name, bytes } = reply else {
            panic!("expected a document");
        };
        assert_eq!(file_name, "Chat_Info.json");

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["chat"]["id"], -42);
        assert_eq!(value["chat"]["title"], "Rustaceans");
        assert_eq!(value["chat"]["member_count"], 128);
        assert_eq!(value["from_user"]["id"], 7);
        assert_eq!(value["message"]["text"], "/export");
        assert!(value["exported_at"].is_string());
    }

    #[tokio::test]
    async fn test_export_is_valid_json_when_lookup_fails() {
        let ctx = context(private_chat(5), None, "/export");
        for _ in 0..3 {
            let reply = run(Command::Export, &ctx, &FakeDirectory::unreachable()).await.unwrap();
            let Reply::Document { bytes, .. } = reply else {
                panic!("expected a document");
            };
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["chat"]["id"], 5);
            assert!(value["chat"]["title"].is_null());
            assert!(value["chat"]["member_count"].is_null());
            assert!(value["from_user"].is_null());
        }
    }

    #[tokio::test]
    async fn test_userinfo_formats_missing_fields() {
        let mut u = user(99, "Zed <z>");
        u.username = None;
        u.language_code = None;
        let ctx = context(private_chat(99), Some(u), "/userinfo");
        let text = text_of(run(Command::UserInfo, &ctx, &FakeDirectory::unreachable()).await.unwrap());
        assert_eq!(
            text,
            "👤 <b>User Info</b>\nID : <code>99</code>\nUsername : N/A\nName: Zed &lt;z&gt;\nLanguage : N/A\nBot : No"
        );
    }

    #[tokio::test]
    async fn test_start_has_keyboard_and_signature() {
        let ctx = context(private_chat(1), Some(user(1, "U")), "/start");
        let reply = answer(Command::Start, &ctx, &FakeDirectory::unreachable(), Some("by @ops"))
            .await
            .unwrap();
        match reply {
            Reply::Text { text, keyboard, .. } => {
                assert!(text.starts_with("Hi! I Can Show IDs And Chat Info."));
                assert!(text.ends_with("by @ops"));
                assert!(keyboard.is_some());
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping_is_deferred_to_sender() {
        let ctx = context(private_chat(1), Some(user(1, "U")), "/ping");
        assert_eq!(run(Command::Ping, &ctx, &FakeDirectory::unreachable()).await.unwrap(), Reply::Ping);
        assert_eq!(ping_result(12.346), "🏓 Pong ! : <b>12.35 ms</b>");
    }
}
