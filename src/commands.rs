use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Show menu")]
    Start,
    #[command(description = "Show this help")]
    Help,
    #[command(description = "Your Telegram ID")]
    Id,
    #[command(description = "This chat's/group's ID")]
    ChatId,
    #[command(description = "Get the topic ID in this thread")]
    TopicId,
    #[command(description = "Member count")]
    Members,
    #[command(description = "List chat/group admins")]
    Admins,
    #[command(description = "Export chat info as JSON")]
    Export,
    #[command(description = "Show detailed user info")]
    UserInfo,
    #[command(description = "Test bot latency")]
    Ping,
    #[command(description = "Get file ID from media")]
    FileId,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Command::Start,
        Command::Help,
        Command::Id,
        Command::ChatId,
        Command::TopicId,
        Command::Members,
        Command::Admins,
        Command::Export,
        Command::UserInfo,
        Command::Ping,
        Command::FileId,
    ];

    /// Command name without the leading slash; doubles as callback data.
    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Id => "id",
            Command::ChatId => "chatid",
            Command::TopicId => "topicid",
            Command::Members => "members",
            Command::Admins => "admins",
            Command::Export => "export",
            Command::UserInfo => "userinfo",
            Command::Ping => "ping",
            Command::FileId => "fileid",
        }
    }

    /// Position in [`Command::ALL`], used to index per-command counters.
    pub fn index(self) -> usize {
        Command::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or_default()
    }

    /// Resolve inline keyboard callback data back into a command.
    pub fn from_callback(data: &str) -> Option<Command> {
        MENU_BUTTONS
            .iter()
            .find(|(_, cmd)| cmd.name() == data)
            .map(|(_, cmd)| *cmd)
    }
}

const MENU_BUTTONS: [(&str, Command); 7] = [
    ("Your ID", Command::Id),
    ("This Chat/Group ID", Command::ChatId),
    ("Admins", Command::Admins),
    ("📦 Export JSON", Command::Export),
    ("ℹ️ User Info", Command::UserInfo),
    ("🆘 Help", Command::Help),
    ("🧵 Topic ID", Command::TopicId),
];

/// Inline keyboard attached to the /start reply, one button per row.
pub fn menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        MENU_BUTTONS
            .iter()
            .map(|(label, cmd)| vec![InlineKeyboardButton::callback(*label, cmd.name())]),
    )
}

pub fn start_text(signature: Option<&str>) -> String {
    let text = "Hi! I Can Show IDs And Chat Info.\n\n\
         Commands :\n\
         /id – Your ID\n\
         /chatid – This Chat's/Group's ID\n\
         /topicid – Get The Topic ID In This Thread\n\
         /members – Member Count\n\
         /admins – List Admins\n\
         /export – Export Chat Info As JSON\n\
         /userinfo – Show Your Info\n\
         /ping – Bot Latency\n\
         /fileid – Get File ID Of Media";
    with_signature(text, signature)
}

pub fn help_text(signature: Option<&str>) -> String {
    let text = "📖 Available Commands:\n\n\
         /start – Show Menu\n\
         /help – Show This Help\n\
         /id – Your Telegram ID\n\
         /chatid – This Chat's/Group's ID\n\
         /topicid – Get The Topic ID In This Thread\n\
         /members – Member Count\n\
         /admins – List Chat/Group Admins\n\
         /export – Export Chat Info As JSON\n\
         /userinfo – Show Detailed User Info\n\
         /ping – Test Bot Latency\n\
         /fileid – Get File ID From Media";
    with_signature(text, signature)
}

fn with_signature(text: &str, signature: Option<&str>) -> String {
    match signature {
        Some(sig) => format!("{text}\n\n{}", teloxide::utils::html::escape(sig)),
        None => text.to_string(),
    }
}
