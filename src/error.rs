use teloxide::RequestError;
use thiserror::Error;

/// A command that cannot be answered normally. The `Display` text is sent
/// back to the user as the reply.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("⚠️ Could Not Identify The Sender Of This Message")]
    NoSender,

    #[error("⚠️ This Command Only Works In SuperGroups With Topics Enabled.")]
    NotInGroup,

    #[error("⚠️ This Chat Has No Topic ID (Not In A Thread).")]
    NotInTopic,

    #[error("⚠️ Admins Can Only Be Listed In Groups And Channels.")]
    PrivateChat,

    #[error("⚠️ Reply To A Sticker/Photo/Document/Video To Get Its File ID")]
    NoRepliedMedia,

    #[error("⚠️ Could Not Fetch Member Count\n{0}")]
    MemberCount(#[source] RequestError),

    #[error("⚠️ Could Not Fetch Admins\n{0}")]
    Admins(#[source] RequestError),

    #[error("⚠️ Could Not Build The Export File\n{0}")]
    Export(#[from] serde_json::Error),
}

impl CommandError {
    /// Short machine label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::NoSender => "no_sender",
            CommandError::NotInGroup => "not_in_group",
            CommandError::NotInTopic => "not_in_topic",
            CommandError::PrivateChat => "private_chat",
            CommandError::NoRepliedMedia => "no_replied_media",
            CommandError::MemberCount(_) => "member_count",
            CommandError::Admins(_) => "admins",
            CommandError::Export(_) => "export",
        }
    }
}
