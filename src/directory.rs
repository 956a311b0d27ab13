use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::RequestError;

/// One chat administrator, reduced to what the replies display.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminEntry {
    pub user_id: u64,
    pub full_name: String,
    pub is_owner: bool,
    pub is_bot: bool,
}

/// Chat lookups that need a round-trip to the Bot API.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    async fn member_count(&self, chat_id: ChatId) -> Result<u32, RequestError>;

    async fn administrators(&self, chat_id: ChatId) -> Result<Vec<AdminEntry>, RequestError>;
}

#[async_trait]
impl ChatDirectory for Bot {
    async fn member_count(&self, chat_id: ChatId) -> Result<u32, RequestError> {
        self.get_chat_member_count(chat_id).await
    }

    async fn administrators(&self, chat_id: ChatId) -> Result<Vec<AdminEntry>, RequestError> {
        let members = self.get_chat_administrators(chat_id).await?;
        Ok(members
            .into_iter()
            .map(|member| AdminEntry {
                user_id: member.user.id.0,
                full_name: member.user.full_name(),
                is_owner: member.is_owner(),
                is_bot: member.user.is_bot,
            })
            .collect())
    }
}
