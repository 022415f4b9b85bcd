//! [`Notifier`] backed by Discord's REST API.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{ChannelId, Http, MessageId, UserId};
use tracing::debug;

use crate::bot::render;
use crate::errors::{MarketError, Result};
use crate::notify::{MessageRef, Notice, Notifier, Target};

pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        DiscordNotifier { http }
    }

    async fn resolve_channel(&self, target: &Target) -> Result<ChannelId> {
        match target {
            Target::Channel(id) => Ok(ChannelId::new(snowflake(*id)?)),
            Target::User(raw) => {
                let id = raw
                    .parse::<u64>()
                    .map_err(|_| MarketError::Delivery(format!("invalid user id {raw:?}")))?;
                let dm = UserId::new(snowflake(id)?)
                    .create_dm_channel(&self.http)
                    .await?;
                Ok(dm.id)
            }
        }
    }
}

/// Serenity ids panic on zero, so reject it before constructing one.
fn snowflake(id: u64) -> Result<u64> {
    if id == 0 {
        return Err(MarketError::Delivery("id 0 is not a valid snowflake".into()));
    }
    Ok(id)
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, target: &Target, notice: &Notice) -> Result<MessageRef> {
        let channel = self.resolve_channel(target).await?;
        let message = channel
            .send_message(&self.http, render::notice_message(notice))
            .await?;
        debug!(kind = notice.kind(), channel = %channel, "Notice sent");

        Ok(MessageRef {
            channel_id: message.channel_id.get(),
            message_id: message.id.get(),
        })
    }

    async fn retract(&self, message: &MessageRef) -> Result<()> {
        let channel = ChannelId::new(snowflake(message.channel_id)?);
        let id = MessageId::new(snowflake(message.message_id)?);
        channel.delete_message(&self.http, id).await?;
        Ok(())
    }
}
