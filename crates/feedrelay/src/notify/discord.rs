//! Discord notifier using serenity's HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    Channel, ChannelId, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, CreateMessage,
    Timestamp,
};
use serenity::http::Http;
use tracing::{debug, warn};

use crate::render::Message;

use super::{Destination, Notifier, NotifyError};

/// Posts batches as Discord messages with one embed per item.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(bot_token)),
        }
    }
}

fn parse_channel_id(channel_id: &str) -> Result<ChannelId, NotifyError> {
    match channel_id.parse::<u64>() {
        Ok(id) if id != 0 => Ok(ChannelId::new(id)),
        _ => Err(NotifyError::InvalidChannel(channel_id.to_string())),
    }
}

fn to_embed(message: &Message) -> CreateEmbed {
    let mut author = CreateEmbedAuthor::new(&message.author.name).url(&message.author.url);
    if let Some(icon) = &message.author.icon_url {
        author = author.icon_url(icon);
    }

    let mut embed = CreateEmbed::new()
        .title(&message.title)
        .description(&message.description)
        .url(&message.url)
        .colour(message.colour)
        .author(author)
        .footer(CreateEmbedFooter::new(&message.footer));

    if let Ok(timestamp) = Timestamp::from_unix_timestamp(message.timestamp.timestamp()) {
        embed = embed.timestamp(timestamp);
    }
    if let Some(thumbnail) = &message.thumbnail_url {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(image) = &message.image_url {
        embed = embed.image(image);
    }
    embed
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn resolve(&self, channel_id: &str) -> Option<Destination> {
        let channel = parse_channel_id(channel_id).ok()?;

        match channel.to_channel(&self.http).await {
            Ok(Channel::Guild(guild_channel)) => Some(Destination {
                channel_id: channel_id.to_string(),
                name: guild_channel.name.clone(),
                guild_id: Some(guild_channel.guild_id.to_string()),
            }),
            Ok(Channel::Private(private)) => Some(Destination {
                channel_id: channel_id.to_string(),
                name: private.name(),
                guild_id: None,
            }),
            Ok(_) => None,
            Err(e) => {
                debug!(channel_id = %channel_id, error = %e, "Channel lookup failed");
                None
            }
        }
    }

    async fn send(
        &self,
        destination: &Destination,
        summary: &str,
        messages: &[Message],
    ) -> Result<(), NotifyError> {
        let channel = parse_channel_id(&destination.channel_id)?;
        let builder = CreateMessage::new()
            .content(summary)
            .embeds(messages.iter().map(to_embed).collect());

        channel
            .send_message(&self.http, builder)
            .await
            .map_err(|e| {
                warn!(channel_id = %destination.channel_id, error = %e, "Failed to send message");
                NotifyError::Transport(e.to_string())
            })?;
        Ok(())
    }
}
