use async_trait::async_trait;
use serenity::all::{CreateInteractionResponse, CreateInteractionResponseMessage};
use tokio::sync::Mutex;

use supportdesk_core::domain::ids::{ChannelId, UserId};
use supportdesk_core::platform::PlatformError;
use supportdesk_core::registration::RegistrationForm;

use crate::components::{registration_modal, MessageTemplate};
use crate::events::InteractionRef;

/// Initial reply to an interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionResponse {
    Message(MessageTemplate),
    /// Acknowledge now, answer later through follow-ups; only the invoker sees them.
    DeferredEphemeral,
    Modal(RegistrationForm),
}

impl InteractionResponse {
    pub fn to_serenity(&self) -> CreateInteractionResponse {
        match self {
            Self::Message(message) => CreateInteractionResponse::Message(message.to_response()),
            Self::DeferredEphemeral => CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
            Self::Modal(form) => CreateInteractionResponse::Modal(registration_modal(form)),
        }
    }
}

#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: InteractionResponse,
    ) -> Result<(), PlatformError>;

    async fn follow_up(
        &self,
        interaction: &InteractionRef,
        message: MessageTemplate,
    ) -> Result<(), PlatformError>;
}

/// Posting outside of an interaction: channel messages and direct messages.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_to_channel(
        &self,
        channel_id: ChannelId,
        message: MessageTemplate,
    ) -> Result<(), PlatformError>;

    async fn send_direct(&self, user_id: UserId, message: MessageTemplate)
        -> Result<(), PlatformError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Response { interaction_id: u64, response: InteractionResponse },
    FollowUp { interaction_id: u64, message: MessageTemplate },
    Channel { channel_id: ChannelId, message: MessageTemplate },
    Direct { user_id: UserId, message: MessageTemplate },
}

/// Records every outbound message instead of sending it.
#[derive(Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<Outbound>>,
    closed_dms: Mutex<Vec<UserId>>,
    closed_channels: Mutex<Vec<ChannelId>>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct messages to `user_id` fail as if the member disabled them.
    pub async fn close_direct_messages(&self, user_id: UserId) {
        self.closed_dms.lock().await.push(user_id);
    }

    /// Posts to `channel_id` fail as if the bot lost send permission there.
    pub async fn close_channel(&self, channel_id: ChannelId) {
        self.closed_channels.lock().await.push(channel_id);
    }

    pub async fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().await.clone()
    }

    pub async fn follow_up_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|outbound| match outbound {
                Outbound::FollowUp { message, .. } => Some(message.content.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl InteractionResponder for RecordingOutbound {
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: InteractionResponse,
    ) -> Result<(), PlatformError> {
        self.sent
            .lock()
            .await
            .push(Outbound::Response { interaction_id: interaction.id, response });
        Ok(())
    }

    async fn follow_up(
        &self,
        interaction: &InteractionRef,
        message: MessageTemplate,
    ) -> Result<(), PlatformError> {
        self.sent
            .lock()
            .await
            .push(Outbound::FollowUp { interaction_id: interaction.id, message });
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingOutbound {
    async fn send_to_channel(
        &self,
        channel_id: ChannelId,
        message: MessageTemplate,
    ) -> Result<(), PlatformError> {
        if self.closed_channels.lock().await.contains(&channel_id) {
            return Err(PlatformError::PermissionDenied(format!(
                "missing access to channel {channel_id}"
            )));
        }
        self.sent.lock().await.push(Outbound::Channel { channel_id, message });
        Ok(())
    }

    async fn send_direct(
        &self,
        user_id: UserId,
        message: MessageTemplate,
    ) -> Result<(), PlatformError> {
        if self.closed_dms.lock().await.contains(&user_id) {
            return Err(PlatformError::PermissionDenied(format!(
                "cannot send messages to user {user_id}"
            )));
        }
        self.sent.lock().await.push(Outbound::Direct { user_id, message });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InteractionResponse, Messenger, Outbound, RecordingOutbound};
    use crate::components::ephemeral_message;
    use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};
    use supportdesk_core::registration::RegistrationForm;

    #[test]
    fn deferred_response_is_ephemeral() {
        let body = serde_json::to_value(InteractionResponse::DeferredEphemeral.to_serenity())
            .expect("serialize");
        assert_eq!(body["type"], 5);
        assert_eq!(body["data"]["flags"], 64);
    }

    #[test]
    fn message_and_modal_responses_use_callback_types() {
        let message = serde_json::to_value(
            InteractionResponse::Message(ephemeral_message("done")).to_serenity(),
        )
        .expect("serialize");
        assert_eq!(message["type"], 4);
        assert_eq!(message["data"]["content"], "done");

        let modal = serde_json::to_value(
            InteractionResponse::Modal(RegistrationForm::for_guild(GuildId(3))).to_serenity(),
        )
        .expect("serialize");
        assert_eq!(modal["type"], 9);
        assert_eq!(modal["data"]["title"], "Register");
    }

    #[tokio::test]
    async fn recording_outbound_refuses_closed_direct_messages() {
        let outbound = RecordingOutbound::new();
        outbound.close_direct_messages(UserId(9)).await;

        assert!(outbound.send_direct(UserId(9), ephemeral_message("hi")).await.is_err());
        outbound.send_direct(UserId(10), ephemeral_message("hi")).await.expect("send");

        assert_eq!(
            outbound.sent().await,
            vec![Outbound::Direct { user_id: UserId(10), message: ephemeral_message("hi") }]
        );
    }

    #[tokio::test]
    async fn recording_outbound_refuses_closed_channels() {
        let outbound = RecordingOutbound::new();
        outbound.close_channel(ChannelId(4)).await;

        let error = outbound.send_to_channel(ChannelId(4), ephemeral_message("hi")).await;

        assert!(error.is_err_and(|error| error.is_permission_denied()));
        assert!(outbound.sent().await.is_empty());
    }
}
