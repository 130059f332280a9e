// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Conversion of a simple chatbot transcript into the interaction service
//! payloads used to replay it: the establish-conversation request and the
//! conversation-history request.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionState;

/// The history endpoint accepts at most this many entries per request.
pub const MAX_HISTORY_ENTRIES: usize = 5;

const END_USER: &str = "EndUser";
const CHATBOT: &str = "Chatbot";
const CUSTOM_APP: &str = "custom";
const MESSAGING_APP: &str = "iamessage";

/// Transcript posted by the caller.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ConversationHistory {
    #[serde(default)]
    pub participants: Vec<HistoryParticipant>,

    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParticipant {
    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub app_type: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,
}

impl HistoryParticipant {
    fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(END_USER)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HistoryMessage {
    /// `bot` for chatbot messages, anything else is the end user
    #[serde(default)]
    pub sender: Option<String>,

    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRef {
    pub subject: String,
    pub role: String,
    pub app_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstablishRequest {
    pub channel_address_identifier: String,
    pub participants: Vec<ParticipantRef>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StaticContent {
    pub format_type: &'static str,
    pub text: String,
}

impl StaticContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            format_type: "Text",
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbstractMessage {
    pub message_type: &'static str,
    pub id: String,
    pub static_content: StaticContent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    pub entry_type: &'static str,
    pub id: String,
    pub abstract_message: AbstractMessage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub client_timestamp: String,
    pub entry_payload: EntryPayload,
    pub sender: ParticipantRef,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParticipant {
    pub display_name: String,
    pub participant: ParticipantRef,
    pub joined_time: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub start_time: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagingSession {
    pub messaging_session_request_type: &'static str,
    pub payload: SessionPayload,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub channel_address_identifier: String,
    pub conversation_participants: Vec<ConversationParticipant>,
    pub conversation_entries: Vec<ConversationEntry>,
    pub messaging_session: MessagingSession,
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Channel address for replayed history: the address reported when the
/// conversation was created, else the lower-cased conversation id, else a
/// fresh random one.
pub fn channel_address(state: &SessionState) -> String {
    if let Some(address) = &state.channel_address_identifier {
        return address.clone();
    }
    match &state.conversation_id {
        Some(id) => id.to_lowercase(),
        None => Uuid::new_v4().to_string(),
    }
}

pub fn establish_request(channel_address: &str, history: &ConversationHistory) -> EstablishRequest {
    let participants = history
        .participants
        .iter()
        .map(|p| ParticipantRef {
            subject: p.subject.clone(),
            role: p.role().to_string(),
            app_type: p.app_type.clone().unwrap_or_else(|| CUSTOM_APP.to_string()),
        })
        .collect();

    EstablishRequest {
        channel_address_identifier: channel_address.to_string(),
        participants,
    }
}

/// Build the history payload. Only the first [`MAX_HISTORY_ENTRIES`]
/// messages are kept and they are sent newest first. All timestamps are
/// `now_ms`, since the endpoint rejects timestamps in the past of the
/// messaging session.
pub fn history_request(
    channel_address: &str,
    history: &ConversationHistory,
    now_ms: u64,
) -> HistoryRequest {
    let now = now_ms.to_string();

    let conversation_participants = history
        .participants
        .iter()
        .map(|p| {
            let role = p.role();
            let app_type = if role == END_USER {
                MESSAGING_APP.to_string()
            } else {
                p.app_type.clone().unwrap_or_else(|| CUSTOM_APP.to_string())
            };

            ConversationParticipant {
                display_name: p
                    .display_name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                participant: ParticipantRef {
                    subject: p.subject.clone(),
                    role: role.to_string(),
                    app_type,
                },
                joined_time: now.clone(),
            }
        })
        .collect();

    let conversation_entries = history
        .messages
        .iter()
        .take(MAX_HISTORY_ENTRIES)
        .rev()
        .map(|msg| {
            let id = Uuid::new_v4().to_string();
            ConversationEntry {
                client_timestamp: now.clone(),
                entry_payload: EntryPayload {
                    entry_type: "Message",
                    id: id.clone(),
                    abstract_message: AbstractMessage {
                        message_type: "StaticContentMessage",
                        id,
                        static_content: StaticContent::text(msg.text.clone()),
                    },
                },
                sender: sender_of(msg, &history.participants),
            }
        })
        .collect();

    HistoryRequest {
        channel_address_identifier: channel_address.to_string(),
        conversation_participants,
        conversation_entries,
        messaging_session: MessagingSession {
            messaging_session_request_type: "EstablishMessagingSession",
            payload: SessionPayload { start_time: now },
        },
    }
}

fn sender_of(msg: &HistoryMessage, participants: &[HistoryParticipant]) -> ParticipantRef {
    if msg.sender.as_deref() == Some("bot") {
        let bot = participants.iter().find(|p| p.role() == CHATBOT);
        ParticipantRef {
            subject: bot.map(|p| p.subject.clone()).unwrap_or_default(),
            role: CHATBOT.to_string(),
            app_type: bot
                .and_then(|p| p.app_type.clone())
                .unwrap_or_else(|| CUSTOM_APP.to_string()),
        }
    } else {
        let user = participants.iter().find(|p| p.role() == END_USER);
        ParticipantRef {
            subject: user.map(|p| p.subject.clone()).unwrap_or_default(),
            role: END_USER.to_string(),
            app_type: MESSAGING_APP.to_string(),
        }
    }
}
