//! Wire protocol for the dialogue service
//!
//! Every frame is a JSON object `{"event": <tag>, "data": <payload>}`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Envelope {
    /// Session authentication, sent once right after connecting
    Auth(AuthPayload),
    /// User turn
    Message(MessagePayload),
    /// Character reply
    MessageResponse(ReplyPayload),
}

/// Credentials and identity carried by `auth`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub appkey: String,
    pub token: String,
    pub version_id: String,
    pub user_id: String,
    pub username: String,
    pub character_id: String,
}

/// Body of a `message` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub content: String,
    pub character_id: String,
}

/// Body of a `message_response` envelope
///
/// The service omits fields it has nothing for, so all of them default to
/// the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyPayload {
    /// Action cue to play alongside the answer
    pub action: String,
    /// Pre-rendered audio, unused by this client
    pub audio_url: String,
    /// Answer text
    pub answer: String,
    /// Emotion category for synthesis
    pub emotion: String,
}

impl Envelope {
    /// Build an `auth` envelope
    #[must_use]
    pub const fn auth(payload: AuthPayload) -> Self {
        Self::Auth(payload)
    }

    /// Build a `message` envelope
    #[must_use]
    pub fn message(content: impl Into<String>, character_id: impl Into<String>) -> Self {
        Self::Message(MessagePayload {
            content: content.into(),
            character_id: character_id.into(),
        })
    }

    /// Wire tag of this envelope
    #[must_use]
    pub const fn event(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Message(_) => "message",
            Self::MessageResponse(_) => "message_response",
        }
    }

    /// Serialize to a text frame
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a text frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for malformed JSON or an unknown event tag
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Protocol(e.to_string()))
    }
}

/// Parse an inbound frame that must be a character reply
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the frame is malformed or carries an
/// outbound-only event
pub fn parse_reply(text: &str) -> Result<ReplyPayload> {
    match Envelope::parse(text)? {
        Envelope::MessageResponse(reply) => Ok(reply),
        other => Err(Error::Protocol(format!(
            "unexpected inbound event: {}",
            other.event()
        ))),
    }
}

/// Who produced an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Character,
}

/// One turn of dialogue as shown in the chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub speaker: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl Utterance {
    /// Utterance typed or spoken by the user
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speaker: Role::User,
            emotion: None,
            action: None,
            timestamp: Local::now(),
        }
    }

    /// Utterance from a character reply
    #[must_use]
    pub fn character(reply: &ReplyPayload) -> Self {
        Self {
            text: reply.answer.clone(),
            speaker: Role::Character,
            emotion: non_empty(&reply.emotion),
            action: non_empty(&reply.action),
            timestamp: Local::now(),
        }
    }

    /// Whether the user produced this utterance
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.speaker == Role::User
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Request to play a visual action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCue {
    pub name: String,
    pub looping: bool,
}

impl ActionCue {
    /// Cue that plays once and reports completion
    #[must_use]
    pub fn once(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            looping: false,
        }
    }

    /// Cue that repeats until replaced
    #[must_use]
    pub fn looping(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            looping: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_uses_wire_field_names() {
        let envelope = Envelope::auth(AuthPayload {
            appkey: "key".to_string(),
            token: "tok".to_string(),
            version_id: "v1".to_string(),
            user_id: "u1".to_string(),
            username: "guest".to_string(),
            character_id: "c1".to_string(),
        });
        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["event"], "auth");
        assert_eq!(value["data"]["appkey"], "key");
        assert_eq!(value["data"]["versionId"], "v1");
        assert_eq!(value["data"]["userId"], "u1");
        assert_eq!(value["data"]["username"], "guest");
        assert_eq!(value["data"]["characterId"], "c1");
    }

    #[test]
    fn message_uses_wire_field_names() {
        let json = Envelope::message("hi \"there\"", "c1").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["event"], "message");
        assert_eq!(value["data"]["content"], "hi \"there\"");
        assert_eq!(value["data"]["characterId"], "c1");
    }

    #[test]
    fn parses_reply_with_missing_fields() {
        let reply =
            parse_reply(r#"{"event":"message_response","data":{"action":"idle_6","answer":"Hello","emotion":"happy"}}"#)
                .unwrap();

        assert_eq!(reply.action, "idle_6");
        assert_eq!(reply.answer, "Hello");
        assert_eq!(reply.emotion, "happy");
        assert!(reply.audio_url.is_empty());
    }

    #[test]
    fn rejects_unknown_event() {
        let err = Envelope::parse(r#"{"event":"ping","data":{}}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn rejects_outbound_event_as_reply() {
        let err = parse_reply(r#"{"event":"message","data":{"content":"x","characterId":"c"}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_reply("not json"), Err(Error::Protocol(_))));
    }

    #[test]
    fn character_utterance_keeps_cue_and_emotion() {
        let reply = ReplyPayload {
            action: "wave".to_string(),
            answer: "Hi".to_string(),
            ..ReplyPayload::default()
        };
        let utterance = Utterance::character(&reply);

        assert_eq!(utterance.speaker, Role::Character);
        assert_eq!(utterance.action.as_deref(), Some("wave"));
        assert_eq!(utterance.emotion, None);
        assert!(!utterance.is_user());
    }
}
