//! Activity wire format and typed activity set
//!
//! The wire envelope is a JSON object with `type`, `actor`, `object`,
//! `published`, and a detached `signature`. The signature covers the
//! canonical serialization of the envelope without the signature member
//! (serde_json serializes map keys in sorted order, so both sides agree
//! on the bytes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{self, EncryptedPayload};
use crate::data::split_address;
use crate::error::AppError;

/// Media type for activity payloads
pub const ACTIVITY_CONTENT_TYPE: &str = "application/activity+json";

/// Default reaction recorded for a Like with no explicit reaction
pub const DEFAULT_REACTION: &str = "❤️";

/// Raw activity envelope as it travels on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEnvelope {
    /// Activity type token (or protocol alias, see [`Activity::parse`])
    #[serde(rename = "type")]
    pub kind: String,
    /// Federated address of the acting identity (`user@domain`)
    pub actor: String,
    /// Activity-dependent payload
    #[serde(default)]
    pub object: Value,
    /// Detached signature over the canonical envelope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub published: DateTime<Utc>,
}

impl ActivityEnvelope {
    /// Canonical bytes covered by the signature
    ///
    /// The envelope without its `signature` member, re-serialized from
    /// parsed values so that formatting differences on the wire do not
    /// affect verification.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, AppError> {
        let canonical = serde_json::json!({
            "type": self.kind,
            "actor": self.actor,
            "object": self.object,
            "published": self.published,
        });

        serde_json::to_vec(&canonical)
            .map_err(|e| AppError::Validation(format!("Failed to serialize activity: {}", e)))
    }

    /// Sign the envelope with a private key, attaching the signature
    pub fn sign_with(&mut self, private_key_pem: &str) -> Result<(), AppError> {
        let bytes = self.signing_bytes()?;
        self.signature = Some(crypto::sign(&bytes, private_key_pem)?);
        Ok(())
    }

    /// Verify the attached signature against a public key
    ///
    /// Missing signature or any verification failure returns `false`.
    pub fn verify_with(&self, public_key_pem: &str) -> bool {
        let Some(signature) = &self.signature else {
            return false;
        };
        let Ok(bytes) = self.signing_bytes() else {
            return false;
        };

        crypto::verify(&bytes, signature, public_key_pem)
    }

    /// Domain part of the actor address
    pub fn actor_domain(&self) -> Result<&str, AppError> {
        split_address(&self.actor)
            .map(|(_, domain)| domain)
            .ok_or_else(|| {
                AppError::Validation(format!("Invalid actor address: {}", self.actor))
            })
    }
}

/// Encrypted direct-message payload carried by a Message activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub payload: EncryptedPayload,
}

/// The closed set of activities the engine processes
///
/// Parsed from the wire envelope; dispatch over this enum is exhaustive,
/// so adding a variant forces every handler site to be updated.
#[derive(Debug, Clone, PartialEq)]
pub enum Activity {
    Follow {
        target: String,
    },
    Block {
        target: String,
    },
    Like {
        content_id: String,
        reaction: String,
    },
    Unlike {
        content_id: String,
    },
    Comment {
        content_id: String,
        body: String,
        parent_comment_id: Option<String>,
    },
    Quote {
        content_id: String,
        body: String,
    },
    Repost {
        content_id: String,
        note: Option<String>,
    },
    Thread {
        title: String,
        descriptor: Value,
    },
    Message {
        message: MessagePayload,
    },
}

/// Object reference: either a bare string or `{"id": ...}`
fn object_id(object: &Value) -> Option<String> {
    object
        .as_str()
        .or_else(|| object.get("id").and_then(Value::as_str))
        .map(str::to_string)
}

fn required_str(object: &Value, key: &str, context: &str) -> Result<String, AppError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("Missing {} in {}", key, context)))
}

fn parse_comment(object: &Value) -> Result<Activity, AppError> {
    Ok(Activity::Comment {
        content_id: required_str(object, "inReplyTo", "Comment")?,
        body: required_str(object, "content", "Comment")?,
        parent_comment_id: object
            .get("parentComment")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_quote(object: &Value) -> Result<Activity, AppError> {
    Ok(Activity::Quote {
        content_id: required_str(object, "quoteOf", "Quote")?,
        body: required_str(object, "content", "Quote")?,
    })
}

fn parse_thread(object: &Value) -> Result<Activity, AppError> {
    let declared = object.get("type").and_then(Value::as_str).unwrap_or("");
    if !declared.eq_ignore_ascii_case("Thread") {
        return Err(AppError::Validation(
            "Thread object must declare type Thread".to_string(),
        ));
    }

    let title = required_str(object, "title", "Thread")?;
    if title.trim().is_empty() {
        return Err(AppError::Validation(
            "Thread title must not be empty".to_string(),
        ));
    }

    Ok(Activity::Thread {
        title,
        descriptor: object.clone(),
    })
}

impl Activity {
    /// Parse a wire type token and object into a typed activity
    ///
    /// Protocol aliases are accepted: `Undo` for Unlike, `Announce` for
    /// Repost, and `Create` for Comment/Quote/Thread (disambiguated by
    /// the object shape). Unknown tokens are rejected as unsupported;
    /// recognized tokens with malformed objects are validation errors.
    pub fn parse(kind: &str, object: &Value) -> Result<Self, AppError> {
        match kind {
            "Follow" => object_id(object)
                .map(|target| Activity::Follow { target })
                .ok_or_else(|| AppError::Validation("Missing object in Follow".to_string())),
            "Block" => object_id(object)
                .map(|target| Activity::Block { target })
                .ok_or_else(|| AppError::Validation("Missing object in Block".to_string())),
            "Like" => {
                let content_id = object_id(object)
                    .ok_or_else(|| AppError::Validation("Missing object in Like".to_string()))?;
                let reaction = object
                    .get("reaction")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_REACTION)
                    .to_string();
                Ok(Activity::Like {
                    content_id,
                    reaction,
                })
            }
            "Unlike" | "Undo" => object_id(object)
                .map(|content_id| Activity::Unlike { content_id })
                .ok_or_else(|| AppError::Validation("Missing object in Unlike".to_string())),
            "Comment" => parse_comment(object),
            "Quote" => parse_quote(object),
            "Repost" | "Announce" => {
                let content_id = object_id(object)
                    .ok_or_else(|| AppError::Validation("Missing object in Repost".to_string()))?;
                let note = object
                    .get("content")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Ok(Activity::Repost { content_id, note })
            }
            "Thread" => parse_thread(object),
            "Message" => {
                let message: MessagePayload = serde_json::from_value(object.clone())
                    .map_err(|e| AppError::Validation(format!("Invalid Message object: {}", e)))?;
                Ok(Activity::Message { message })
            }
            "Create" => {
                if object
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.eq_ignore_ascii_case("Thread"))
                {
                    parse_thread(object)
                } else if object.get("inReplyTo").is_some() {
                    parse_comment(object)
                } else if object.get("quoteOf").is_some() {
                    parse_quote(object)
                } else {
                    Err(AppError::UnsupportedActivityType("Create".to_string()))
                }
            }
            other => Err(AppError::UnsupportedActivityType(other.to_string())),
        }
    }
}

/// Build activity envelopes for outbound delivery
pub mod builder {
    use super::*;

    fn envelope(kind: &str, actor: &str, object: Value) -> ActivityEnvelope {
        ActivityEnvelope {
            kind: kind.to_string(),
            actor: actor.to_string(),
            object,
            signature: None,
            published: Utc::now(),
        }
    }

    /// Build a Follow activity
    pub fn follow(actor: &str, target: &str) -> ActivityEnvelope {
        envelope("Follow", actor, Value::String(target.to_string()))
    }

    /// Build a Block activity
    pub fn block(actor: &str, target: &str) -> ActivityEnvelope {
        envelope("Block", actor, Value::String(target.to_string()))
    }

    /// Build a Like activity
    pub fn like(actor: &str, content_id: &str, reaction: Option<&str>) -> ActivityEnvelope {
        envelope(
            "Like",
            actor,
            serde_json::json!({
                "id": content_id,
                "reaction": reaction.unwrap_or(DEFAULT_REACTION),
            }),
        )
    }

    /// Build an Unlike (Undo) activity
    pub fn unlike(actor: &str, content_id: &str) -> ActivityEnvelope {
        envelope("Unlike", actor, Value::String(content_id.to_string()))
    }

    /// Build a Comment activity
    pub fn comment(actor: &str, content_id: &str, body: &str) -> ActivityEnvelope {
        envelope(
            "Comment",
            actor,
            serde_json::json!({
                "inReplyTo": content_id,
                "content": body,
            }),
        )
    }

    /// Build a Quote activity
    pub fn quote(actor: &str, content_id: &str, body: &str) -> ActivityEnvelope {
        envelope(
            "Quote",
            actor,
            serde_json::json!({
                "quoteOf": content_id,
                "content": body,
            }),
        )
    }

    /// Build a Repost (Announce) activity
    pub fn repost(actor: &str, content_id: &str, note: Option<&str>) -> ActivityEnvelope {
        let mut object = serde_json::Map::new();
        object.insert("id".to_string(), Value::String(content_id.to_string()));
        if let Some(note) = note {
            object.insert("content".to_string(), Value::String(note.to_string()));
        }
        envelope("Repost", actor, Value::Object(object))
    }

    /// Build a Thread activity
    pub fn thread(actor: &str, title: &str, posts: Vec<Value>) -> ActivityEnvelope {
        envelope(
            "Thread",
            actor,
            serde_json::json!({
                "type": "Thread",
                "title": title,
                "posts": posts,
            }),
        )
    }

    /// Build a Message activity carrying an encrypted payload
    pub fn message(actor: &str, message: &MessagePayload) -> ActivityEnvelope {
        envelope(
            "Message",
            actor,
            serde_json::to_value(message).unwrap_or(Value::Null),
        )
    }
}
