//! Core data models used throughout chatdocs.
//!
//! These types represent the sessions and conversation turns that flow
//! through the lifecycle manager, the conversation engine, and the durable
//! store. The serde shapes here are also the durable `session.json` format,
//! so changes are format changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn. Turns alternate starting with `user` and are
/// appended in matched user/assistant pairs per chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Durable per-session metadata record, stored as `session.json` in the
/// session's directory.
///
/// `document_names` preserves upload order and is not deduplicated.
/// `transcript` is append-only during the session's life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub document_names: Vec<String>,
    pub transcript: Vec<Turn>,
    pub updated_at: DateTime<Utc>,
}

/// Returns true when `transcript` is a well-formed sequence of alternating
/// user/assistant turns starting with `user` and ending with `assistant`
/// (i.e. complete pairs).
pub fn transcript_is_well_formed(transcript: &[Turn]) -> bool {
    if transcript.len() % 2 != 0 {
        return false;
    }
    transcript.iter().enumerate().all(|(i, turn)| {
        if i % 2 == 0 {
            turn.role == Role::User
        } else {
            turn.role == Role::Assistant
        }
    })
}
