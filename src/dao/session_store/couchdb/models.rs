use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    models::{MessageDoc, PublicRoomEntry, RoomCode},
    session_store::couchdb::error::CouchDaoError,
};
use crate::state::room::Room;

pub const ROOM_PREFIX: &str = "room::";
pub const MESSAGE_PREFIX: &str = "msg::";
pub const LOBBY_PREFIX: &str = "lobby::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Body of a successful document PUT, carrying the committed revision.
#[derive(Debug, Deserialize)]
pub struct PutDocResponse {
    pub rev: String,
}

/// Tombstone row sent through `_bulk_docs` to delete a batch of documents.
#[derive(Debug, Serialize)]
pub struct DeletedStub {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<DeletedStub>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub room: Room,
}

impl CouchRoomDocument {
    pub fn new(room: Room, rev: Option<String>) -> Self {
        Self {
            id: room_doc_id(&room.code),
            rev,
            room,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchMessageDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub message: MessageDoc,
}

impl CouchMessageDocument {
    pub fn new(code: &RoomCode, message: MessageDoc) -> Self {
        Self {
            id: message_doc_id(code, message.id),
            rev: None,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchLobbyDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub entry: PublicRoomEntry,
}

impl CouchLobbyDocument {
    pub fn new(entry: PublicRoomEntry, rev: Option<String>) -> Self {
        Self {
            id: lobby_doc_id(&entry.code),
            rev,
            entry,
        }
    }
}

pub fn room_doc_id(code: &RoomCode) -> String {
    format!("{}{}", ROOM_PREFIX, code)
}

pub fn message_doc_id(code: &RoomCode, message_id: Uuid) -> String {
    format!("{}{}::{}", MESSAGE_PREFIX, code, message_id)
}

pub fn message_prefix(code: &RoomCode) -> String {
    format!("{}{}::", MESSAGE_PREFIX, code)
}

pub fn lobby_doc_id(code: &RoomCode) -> String {
    format!("{}{}", LOBBY_PREFIX, code)
}

/// Recover the room code from a `room::` document id.
pub fn extract_room_code(doc_id: &str) -> Result<RoomCode, CouchDaoError> {
    let code = doc_id
        .strip_prefix(ROOM_PREFIX)
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing room prefix",
        })?;

    if code.is_empty() {
        return Err(CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "empty room code",
        });
    }

    Ok(RoomCode::new(code))
}
