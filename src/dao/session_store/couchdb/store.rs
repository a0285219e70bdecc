use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{MessageDoc, MessageKind, PublicRoomEntry, RoomCode},
    session_store::{IndexSignal, Revision, RoomSignal, SessionStore, SwapOutcome},
    storage::StoreResult,
};
use crate::state::room::Room;

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, BulkDocsRequest, CouchLobbyDocument, CouchMessageDocument,
        CouchRoomDocument, DeletedStub, END_SUFFIX, LOBBY_PREFIX, PutDocResponse, ROOM_PREFIX,
        extract_room_code, lobby_doc_id, message_prefix, room_doc_id,
    },
};

/// Signals buffered per subscriber before lagging kicks in.
const SIGNAL_BUFFER: usize = 64;
/// Attempts for internal read-modify-write loops (reactions, index refresh).
const RMW_ATTEMPTS: u32 = 5;

/// Result of a revisioned document PUT.
enum PutStatus {
    Stored(String),
    Conflict,
}

/// CouchDB-backed [`SessionStore`]. Rooms, messages, and lobby entries are
/// separate documents; the MVCC `_rev` of the room document is the swap
/// revision. Change signals are process-local: subscribers must talk to the
/// node that performed the write.
#[derive(Clone)]
pub struct CouchSessionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    room_signals: Arc<DashMap<RoomCode, broadcast::Sender<RoomSignal>>>,
    index_signals: broadcast::Sender<IndexSignal>,
    skew_ms: Arc<AtomicI64>,
}

impl CouchSessionStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));
        let (index_signals, _) = broadcast::channel(SIGNAL_BUFFER);

        let store = Self {
            client,
            base_url,
            database,
            auth,
            room_signals: Arc::new(DashMap::new()),
            index_signals,
            skew_ms: Arc::new(AtomicI64::new(0)),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn signal(&self, code: &RoomCode, signal: RoomSignal) {
        if let Some(sender) = self.room_signals.get(code) {
            let _ = sender.send(signal);
        }
    }

    fn signal_index(&self) {
        let _ = self.index_signals.send(IndexSignal::Changed);
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);
        let mut builder = self.client.get(&url);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let mut builder = self.client.put(&url);
                if let Some((ref user, ref pass)) = self.auth {
                    builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
                }
                let create =
                    builder
                        .send()
                        .await
                        .map_err(|source| CouchDaoError::DatabaseCreate {
                            database: database.clone(),
                            source,
                        })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document, reporting a revision conflict as an outcome rather
    /// than an error so callers can drive their retry loops.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<PutStatus>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutStatus::Conflict),
            status if status.is_success() => {
                let body = response.json::<PutDocResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                Ok(PutStatus::Stored(body.rev))
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// DELETE a single document. A 404 means somebody else already removed
    /// it, which is fine for every caller here.
    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<()> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn bulk_delete(&self, stubs: Vec<DeletedStub>) -> CouchResult<()> {
        if stubs.is_empty() {
            return Ok(());
        }

        const BULK_DOCS: &str = "_bulk_docs";
        let response = self
            .request(Method::POST, BULK_DOCS)
            .json(&BulkDocsRequest { docs: stubs })
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            })
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn list_document_ids(&self, prefix: &str) -> CouchResult<Vec<String>> {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        Ok(payload.rows.into_iter().map(|row| row.id).collect())
    }
}

impl SessionStore for CouchSessionStore {
    fn insert_room(&self, room: Room) -> BoxFuture<'static, StoreResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let code = room.code.clone();
            let doc_id = room_doc_id(&code);
            let doc = CouchRoomDocument::new(room, None);
            match store.put_document(&doc_id, &doc).await? {
                PutStatus::Stored(rev) => {
                    store.signal(&code, RoomSignal::Changed);
                    Ok(SwapOutcome::Committed(Revision(rev)))
                }
                PutStatus::Conflict => Ok(SwapOutcome::Conflict),
            }
        })
    }

    fn read_room(
        &self,
        code: &RoomCode,
    ) -> BoxFuture<'static, StoreResult<Option<(Revision, Room)>>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let maybe_doc = store
                .get_document::<CouchRoomDocument>(&room_doc_id(&code))
                .await?;
            Ok(maybe_doc.map(|doc| (Revision(doc.rev.unwrap_or_default()), doc.room)))
        })
    }

    fn swap_room(
        &self,
        code: &RoomCode,
        expected: Revision,
        room: Room,
    ) -> BoxFuture<'static, StoreResult<SwapOutcome>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let doc_id = room_doc_id(&code);
            let doc = CouchRoomDocument::new(room, Some(expected.0));
            match store.put_document(&doc_id, &doc).await? {
                PutStatus::Stored(rev) => {
                    store.signal(&code, RoomSignal::Changed);
                    Ok(SwapOutcome::Committed(Revision(rev)))
                }
                PutStatus::Conflict => {
                    // A conflict against a deleted document and one against a
                    // newer revision look the same to CouchDB.
                    let exists = store
                        .get_document::<CouchRoomDocument>(&doc_id)
                        .await?
                        .is_some();
                    if exists {
                        Ok(SwapOutcome::Conflict)
                    } else {
                        Ok(SwapOutcome::Missing)
                    }
                }
            }
        })
    }

    fn delete_room(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let doc_id = room_doc_id(&code);
            if let Some(doc) = store.get_document::<CouchRoomDocument>(&doc_id).await? {
                if let Some(rev) = doc.rev {
                    store.delete_document(&doc_id, &rev).await?;
                }
            }

            let messages = store
                .list_documents::<CouchMessageDocument>(&message_prefix(&code))
                .await?;
            let stubs = messages
                .into_iter()
                .filter_map(|doc| {
                    doc.rev.map(|rev| DeletedStub {
                        id: doc.id,
                        rev,
                        deleted: true,
                    })
                })
                .collect();
            store.bulk_delete(stubs).await?;

            let lobby_id = lobby_doc_id(&code);
            if let Some(doc) = store.get_document::<CouchLobbyDocument>(&lobby_id).await? {
                if let Some(rev) = doc.rev {
                    store.delete_document(&lobby_id, &rev).await?;
                    store.signal_index();
                }
            }

            store.signal(&code, RoomSignal::Deleted);
            store.room_signals.remove(&code);
            Ok(())
        })
    }

    fn list_room_codes(&self) -> BoxFuture<'static, StoreResult<Vec<RoomCode>>> {
        let store = self.clone();
        Box::pin(async move {
            let ids = store.list_document_ids(ROOM_PREFIX).await?;
            let mut codes = Vec::with_capacity(ids.len());
            for id in ids {
                codes.push(extract_room_code(&id)?);
            }
            Ok(codes)
        })
    }

    fn append_message(
        &self,
        code: &RoomCode,
        message: MessageDoc,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let doc = CouchMessageDocument::new(&code, message.clone());
            let doc_id = doc.id.clone();
            match store.put_document(&doc_id, &doc).await? {
                PutStatus::Stored(_) => {
                    store.signal(&code, RoomSignal::MessageAppended(message));
                    Ok(())
                }
                // Message ids are fresh v4 uuids; a conflict means this exact
                // write already landed.
                PutStatus::Conflict => Ok(()),
            }
        })
    }

    fn list_messages(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<Vec<MessageDoc>>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchMessageDocument>(&message_prefix(&code))
                .await?;
            let mut messages: Vec<MessageDoc> =
                docs.into_iter().map(|doc| doc.message).collect();
            // _all_docs orders by document id (a uuid), not send time.
            messages.sort_by_key(|m| m.sent_at);
            Ok(messages)
        })
    }

    fn remove_messages(
        &self,
        code: &RoomCode,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchMessageDocument>(&message_prefix(&code))
                .await?;
            let mut removed = Vec::new();
            let mut stubs = Vec::new();
            for doc in docs {
                if ids.contains(&doc.message.id) {
                    if let Some(rev) = doc.rev {
                        removed.push(doc.message.id);
                        stubs.push(DeletedStub {
                            id: doc.id,
                            rev,
                            deleted: true,
                        });
                    }
                }
            }
            store.bulk_delete(stubs).await?;
            if !removed.is_empty() {
                store.signal(&code, RoomSignal::MessagesRemoved(removed));
            }
            Ok(())
        })
    }

    fn remove_messages_of_kinds(
        &self,
        code: &RoomCode,
        kinds: Vec<MessageKind>,
    ) -> BoxFuture<'static, StoreResult<Vec<Uuid>>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchMessageDocument>(&message_prefix(&code))
                .await?;
            let mut removed = Vec::new();
            let mut stubs = Vec::new();
            for doc in docs {
                if kinds.contains(&doc.message.kind) {
                    if let Some(rev) = doc.rev {
                        removed.push(doc.message.id);
                        stubs.push(DeletedStub {
                            id: doc.id,
                            rev,
                            deleted: true,
                        });
                    }
                }
            }
            store.bulk_delete(stubs).await?;
            if !removed.is_empty() {
                store.signal(&code, RoomSignal::MessagesRemoved(removed.clone()));
            }
            Ok(removed)
        })
    }

    fn set_reaction(
        &self,
        code: &RoomCode,
        message_id: Uuid,
        emoji: String,
        player_id: Uuid,
        present: bool,
    ) -> BoxFuture<'static, StoreResult<bool>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let doc_id = super::models::message_doc_id(&code, message_id);
            for _ in 0..RMW_ATTEMPTS {
                let Some(mut doc) = store.get_document::<CouchMessageDocument>(&doc_id).await?
                else {
                    return Ok(false);
                };

                if present {
                    doc.message
                        .reactions
                        .entry(emoji.clone())
                        .or_default()
                        .insert(player_id);
                } else if let Some(reactors) = doc.message.reactions.get_mut(&emoji) {
                    reactors.remove(&player_id);
                    if reactors.is_empty() {
                        doc.message.reactions.remove(&emoji);
                    }
                }

                match store.put_document(&doc_id, &doc).await? {
                    PutStatus::Stored(_) => {
                        store.signal(&code, RoomSignal::MessageUpdated(doc.message));
                        return Ok(true);
                    }
                    PutStatus::Conflict => continue,
                }
            }

            Err(CouchDaoError::WriteContention { doc_id }.into())
        })
    }

    fn put_index_entry(&self, entry: PublicRoomEntry) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = lobby_doc_id(&entry.code);
            for _ in 0..RMW_ATTEMPTS {
                let rev = store
                    .get_document::<CouchLobbyDocument>(&doc_id)
                    .await?
                    .and_then(|doc| doc.rev);
                let doc = CouchLobbyDocument::new(entry.clone(), rev);
                match store.put_document(&doc_id, &doc).await? {
                    PutStatus::Stored(_) => {
                        store.signal_index();
                        return Ok(());
                    }
                    PutStatus::Conflict => continue,
                }
            }

            Err(CouchDaoError::WriteContention { doc_id }.into())
        })
    }

    fn delete_index_entry(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let doc_id = lobby_doc_id(&code);
            if let Some(doc) = store.get_document::<CouchLobbyDocument>(&doc_id).await? {
                if let Some(rev) = doc.rev {
                    store.delete_document(&doc_id, &rev).await?;
                    store.signal_index();
                }
            }
            Ok(())
        })
    }

    fn list_index_entries(&self) -> BoxFuture<'static, StoreResult<Vec<PublicRoomEntry>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchLobbyDocument>(LOBBY_PREFIX)
                .await?;
            Ok(docs.into_iter().map(|doc| doc.entry).collect())
        })
    }

    fn subscribe_room(&self, code: &RoomCode) -> broadcast::Receiver<RoomSignal> {
        self.room_signals
            .entry(code.clone())
            .or_insert_with(|| broadcast::channel(SIGNAL_BUFFER).0)
            .subscribe()
    }

    fn subscribe_index(&self) -> broadcast::Receiver<IndexSignal> {
        self.index_signals.subscribe()
    }

    fn now_ms(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        wall.saturating_add(self.skew_ms.load(Ordering::Relaxed))
            .max(0) as u64
    }

    fn set_clock_skew(&self, offset_ms: i64) {
        self.skew_ms.store(offset_ms, Ordering::Relaxed);
    }

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let mut builder = store.client.get(&url);
            if let Some((ref user, ref pass)) = store.auth {
                builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
            }

            let response = builder
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
