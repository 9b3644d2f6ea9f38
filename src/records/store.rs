//! Durable record store for Updates, MemoryCandidates and Memories
//!
//! Status changes are single conditional writes
//! (`UPDATE ... WHERE id = ? AND status = 'pending'`). Of any number of
//! concurrent callers exactly one observes `Transition::Applied`; the rest,
//! and every call against a missing ID, observe `Transition::NoOp`.

use super::ids::generate_id;
use super::types::*;
use crate::error::{Error, Result};
use crate::storage::{from_millis, to_millis, Database};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

/// Attempts at finding a free ID before giving up
const MAX_ID_ATTEMPTS: usize = 5;

const UPDATE_COLUMNS: &str = "id, kind, target, value, submitted_by, submitted_at, status, source, \
     channel, thread_ref, processed_at, processed_by, edited_at, edited_by, note";

const CANDIDATE_COLUMNS: &str = "id, source, channel, channel_ref, thread_ref, raw_messages_json, \
     extracted_json, submitted_by, submitted_at, status, reviewed_by, reviewed_at";

const MEMORY_COLUMNS: &str = "id, kind, content, context, source, channel, thread_ref, \
     submitted_by, approved_by, created_at, tags_json";

/// Record store backed by SQLite
#[derive(Clone)]
pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    /// Create a store over an opened database
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a store over a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Persist a new pending Update under a fresh ID
    pub async fn create_update(&self, new: NewUpdate) -> Result<Update> {
        let conn = self.db.conn().await;
        let now = Utc::now();

        let id = insert_with_fresh_id(|id| {
            conn.execute(
                "INSERT INTO updates (id, kind, target, value, submitted_by, submitted_at,
                                      status, source, channel, thread_ref)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9)",
                params![
                    id,
                    new.kind.as_str(),
                    new.target,
                    new.value,
                    new.submitted_by,
                    to_millis(now),
                    new.source,
                    new.channel,
                    new.thread_ref,
                ],
            )
        })?;

        tracing::debug!(record_id = %id, kind = %new.kind, "Created update");

        Ok(Update {
            id,
            kind: new.kind,
            target: new.target,
            value: new.value,
            submitted_by: new.submitted_by,
            submitted_at: from_millis(to_millis(now)),
            status: RecordStatus::Pending,
            source: new.source,
            channel: new.channel,
            thread_ref: new.thread_ref,
            processed_at: None,
            processed_by: None,
            edited_at: None,
            edited_by: None,
            note: None,
        })
    }

    /// Get an Update by ID
    pub async fn get_update(&self, id: &str) -> Result<Option<Update>> {
        let conn = self.db.conn().await;
        get_update(&conn, id)
    }

    /// Pending Updates, newest first
    pub async fn list_pending_updates(&self) -> Result<Vec<Update>> {
        let conn = self.db.conn().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {UPDATE_COLUMNS} FROM updates
             WHERE status = 'pending' ORDER BY submitted_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], update_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Move a pending Update to a terminal status
    pub async fn transition_update(
        &self,
        id: &str,
        status: RecordStatus,
        actor: &str,
        note: Option<&str>,
    ) -> Result<Transition> {
        ensure_terminal(status)?;
        let conn = self.db.conn().await;
        let changes = conn.execute(
            "UPDATE updates
             SET status = ?1, processed_at = ?2, processed_by = ?3, note = COALESCE(?4, note)
             WHERE id = ?5 AND status = 'pending'",
            params![status.as_str(), to_millis(Utc::now()), actor, note, id],
        )?;
        Ok(transition_from(changes, id, status))
    }

    /// Replace target and/or value of a pending Update
    pub async fn edit_update(
        &self,
        id: &str,
        target: Option<&str>,
        value: Option<&str>,
        actor: &str,
    ) -> Result<Transition> {
        let conn = self.db.conn().await;
        let changes = conn.execute(
            "UPDATE updates
             SET target = COALESCE(?1, target), value = COALESCE(?2, value),
                 edited_at = ?3, edited_by = ?4
             WHERE id = ?5 AND status = 'pending'",
            params![target, value, to_millis(Utc::now()), actor, id],
        )?;
        Ok(if changes > 0 {
            Transition::Applied
        } else {
            Transition::NoOp
        })
    }

    /// Attach an informational note, whatever the status. Returns whether
    /// the record exists.
    pub async fn set_update_note(&self, id: &str, note: &str) -> Result<bool> {
        let conn = self.db.conn().await;
        let changes = conn.execute(
            "UPDATE updates SET note = ?1 WHERE id = ?2",
            params![note, id],
        )?;
        Ok(changes > 0)
    }

    // =========================================================================
    // Memory candidates
    // =========================================================================

    /// Persist a new pending MemoryCandidate under a fresh ID
    pub async fn create_memory_candidate(
        &self,
        new: NewMemoryCandidate,
    ) -> Result<MemoryCandidate> {
        let raw_json = serde_json::to_string(&new.raw_messages)?;
        let extracted_json = serde_json::to_string(&new.extracted_memories)?;
        let conn = self.db.conn().await;
        let now = Utc::now();

        let id = insert_with_fresh_id(|id| {
            conn.execute(
                "INSERT INTO memory_candidates (id, source, channel, channel_ref, thread_ref,
                     raw_messages_json, extracted_json, submitted_by, submitted_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending')",
                params![
                    id,
                    new.source,
                    new.channel,
                    new.channel_ref,
                    new.thread_ref,
                    raw_json,
                    extracted_json,
                    new.submitted_by,
                    to_millis(now),
                ],
            )
        })?;

        tracing::debug!(
            record_id = %id,
            items = new.extracted_memories.len(),
            "Created memory candidate"
        );

        Ok(MemoryCandidate {
            id,
            source: new.source,
            channel: new.channel,
            channel_ref: new.channel_ref,
            thread_ref: new.thread_ref,
            raw_messages: new.raw_messages,
            extracted_memories: new.extracted_memories,
            submitted_by: new.submitted_by,
            submitted_at: from_millis(to_millis(now)),
            status: RecordStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
        })
    }

    /// Get a MemoryCandidate by ID
    pub async fn get_memory_candidate(&self, id: &str) -> Result<Option<MemoryCandidate>> {
        let conn = self.db.conn().await;
        get_memory_candidate(&conn, id)
    }

    /// Pending MemoryCandidates, newest first
    pub async fn list_pending_memory_candidates(&self) -> Result<Vec<MemoryCandidate>> {
        let conn = self.db.conn().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM memory_candidates
             WHERE status = 'pending' ORDER BY submitted_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], candidate_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Move a pending MemoryCandidate to a terminal status without
    /// materializing memories (rejection path)
    pub async fn transition_memory_candidate(
        &self,
        id: &str,
        status: RecordStatus,
        actor: &str,
    ) -> Result<Transition> {
        ensure_terminal(status)?;
        let conn = self.db.conn().await;
        let changes = conn.execute(
            "UPDATE memory_candidates SET status = ?1, reviewed_by = ?2, reviewed_at = ?3
             WHERE id = ?4 AND status = 'pending'",
            params![status.as_str(), actor, to_millis(Utc::now()), id],
        )?;
        Ok(transition_from(changes, id, status))
    }

    /// Replace the extracted items of a pending MemoryCandidate
    pub async fn edit_memory_candidate(
        &self,
        id: &str,
        memories: &[ExtractedMemory],
    ) -> Result<Transition> {
        let extracted_json = serde_json::to_string(memories)?;
        let conn = self.db.conn().await;
        let changes = conn.execute(
            "UPDATE memory_candidates SET extracted_json = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![extracted_json, id],
        )?;
        Ok(if changes > 0 {
            Transition::Applied
        } else {
            Transition::NoOp
        })
    }

    /// Approve a pending MemoryCandidate and materialize one Memory per
    /// extracted item, in a single transaction.
    ///
    /// Returns `None` when the candidate is missing or already processed.
    pub async fn approve_memory_candidate(
        &self,
        id: &str,
        actor: &str,
    ) -> Result<Option<Vec<Memory>>> {
        let mut conn = self.db.conn().await;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let changes = tx.execute(
            "UPDATE memory_candidates SET status = 'approved', reviewed_by = ?1, reviewed_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![actor, to_millis(now), id],
        )?;
        if changes == 0 {
            return Ok(None);
        }

        let candidate = get_memory_candidate(&tx, id)?
            .ok_or_else(|| Error::Record(format!("memory candidate {} vanished", id)))?;

        let mut created = Vec::with_capacity(candidate.extracted_memories.len());
        for item in &candidate.extracted_memories {
            let memory = Memory {
                id: format!("mem-{}", uuid::Uuid::new_v4()),
                memory_type: item.memory_type,
                content: item.content.clone(),
                context: item.context.clone(),
                source: candidate.source.clone(),
                channel: candidate.channel.clone(),
                thread_ref: Some(candidate.thread_ref.clone()),
                submitted_by: candidate.submitted_by.clone(),
                approved_by: actor.to_string(),
                created_at: from_millis(to_millis(now)),
                tags: item.tags.clone(),
            };
            insert_memory(&tx, &memory)?;
            created.push(memory);
        }
        tx.commit()?;

        tracing::info!(
            record_id = %id,
            created = created.len(),
            "Memory candidate approved"
        );
        Ok(Some(created))
    }

    // =========================================================================
    // Memories
    // =========================================================================

    /// Get a Memory by ID
    pub async fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        let conn = self.db.conn().await;
        Ok(conn
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                params![id],
                memory_from_row,
            )
            .optional()?)
    }

    /// Most recent memories first
    pub async fn list_memories(&self, limit: usize) -> Result<Vec<Memory>> {
        let conn = self.db.conn().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], memory_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Case-insensitive substring search over content, context and tags
    pub async fn search_memories(&self, query: &str, limit: usize) -> Result<Vec<Memory>> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let conn = self.db.conn().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             WHERE lower(content) LIKE ?1 ESCAPE '\\'
                OR lower(COALESCE(context, '')) LIKE ?1 ESCAPE '\\'
                OR lower(tags_json) LIKE ?1 ESCAPE '\\'
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![pattern, limit as i64], memory_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Administrative delete. Returns whether a memory was removed.
    pub async fn delete_memory(&self, id: &str) -> Result<bool> {
        let conn = self.db.conn().await;
        let changes = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        if changes > 0 {
            tracing::info!(memory_id = %id, "Memory deleted");
        }
        Ok(changes > 0)
    }
}

// =============================================================================
// Row helpers
// =============================================================================

fn ensure_terminal(status: RecordStatus) -> Result<()> {
    if status.is_terminal() {
        Ok(())
    } else {
        Err(Error::Record(
            "records can only transition to approved or rejected".to_string(),
        ))
    }
}

fn transition_from(changes: usize, id: &str, status: RecordStatus) -> Transition {
    if changes > 0 {
        tracing::info!(record_id = %id, status = %status, "Record transitioned");
        Transition::Applied
    } else {
        tracing::debug!(record_id = %id, status = %status, "Transition was a no-op");
        Transition::NoOp
    }
}

/// Run `insert` with fresh IDs until one does not collide
fn insert_with_fresh_id<F>(mut insert: F) -> Result<String>
where
    F: FnMut(&str) -> rusqlite::Result<usize>,
{
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = generate_id();
        match insert(&id) {
            Ok(_) => return Ok(id),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                tracing::warn!(record_id = %id, "Record ID collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Record("could not allocate a unique record ID".to_string()))
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn get_update(conn: &Connection, id: &str) -> Result<Option<Update>> {
    Ok(conn
        .query_row(
            &format!("SELECT {UPDATE_COLUMNS} FROM updates WHERE id = ?1"),
            params![id],
            update_from_row,
        )
        .optional()?)
}

fn get_memory_candidate(conn: &Connection, id: &str) -> Result<Option<MemoryCandidate>> {
    Ok(conn
        .query_row(
            &format!("SELECT {CANDIDATE_COLUMNS} FROM memory_candidates WHERE id = ?1"),
            params![id],
            candidate_from_row,
        )
        .optional()?)
}

fn insert_memory(conn: &Connection, memory: &Memory) -> Result<()> {
    let tags_json = serde_json::to_string(&memory.tags)?;
    conn.execute(
        &format!("INSERT INTO memories ({MEMORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            memory.id,
            memory.memory_type.as_str(),
            memory.content,
            memory.context,
            memory.source,
            memory.channel,
            memory.thread_ref,
            memory.submitted_by,
            memory.approved_by,
            to_millis(memory.created_at),
            tags_json,
        ],
    )?;
    Ok(())
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn json_col<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<chrono::DateTime<Utc>>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(from_millis))
}

fn update_from_row(row: &Row<'_>) -> rusqlite::Result<Update> {
    Ok(Update {
        id: row.get(0)?,
        kind: parse_col(row, 1)?,
        target: row.get(2)?,
        value: row.get(3)?,
        submitted_by: row.get(4)?,
        submitted_at: from_millis(row.get(5)?),
        status: parse_col(row, 6)?,
        source: row.get(7)?,
        channel: row.get(8)?,
        thread_ref: row.get(9)?,
        processed_at: opt_time(row, 10)?,
        processed_by: row.get(11)?,
        edited_at: opt_time(row, 12)?,
        edited_by: row.get(13)?,
        note: row.get(14)?,
    })
}

fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryCandidate> {
    Ok(MemoryCandidate {
        id: row.get(0)?,
        source: row.get(1)?,
        channel: row.get(2)?,
        channel_ref: row.get(3)?,
        thread_ref: row.get(4)?,
        raw_messages: json_col(row, 5)?,
        extracted_memories: json_col(row, 6)?,
        submitted_by: row.get(7)?,
        submitted_at: from_millis(row.get(8)?),
        status: parse_col(row, 9)?,
        reviewed_by: row.get(10)?,
        reviewed_at: opt_time(row, 11)?,
    })
}

fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<Memory> {
    Ok(Memory {
        id: row.get(0)?,
        memory_type: parse_col(row, 1)?,
        content: row.get(2)?,
        context: row.get(3)?,
        source: row.get(4)?,
        channel: row.get(5)?,
        thread_ref: row.get(6)?,
        submitted_by: row.get(7)?,
        approved_by: row.get(8)?,
        created_at: from_millis(row.get(9)?),
        tags: json_col(row, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_update(target: &str, value: &str) -> NewUpdate {
        NewUpdate {
            kind: UpdateKind::Oem,
            target: target.to_string(),
            value: value.to_string(),
            submitted_by: "U_SUBMITTER".to_string(),
            source: "message".to_string(),
            channel: Some("C1".to_string()),
            thread_ref: None,
        }
    }

    fn new_candidate() -> NewMemoryCandidate {
        NewMemoryCandidate {
            source: "thread".to_string(),
            channel: "general".to_string(),
            channel_ref: "C1".to_string(),
            thread_ref: "1700000000.000100".to_string(),
            raw_messages: vec![ThreadMessage::new("U1", "Let's ship on Friday")],
            extracted_memories: vec![
                ExtractedMemory {
                    memory_type: MemoryType::Decision,
                    content: "Ship on Friday".to_string(),
                    context: Some("release planning".to_string()),
                    tags: vec!["release".to_string()],
                },
                ExtractedMemory {
                    memory_type: MemoryType::Action,
                    content: "Dana writes the changelog".to_string(),
                    context: None,
                    tags: vec![],
                },
            ],
            submitted_by: "U1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_update() {
        let store = RecordStore::open_in_memory().unwrap();
        let created = store.create_update(new_update("Acme", "signed")).await.unwrap();

        assert_eq!(created.status, RecordStatus::Pending);
        assert!(created.processed_at.is_none());

        let fetched = store.get_update(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_missing_update() {
        let store = RecordStore::open_in_memory().unwrap();
        assert!(store.get_update("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_pending_newest_first() {
        let store = RecordStore::open_in_memory().unwrap();
        let a = store.create_update(new_update("A", "1")).await.unwrap();
        let b = store.create_update(new_update("B", "2")).await.unwrap();
        let c = store.create_update(new_update("C", "3")).await.unwrap();

        store
            .transition_update(&b.id, RecordStatus::Rejected, "R", None)
            .await
            .unwrap();

        let pending = store.list_pending_updates().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), a.id.as_str()]);
    }

    #[tokio::test]
    async fn test_transition_once() {
        let store = RecordStore::open_in_memory().unwrap();
        let update = store.create_update(new_update("Acme", "signed")).await.unwrap();

        let first = store
            .transition_update(&update.id, RecordStatus::Approved, "R1", None)
            .await
            .unwrap();
        let second = store
            .transition_update(&update.id, RecordStatus::Rejected, "R2", None)
            .await
            .unwrap();

        assert_eq!(first, Transition::Applied);
        assert_eq!(second, Transition::NoOp);

        let stored = store.get_update(&update.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Approved);
        assert_eq!(stored.processed_by.as_deref(), Some("R1"));
        assert!(stored.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_transitions_apply_exactly_once() {
        let store = RecordStore::open_in_memory().unwrap();
        let update = store.create_update(new_update("Acme", "signed")).await.unwrap();

        let attempts = (0..8).map(|i| {
            let store = store.clone();
            let id = update.id.clone();
            tokio::spawn(async move {
                store
                    .transition_update(&id, RecordStatus::Approved, &format!("R{i}"), None)
                    .await
                    .unwrap()
            })
        });
        let results = futures::future::join_all(attempts).await;

        let applied = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|t| t.applied())
            .count();
        assert_eq!(applied, 1);

        let stored = store.get_update(&update.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Approved);
        assert!(stored.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_transition_missing_is_noop() {
        let store = RecordStore::open_in_memory().unwrap();
        let result = store
            .transition_update("missing", RecordStatus::Approved, "R", None)
            .await
            .unwrap();
        assert_eq!(result, Transition::NoOp);
    }

    #[tokio::test]
    async fn test_transition_to_pending_is_rejected() {
        let store = RecordStore::open_in_memory().unwrap();
        let update = store.create_update(new_update("Acme", "x")).await.unwrap();
        assert!(store
            .transition_update(&update.id, RecordStatus::Pending, "R", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_edit_only_while_pending() {
        let store = RecordStore::open_in_memory().unwrap();
        let update = store.create_update(new_update("Acme", "signed")).await.unwrap();

        let edited = store
            .edit_update(&update.id, Some("Acme Corp"), None, "R")
            .await
            .unwrap();
        assert_eq!(edited, Transition::Applied);

        let stored = store.get_update(&update.id).await.unwrap().unwrap();
        assert_eq!(stored.target, "Acme Corp");
        assert_eq!(stored.value, "signed");
        assert_eq!(stored.edited_by.as_deref(), Some("R"));

        store
            .transition_update(&update.id, RecordStatus::Approved, "R", None)
            .await
            .unwrap();
        let late = store
            .edit_update(&update.id, None, Some("lost"), "R")
            .await
            .unwrap();
        assert_eq!(late, Transition::NoOp);
        let stored = store.get_update(&update.id).await.unwrap().unwrap();
        assert_eq!(stored.value, "signed");
    }

    #[tokio::test]
    async fn test_note_on_terminal_record() {
        let store = RecordStore::open_in_memory().unwrap();
        let update = store.create_update(new_update("Acme", "signed")).await.unwrap();
        store
            .transition_update(&update.id, RecordStatus::Approved, "R", Some("approved"))
            .await
            .unwrap();

        assert!(store.set_update_note(&update.id, "filing failed").await.unwrap());
        assert!(!store.set_update_note("missing", "x").await.unwrap());

        let stored = store.get_update(&update.id).await.unwrap().unwrap();
        assert_eq!(stored.note.as_deref(), Some("filing failed"));
        assert_eq!(stored.status, RecordStatus::Approved);
    }

    #[tokio::test]
    async fn test_candidate_round_trip() {
        let store = RecordStore::open_in_memory().unwrap();
        let created = store.create_memory_candidate(new_candidate()).await.unwrap();
        let fetched = store
            .get_memory_candidate(&created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, created);

        let pending = store.list_pending_memory_candidates().await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_approve_candidate_materializes_memories() {
        let store = RecordStore::open_in_memory().unwrap();
        let candidate = store.create_memory_candidate(new_candidate()).await.unwrap();

        let created = store
            .approve_memory_candidate(&candidate.id, "R")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].memory_type, MemoryType::Decision);
        assert_eq!(created[0].approved_by, "R");
        assert_eq!(created[0].thread_ref.as_deref(), Some("1700000000.000100"));

        let again = store
            .approve_memory_candidate(&candidate.id, "R2")
            .await
            .unwrap();
        assert!(again.is_none());

        let stored = store
            .get_memory_candidate(&candidate.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, RecordStatus::Approved);
        assert_eq!(stored.reviewed_by.as_deref(), Some("R"));

        assert_eq!(store.list_memories(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_candidate_creates_nothing() {
        let store = RecordStore::open_in_memory().unwrap();
        let candidate = store.create_memory_candidate(new_candidate()).await.unwrap();

        let result = store
            .transition_memory_candidate(&candidate.id, RecordStatus::Rejected, "R")
            .await
            .unwrap();
        assert_eq!(result, Transition::Applied);
        assert!(store
            .approve_memory_candidate(&candidate.id, "R")
            .await
            .unwrap()
            .is_none());
        assert!(store.list_memories(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_candidate_items() {
        let store = RecordStore::open_in_memory().unwrap();
        let candidate = store.create_memory_candidate(new_candidate()).await.unwrap();
        let replacement = vec![ExtractedMemory {
            memory_type: MemoryType::Fact,
            content: "Release train is weekly".to_string(),
            context: None,
            tags: vec!["release".to_string()],
        }];

        let result = store
            .edit_memory_candidate(&candidate.id, &replacement)
            .await
            .unwrap();
        assert!(result.applied());

        let stored = store
            .get_memory_candidate(&candidate.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.extracted_memories, replacement);
    }

    #[tokio::test]
    async fn test_search_and_delete_memories() {
        let store = RecordStore::open_in_memory().unwrap();
        let candidate = store.create_memory_candidate(new_candidate()).await.unwrap();
        let created = store
            .approve_memory_candidate(&candidate.id, "R")
            .await
            .unwrap()
            .unwrap();

        let hits = store.search_memories("FRIDAY", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Ship on Friday");

        let by_tag = store.search_memories("release", 10).await.unwrap();
        assert_eq!(by_tag.len(), 1);

        assert!(store.search_memories("100%", 10).await.unwrap().is_empty());

        assert!(store.delete_memory(&created[0].id).await.unwrap());
        assert!(!store.delete_memory(&created[0].id).await.unwrap());
        assert!(store.get_memory(&created[0].id).await.unwrap().is_none());
        assert!(store.get_memory(&created[1].id).await.unwrap().is_some());
    }
}
