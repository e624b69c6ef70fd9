//! CRUD and lifecycle queries for [`ChatRequest`] records.
//!
//! Two queries here carry the core semantics: `find_pending` backs the
//! duplicate-send guard for an ordered (sender, receiver) pair, and
//! `latest_between` backs the derived pair status (the most recent request
//! between two users, in either direction, is the single source of truth).

use chrono::{DateTime, Utc};
use parley_shared::types::{RequestId, RequestStatus, UserId};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ChatRequest;

const REQUEST_COLUMNS: &str = "id, sender_id, receiver_id, status, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new chat request.
    pub fn insert_request(&self, request: &ChatRequest) -> Result<()> {
        self.conn().execute(
            "INSERT INTO chat_requests (id, sender_id, receiver_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.id.to_string(),
                request.sender_id.as_str(),
                request.receiver_id.as_str(),
                request.status.as_str(),
                request.created_at.to_rfc3339(),
                request.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single request by id.
    pub fn get_request(&self, id: RequestId) -> Result<ChatRequest> {
        self.conn()
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM chat_requests WHERE id = ?1"),
                params![id.to_string()],
                row_to_request,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Find the `pending` request for an exact ordered (sender, receiver)
    /// pair, if one exists.
    pub fn find_pending(&self, sender: &UserId, receiver: &UserId) -> Result<Option<ChatRequest>> {
        let result = self.conn().query_row(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM chat_requests
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND status = 'pending'
                 LIMIT 1"
            ),
            params![sender.as_str(), receiver.as_str()],
            row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// Find the most recent request between two users, in either direction.
    ///
    /// Ties on `created_at` (possible when records are created in the same
    /// instant) resolve by insertion order via `rowid`.
    pub fn latest_between(&self, a: &UserId, b: &UserId) -> Result<Option<ChatRequest>> {
        let result = self.conn().query_row(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM chat_requests
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1"
            ),
            params![a.as_str(), b.as_str()],
            row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// List all `pending` requests addressed to a user, newest first.
    pub fn pending_for_receiver(&self, receiver: &UserId) -> Result<Vec<ChatRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM chat_requests
             WHERE receiver_id = ?1 AND status = 'pending'
             ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![receiver.as_str()], row_to_request)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    /// Distinct ids of every user with an `accepted` request involving the
    /// given user, in either direction.
    pub fn accepted_peer_ids(&self, user: &UserId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT
                 CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS peer_id
             FROM chat_requests
             WHERE status = 'accepted'
               AND (sender_id = ?1 OR receiver_id = ?1)",
        )?;

        let rows = stmt.query_map(params![user.as_str()], |row| {
            let id: String = row.get(0)?;
            Ok(UserId::new(id))
        })?;

        let mut peers = Vec::new();
        for row in rows {
            peers.push(row?);
        }
        Ok(peers)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set a request's status and `updated_at`, returning the updated record.
    ///
    /// The caller is responsible for the pending-only transition guard; this
    /// is a plain write.
    pub fn update_request_status(
        &self,
        id: RequestId,
        status: RequestStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<ChatRequest> {
        let affected = self.conn().execute(
            "UPDATE chat_requests SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), status.as_str(), updated_at.to_rfc3339()],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        self.get_request(id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ChatRequest`].
fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRequest> {
    let id_str: String = row.get(0)?;
    let sender_id: String = row.get(1)?;
    let receiver_id: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status = RequestStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown request status: {status_str}").into(),
        )
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let updated_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&updated_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChatRequest {
        id: RequestId(id),
        sender_id: UserId::new(sender_id),
        receiver_id: UserId::new(receiver_id),
        status,
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(a: &str, b: &str) -> (UserId, UserId) {
        (UserId::new(a), UserId::new(b))
    }

    #[test]
    fn insert_and_find_pending_is_ordered() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = ids("a1", "b1");

        let request = ChatRequest::new(a.clone(), b.clone());
        db.insert_request(&request).unwrap();

        // Ordered pair: (a, b) has a pending request, (b, a) does not.
        assert!(db.find_pending(&a, &b).unwrap().is_some());
        assert!(db.find_pending(&b, &a).unwrap().is_none());
    }

    #[test]
    fn latest_between_is_direction_agnostic_and_tie_broken() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = ids("a1", "b1");

        let first = ChatRequest::new(a.clone(), b.clone());
        db.insert_request(&first).unwrap();
        let rejected = db
            .update_request_status(first.id, RequestStatus::Rejected, Utc::now())
            .unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);

        // A retry created in (possibly) the same instant must win the
        // latest-between query from both directions.
        let second = ChatRequest::new(a.clone(), b.clone());
        db.insert_request(&second).unwrap();

        let latest = db.latest_between(&a, &b).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        let latest = db.latest_between(&b, &a).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[test]
    fn latest_between_is_none_without_records() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = ids("a1", "b1");
        assert!(db.latest_between(&a, &b).unwrap().is_none());
    }

    #[test]
    fn pending_inbox_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let receiver = UserId::new("r1");

        let older = ChatRequest::new(UserId::new("s1"), receiver.clone());
        let newer = ChatRequest::new(UserId::new("s2"), receiver.clone());
        db.insert_request(&older).unwrap();
        db.insert_request(&newer).unwrap();

        let inbox = db.pending_for_receiver(&receiver).unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].id, newer.id);
        assert_eq!(inbox[1].id, older.id);
    }

    #[test]
    fn accepted_peers_covers_both_directions_without_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let me = UserId::new("me");

        // Accepted in both directions with the same peer, plus one more.
        for (s, r) in [("me", "b1"), ("b1", "me"), ("c1", "me")] {
            let request = ChatRequest::new(UserId::new(s), UserId::new(r));
            db.insert_request(&request).unwrap();
            db.update_request_status(request.id, RequestStatus::Accepted, Utc::now())
                .unwrap();
        }
        // A pending request must not appear.
        db.insert_request(&ChatRequest::new(UserId::new("d1"), me.clone()))
            .unwrap();

        let mut peers = db.accepted_peer_ids(&me).unwrap();
        peers.sort();
        assert_eq!(peers, vec![UserId::new("b1"), UserId::new("c1")]);
    }

    #[test]
    fn updating_a_missing_request_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.update_request_status(RequestId::new(), RequestStatus::Accepted, Utc::now()),
            Err(StoreError::NotFound)
        ));
    }
}
