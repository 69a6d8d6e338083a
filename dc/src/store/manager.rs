//! BorrowerStore actor and its cloneable handle
//!
//! The actor exclusively owns the SQLite connection. Handles communicate
//! with it over an mpsc channel and receive replies on oneshot channels, so
//! every operation observes a serialized view of the store. The lifecycle
//! transitions (claim, complete, fail) are conditional UPDATEs guarded on
//! the current `call_status`, which is what makes them atomic
//! check-and-set operations even though callers race freely.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::messages::{ResetTarget, StoreCommand, StoreError, StoreResponse};
use crate::domain::{
    AnalysisResult, BorrowerProfile, BorrowerRecord, CallStatus, CallTurn, Category, FailReason,
    Intent, Language,
};

const CHANNEL_CAPACITY: usize = 64;

const RECORD_COLUMNS: &str = "owner_id, id, name, loan_amount, emi, mobile, language, category, \
     last_paid, call_status, intent, follow_up_date, ai_summary, transcript, updated_at";

/// Cloneable handle to the borrower store actor
#[derive(Debug, Clone)]
pub struct BorrowerStore {
    tx: mpsc::Sender<StoreCommand>,
}

impl BorrowerStore {
    /// Open (or create) the store at the given path and spawn its actor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(path: &Path) -> StoreResponse<Self> {
        debug!("open: called with path={}", path.display());
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests and the simulated end-to-end runs
    pub fn open_in_memory() -> StoreResponse<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResponse<Self> {
        init_schema(&conn)?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(actor_loop(conn, rx));
        Ok(Self { tx })
    }

    /// Upsert borrower profiles for an owner, returning how many were written.
    ///
    /// Existing records keep their lifecycle and outcome fields; only the
    /// profile columns are refreshed.
    pub async fn ingest(
        &self,
        owner_id: &str,
        profiles: Vec<BorrowerProfile>,
    ) -> StoreResponse<usize> {
        debug!("ingest: called with {} profiles", profiles.len());
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Ingest {
            owner_id: owner_id.to_string(),
            profiles,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// List records eligible for dispatch: everything not currently claimed,
    /// optionally narrowed to one category. Ordered by borrower id.
    pub async fn list_eligible(
        &self,
        owner_id: &str,
        category: Option<Category>,
    ) -> StoreResponse<Vec<BorrowerRecord>> {
        debug!("list_eligible: called");
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::ListEligible {
            owner_id: owner_id.to_string(),
            category,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Attempt to claim a record for a call attempt.
    ///
    /// Returns true iff this caller performed the Idle -> InProgress
    /// transition. Any other current state (including a missing record)
    /// returns false; the record is never disturbed.
    pub async fn try_claim(&self, owner_id: &str, borrower_id: &str) -> StoreResponse<bool> {
        debug!("try_claim: called for {}", borrower_id);
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::TryClaim {
            owner_id: owner_id.to_string(),
            borrower_id: borrower_id.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Finish a claimed attempt: write the analysis outcome and transcript
    /// and move the record to Completed.
    pub async fn complete(
        &self,
        owner_id: &str,
        borrower_id: &str,
        analysis: AnalysisResult,
        follow_up_date: Option<NaiveDate>,
        transcript: Vec<CallTurn>,
    ) -> StoreResponse<()> {
        debug!("complete: called for {}", borrower_id);
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Complete {
            owner_id: owner_id.to_string(),
            borrower_id: borrower_id.to_string(),
            analysis,
            follow_up_date,
            transcript,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Release a claimed record back to Idle without writing an outcome
    pub async fn fail(
        &self,
        owner_id: &str,
        borrower_id: &str,
        reason: FailReason,
    ) -> StoreResponse<()> {
        debug!("fail: called for {} ({})", borrower_id, reason);
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Fail {
            owner_id: owner_id.to_string(),
            borrower_id: borrower_id.to_string(),
            reason,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Administrative reset: clear lifecycle and outcome fields back to a
    /// fresh Idle record. Returns how many records were reset.
    pub async fn reset(&self, owner_id: &str, target: ResetTarget) -> StoreResponse<usize> {
        debug!("reset: called with {:?}", target);
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Reset {
            owner_id: owner_id.to_string(),
            target,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Fetch a single record, if it exists for this owner
    pub async fn get(
        &self,
        owner_id: &str,
        borrower_id: &str,
    ) -> StoreResponse<Option<BorrowerRecord>> {
        debug!("get: called for {}", borrower_id);
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Get {
            owner_id: owner_id.to_string(),
            borrower_id: borrower_id.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Consistent snapshot of every record owned by this owner, ordered by id
    pub async fn project(&self, owner_id: &str) -> StoreResponse<Vec<BorrowerRecord>> {
        debug!("project: called");
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Project {
            owner_id: owner_id.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Ask the actor to drain and exit. Pending handles get ChannelClosed.
    pub async fn shutdown(&self) {
        debug!("shutdown: called");
        if self.tx.send(StoreCommand::Shutdown).await.is_err() {
            warn!("shutdown: store actor already gone");
        }
    }

    async fn send(&self, cmd: StoreCommand) -> StoreResponse<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| StoreError::ChannelClosed)
    }
}

/// Actor task: owns the connection, serializes every store operation
async fn actor_loop(mut conn: Connection, mut rx: mpsc::Receiver<StoreCommand>) {
    debug!("actor_loop: started");
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::Ingest {
                owner_id,
                profiles,
                reply,
            } => {
                let result = ingest(&mut conn, &owner_id, &profiles);
                let _ = reply.send(result);
            }
            StoreCommand::ListEligible {
                owner_id,
                category,
                reply,
            } => {
                let _ = reply.send(list_eligible(&conn, &owner_id, category));
            }
            StoreCommand::TryClaim {
                owner_id,
                borrower_id,
                reply,
            } => {
                let _ = reply.send(try_claim(&conn, &owner_id, &borrower_id));
            }
            StoreCommand::Complete {
                owner_id,
                borrower_id,
                analysis,
                follow_up_date,
                transcript,
                reply,
            } => {
                let result = complete(
                    &conn,
                    &owner_id,
                    &borrower_id,
                    &analysis,
                    follow_up_date,
                    &transcript,
                );
                let _ = reply.send(result);
            }
            StoreCommand::Fail {
                owner_id,
                borrower_id,
                reason,
                reply,
            } => {
                let _ = reply.send(fail(&conn, &owner_id, &borrower_id, reason));
            }
            StoreCommand::Reset {
                owner_id,
                target,
                reply,
            } => {
                let _ = reply.send(reset(&conn, &owner_id, &target));
            }
            StoreCommand::Get {
                owner_id,
                borrower_id,
                reply,
            } => {
                let _ = reply.send(get(&conn, &owner_id, &borrower_id));
            }
            StoreCommand::Project { owner_id, reply } => {
                let _ = reply.send(project(&conn, &owner_id));
            }
            StoreCommand::Shutdown => {
                debug!("actor_loop: shutdown requested");
                break;
            }
        }
    }
    debug!("actor_loop: exited");
}

fn init_schema(conn: &Connection) -> StoreResponse<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS borrowers (
            owner_id       TEXT NOT NULL,
            id             TEXT NOT NULL,
            name           TEXT NOT NULL,
            loan_amount    REAL NOT NULL,
            emi            REAL NOT NULL,
            mobile         TEXT NOT NULL,
            language       TEXT NOT NULL,
            category       TEXT NOT NULL,
            last_paid      TEXT,
            call_status    TEXT NOT NULL DEFAULT 'idle',
            intent         TEXT,
            follow_up_date TEXT,
            ai_summary     TEXT,
            transcript     TEXT,
            updated_at     INTEGER NOT NULL,
            PRIMARY KEY (owner_id, id)
        );
        CREATE INDEX IF NOT EXISTS idx_borrowers_status
            ON borrowers (owner_id, call_status);",
    )?;
    Ok(())
}

fn ingest(
    conn: &mut Connection,
    owner_id: &str,
    profiles: &[BorrowerProfile],
) -> StoreResponse<usize> {
    let now = Utc::now().timestamp_millis();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO borrowers (owner_id, id, name, loan_amount, emi, mobile,
                                    language, category, last_paid, call_status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'idle', ?10)
             ON CONFLICT(owner_id, id) DO UPDATE SET
                 name = excluded.name,
                 loan_amount = excluded.loan_amount,
                 emi = excluded.emi,
                 mobile = excluded.mobile,
                 language = excluded.language,
                 category = excluded.category,
                 last_paid = excluded.last_paid,
                 updated_at = excluded.updated_at",
        )?;
        for profile in profiles {
            stmt.execute(params![
                owner_id,
                profile.id,
                profile.name,
                profile.loan_amount,
                profile.emi,
                profile.mobile,
                profile.language.as_str(),
                profile.category.as_str(),
                profile.last_paid.map(format_date),
                now,
            ])?;
        }
    }
    tx.commit()?;
    Ok(profiles.len())
}

fn list_eligible(
    conn: &Connection,
    owner_id: &str,
    category: Option<Category>,
) -> StoreResponse<Vec<BorrowerRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM borrowers
         WHERE owner_id = ?1 AND call_status != 'in_progress'
               AND (?2 IS NULL OR category = ?2)
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![owner_id, category.map(|c| c.as_str())],
        record_from_row,
    )?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

fn try_claim(conn: &Connection, owner_id: &str, borrower_id: &str) -> StoreResponse<bool> {
    let now = Utc::now().timestamp_millis();
    let changed = conn.execute(
        "UPDATE borrowers SET call_status = 'in_progress', updated_at = ?1
         WHERE owner_id = ?2 AND id = ?3 AND call_status = 'idle'",
        params![now, owner_id, borrower_id],
    )?;
    Ok(changed == 1)
}

fn complete(
    conn: &Connection,
    owner_id: &str,
    borrower_id: &str,
    analysis: &AnalysisResult,
    follow_up_date: Option<NaiveDate>,
    transcript: &[CallTurn],
) -> StoreResponse<()> {
    let transcript_json =
        serde_json::to_string(transcript).map_err(|e| StoreError::Backend(e.to_string()))?;
    let now = Utc::now().timestamp_millis();
    let changed = conn.execute(
        "UPDATE borrowers SET call_status = 'completed', intent = ?1,
                follow_up_date = ?2, ai_summary = ?3, transcript = ?4, updated_at = ?5
         WHERE owner_id = ?6 AND id = ?7 AND call_status = 'in_progress'",
        params![
            analysis.intent.as_str(),
            follow_up_date.map(format_date),
            analysis.summary,
            transcript_json,
            now,
            owner_id,
            borrower_id,
        ],
    )?;
    if changed == 1 {
        Ok(())
    } else {
        Err(classify_miss(conn, owner_id, borrower_id)?)
    }
}

fn fail(
    conn: &Connection,
    owner_id: &str,
    borrower_id: &str,
    reason: FailReason,
) -> StoreResponse<()> {
    let now = Utc::now().timestamp_millis();
    let changed = conn.execute(
        "UPDATE borrowers SET call_status = 'idle', updated_at = ?1
         WHERE owner_id = ?2 AND id = ?3 AND call_status = 'in_progress'",
        params![now, owner_id, borrower_id],
    )?;
    if changed == 1 {
        debug!("fail: released claim on {} ({})", borrower_id, reason);
        Ok(())
    } else {
        Err(classify_miss(conn, owner_id, borrower_id)?)
    }
}

fn reset(conn: &Connection, owner_id: &str, target: &ResetTarget) -> StoreResponse<usize> {
    let now = Utc::now().timestamp_millis();
    match target {
        ResetTarget::One(borrower_id) => {
            let changed = conn.execute(
                "UPDATE borrowers SET call_status = 'idle', intent = NULL,
                        follow_up_date = NULL, ai_summary = NULL, transcript = NULL,
                        updated_at = ?1
                 WHERE owner_id = ?2 AND id = ?3",
                params![now, owner_id, borrower_id],
            )?;
            if changed == 1 {
                Ok(1)
            } else {
                Err(classify_miss(conn, owner_id, borrower_id)?)
            }
        }
        ResetTarget::All => {
            let changed = conn.execute(
                "UPDATE borrowers SET call_status = 'idle', intent = NULL,
                        follow_up_date = NULL, ai_summary = NULL, transcript = NULL,
                        updated_at = ?1
                 WHERE owner_id = ?2",
                params![now, owner_id],
            )?;
            Ok(changed)
        }
    }
}

fn get(
    conn: &Connection,
    owner_id: &str,
    borrower_id: &str,
) -> StoreResponse<Option<BorrowerRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM borrowers WHERE owner_id = ?1 AND id = ?2");
    let record = conn
        .query_row(&sql, params![owner_id, borrower_id], record_from_row)
        .optional()?;
    Ok(record)
}

fn project(conn: &Connection, owner_id: &str) -> StoreResponse<Vec<BorrowerRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM borrowers WHERE owner_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner_id], record_from_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// A guarded UPDATE matched zero rows; figure out which error that is.
///
/// Ordering matters for the isolation guarantee: another owner's record
/// must look exactly like a missing one would, except we report Forbidden
/// so the caller can log it as an access violation rather than a data gap.
fn classify_miss(conn: &Connection, owner_id: &str, borrower_id: &str) -> StoreResponse<StoreError> {
    let mine: Option<String> = conn
        .query_row(
            "SELECT call_status FROM borrowers WHERE owner_id = ?1 AND id = ?2",
            params![owner_id, borrower_id],
            |row| row.get(0),
        )
        .optional()?;
    if mine.is_some() {
        return Ok(StoreError::NotClaimed(borrower_id.to_string()));
    }
    let other: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM borrowers WHERE id = ?1 LIMIT 1",
            params![borrower_id],
            |row| row.get(0),
        )
        .optional()?;
    if other.is_some() {
        error!("classify_miss: cross-owner access to {}", borrower_id);
        Ok(StoreError::Forbidden(borrower_id.to_string()))
    } else {
        Ok(StoreError::NotFound(borrower_id.to_string()))
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BorrowerRecord> {
    let language_raw: String = row.get("language")?;
    let category_raw: String = row.get("category")?;
    let status_raw: String = row.get("call_status")?;
    let intent_raw: Option<String> = row.get("intent")?;
    let last_paid_raw: Option<String> = row.get("last_paid")?;
    let follow_up_raw: Option<String> = row.get("follow_up_date")?;
    let transcript_raw: Option<String> = row.get("transcript")?;

    let intent = match intent_raw {
        Some(s) => Some(
            Intent::parse(&s).ok_or_else(|| conversion_err("intent", format!("bad value {s}")))?,
        ),
        None => None,
    };
    let transcript = match transcript_raw {
        Some(s) => Some(
            serde_json::from_str(&s).map_err(|e| conversion_err("transcript", e.to_string()))?,
        ),
        None => None,
    };

    Ok(BorrowerRecord {
        owner_id: row.get("owner_id")?,
        id: row.get("id")?,
        name: row.get("name")?,
        loan_amount: row.get("loan_amount")?,
        emi: row.get("emi")?,
        mobile: row.get("mobile")?,
        language: Language::parse(&language_raw)
            .ok_or_else(|| conversion_err("language", format!("bad value {language_raw}")))?,
        category: Category::parse(&category_raw)
            .ok_or_else(|| conversion_err("category", format!("bad value {category_raw}")))?,
        last_paid: parse_date_opt("last_paid", last_paid_raw)?,
        call_status: CallStatus::parse(&status_raw)
            .ok_or_else(|| conversion_err("call_status", format!("bad value {status_raw}")))?,
        intent,
        follow_up_date: parse_date_opt("follow_up_date", follow_up_raw)?,
        ai_summary: row.get("ai_summary")?,
        transcript,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_date_opt(col: &str, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_err(col, e.to_string()))
    })
    .transpose()
}

fn conversion_err(col: &str, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("{col}: {msg}").into(),
    )
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
