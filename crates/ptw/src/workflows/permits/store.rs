//! SQLite-backed record store.
//!
//! One connection is opened at startup and guarded by a mutex. Writes that
//! touch both tables run inside a single transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::{debug, info};

use super::domain::{
    NewPermit, Permit, PermitId, PermitStatus, Photo, PhotoId, PhotoStage, WorkType,
};
use super::repository::{PermitRepository, RepositoryError, StatusUpdate};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS permits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contractor_name TEXT NOT NULL,
    work_type TEXT NOT NULL,
    location TEXT NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL,
    request_date TEXT NOT NULL,
    approval_date TEXT,
    approver_name TEXT
);
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    permit_id INTEGER NOT NULL,
    stage TEXT NOT NULL,
    image_data BLOB NOT NULL,
    timestamp TEXT NOT NULL,
    FOREIGN KEY(permit_id) REFERENCES permits(id)
);
CREATE INDEX IF NOT EXISTS idx_photos_permit_id ON photos(permit_id);
";

const PERMIT_COLUMNS: &str = "id, contractor_name, work_type, location, description, status, \
                              request_date, approval_date, approver_name";

pub struct SqlitePermitStore {
    connection: Mutex<Connection>,
}

impl SqlitePermitStore {
    /// Open (or create) the database file and make sure both tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let connection = Connection::open(path)?;
        info!(path = %path.display(), "opened permit database");
        Self::with_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self, RepositoryError> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub(super) fn connection(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.connection
            .lock()
            .map_err(|_| RepositoryError::Unavailable("connection mutex poisoned".to_string()))
    }
}

impl PermitRepository for SqlitePermitStore {
    fn create_permit(&self, permit: &NewPermit) -> Result<PermitId, RepositoryError> {
        let conn = self.connection()?;
        insert_permit(&conn, permit)
    }

    fn create_permit_with_photo(
        &self,
        permit: &NewPermit,
        stage: PhotoStage,
        image: &[u8],
    ) -> Result<(PermitId, Photo), RepositoryError> {
        if image.is_empty() {
            return Err(RepositoryError::EmptyImage);
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let permit_id = insert_permit(&tx, permit)?;
        let photo = insert_photo(&tx, permit_id, stage, image)?;
        tx.commit()?;
        Ok((permit_id, photo))
    }

    fn add_photo(
        &self,
        permit_id: PermitId,
        stage: PhotoStage,
        image: &[u8],
    ) -> Result<Photo, RepositoryError> {
        if image.is_empty() {
            return Err(RepositoryError::EmptyImage);
        }

        let conn = self.connection()?;
        if !permit_exists(&conn, permit_id)? {
            return Err(RepositoryError::NotFound);
        }
        insert_photo(&conn, permit_id, stage, image)
    }

    fn add_photo_with_status(
        &self,
        update: &StatusUpdate,
        stage: PhotoStage,
        image: &[u8],
    ) -> Result<Photo, RepositoryError> {
        if image.is_empty() {
            return Err(RepositoryError::EmptyImage);
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        apply_status(&tx, update)?;
        let photo = insert_photo(&tx, update.permit_id, stage, image)?;
        tx.commit()?;
        Ok(photo)
    }

    fn list_permits(&self) -> Result<Vec<Permit>, RepositoryError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT {PERMIT_COLUMNS} FROM permits ORDER BY id"))?;
        let permits = stmt
            .query_map([], row_to_permit)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(permits)
    }

    fn list_photos(&self, permit_id: PermitId) -> Result<Vec<Photo>, RepositoryError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, permit_id, stage, image_data, timestamp FROM photos
             WHERE permit_id = ?1 ORDER BY id",
        )?;
        let photos = stmt
            .query_map(params![permit_id.0], |row| {
                Ok(Photo {
                    id: PhotoId(row.get(0)?),
                    permit_id: PermitId(row.get(1)?),
                    stage: row.get(2)?,
                    image_data: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    fn update_status(&self, update: &StatusUpdate) -> Result<(), RepositoryError> {
        let conn = self.connection()?;
        apply_status(&conn, update)
    }

    fn get_permit(&self, permit_id: PermitId) -> Result<Option<Permit>, RepositoryError> {
        let conn = self.connection()?;
        let permit = conn
            .query_row(
                &format!("SELECT {PERMIT_COLUMNS} FROM permits WHERE id = ?1"),
                params![permit_id.0],
                row_to_permit,
            )
            .optional()?;
        Ok(permit)
    }
}

fn insert_permit(conn: &Connection, permit: &NewPermit) -> Result<PermitId, RepositoryError> {
    conn.execute(
        "INSERT INTO permits (contractor_name, work_type, location, description, status, request_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            permit.contractor_name,
            permit.work_type,
            permit.location,
            permit.description,
            PermitStatus::PendingReview,
            Utc::now(),
        ],
    )?;
    let id = PermitId(conn.last_insert_rowid());
    debug!(permit_id = %id, "permit row inserted");
    Ok(id)
}

fn insert_photo(
    conn: &Connection,
    permit_id: PermitId,
    stage: PhotoStage,
    image: &[u8],
) -> Result<Photo, RepositoryError> {
    let timestamp = Utc::now();
    conn.execute(
        "INSERT INTO photos (permit_id, stage, image_data, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![permit_id.0, stage, image, timestamp],
    )?;
    let id = PhotoId(conn.last_insert_rowid());
    debug!(permit_id = %permit_id, stage = stage.label(), bytes = image.len(), "photo row inserted");
    Ok(Photo {
        id,
        permit_id,
        stage,
        image_data: image.to_vec(),
        timestamp,
    })
}

/// Compare-and-set on the permit status.
fn apply_status(conn: &Connection, update: &StatusUpdate) -> Result<(), RepositoryError> {
    let changed = match &update.approver {
        Some(approver) => conn.execute(
            "UPDATE permits SET status = ?1, approval_date = ?2, approver_name = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                update.status,
                Utc::now(),
                approver,
                update.permit_id.0,
                update.expected,
            ],
        )?,
        None => conn.execute(
            "UPDATE permits SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![update.status, update.permit_id.0, update.expected],
        )?,
    };

    if changed == 0 {
        return if permit_exists(conn, update.permit_id)? {
            Err(RepositoryError::Conflict)
        } else {
            Err(RepositoryError::NotFound)
        };
    }

    Ok(())
}

fn permit_exists(conn: &Connection, permit_id: PermitId) -> Result<bool, RepositoryError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM permits WHERE id = ?1",
            params![permit_id.0],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn row_to_permit(row: &Row<'_>) -> rusqlite::Result<Permit> {
    Ok(Permit {
        id: PermitId(row.get(0)?),
        contractor_name: row.get(1)?,
        work_type: row.get(2)?,
        location: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        request_date: row.get(6)?,
        approval_date: row.get(7)?,
        approver_name: row.get(8)?,
    })
}

// Enumerations are stored by their display label so the database stays
// readable from any SQLite client.
macro_rules! sql_label {
    ($ty:ident) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.label()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err| FromSqlError::Other(Box::new(err)))
            }
        }
    };
}

sql_label!(WorkType);
sql_label!(PermitStatus);
sql_label!(PhotoStage);
