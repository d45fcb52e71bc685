use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::app::error::AppError;
use crate::app::models::AssetRecord;

/// Opens the downloaded payload as a database and requires a populated
/// `asset` table. The connection is scoped to this call, so the file handle
/// is released on every exit path.
pub fn validate_payload(path: &Path, trace_id: &str) -> Result<Vec<AssetRecord>, AppError> {
    let invalid = |detail: String| {
        AppError::invalid_payload_db(format!("Invalid payload received: {detail}"), trace_id)
    };

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|err| invalid(err.to_string()))?;
    let tables: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='asset'",
            [],
            |row| row.get(0),
        )
        .map_err(|err| invalid(err.to_string()))?;
    if tables == 0 {
        return Err(invalid("no asset table found".to_string()));
    }

    let mut statement = conn
        .prepare("SELECT pid, url, local_path FROM asset")
        .map_err(|err| invalid(err.to_string()))?;
    let records = statement
        .query_map([], |row| {
            Ok(AssetRecord {
                pid: row.get(0)?,
                url: row.get(1)?,
                local_path: row.get(2)?,
            })
        })
        .map_err(|err| invalid(err.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| invalid(err.to_string()))?;

    if records.is_empty() {
        return Err(invalid("no records in asset table".to_string()));
    }
    Ok(records)
}
