use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

pub fn open_database(path: &Path) -> Result<Connection, InfraError> {
    let connection = Connection::open(path)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    Ok(connection)
}

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = open_database(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent_and_creates_preferences_table() {
        let path = std::env::temp_dir().join(format!("alrua-storage-{}.sqlite", std::process::id()));
        let _ = std::fs::remove_file(&path);

        initialize_database(&path).expect("first init");
        initialize_database(&path).expect("second init");

        let connection = open_database(&path).expect("open");
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'preferences'",
                [],
                |row| row.get(0),
            )
            .expect("query schema");
        assert_eq!(count, 1);

        drop(connection);
        let _ = std::fs::remove_file(&path);
    }
}
