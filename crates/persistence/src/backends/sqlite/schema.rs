//! SQLite schema definitions.

use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};
use crate::naming;
use crate::types::SearchParamType;

fn internal(message: impl Into<String>) -> StoreError {
    StoreError::Internal(message.into())
}

/// Creates the four fixed tables (`REFERENCES`, `SEARCH_PARAM_RES_EXPRESSIONS`,
/// `CUSTOM_EXTENSION_SEARCH_PARAMS`, `RESOURCE_HISTORY`) if they don't
/// already exist.
pub fn initialize_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"REFERENCES\" (
            ID INTEGER PRIMARY KEY AUTOINCREMENT,
            SOURCE_RESOURCE_TYPE TEXT NOT NULL,
            SOURCE_RESOURCE_ID TEXT NOT NULL,
            SOURCE_EXPRESSION TEXT NOT NULL,
            TARGET_RESOURCE_TYPE TEXT NOT NULL,
            TARGET_RESOURCE_ID TEXT NOT NULL,
            DISPLAY_VALUE TEXT,
            CREATED_AT TEXT NOT NULL,
            UPDATED_AT TEXT NOT NULL,
            LAST_UPDATED TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS IDX_REFERENCES_SOURCE ON \"REFERENCES\"(SOURCE_RESOURCE_TYPE, SOURCE_RESOURCE_ID);
        CREATE INDEX IF NOT EXISTS IDX_REFERENCES_TARGET ON \"REFERENCES\"(TARGET_RESOURCE_TYPE, TARGET_RESOURCE_ID);

        CREATE TABLE IF NOT EXISTS SEARCH_PARAM_RES_EXPRESSIONS (
            SEARCH_PARAM_NAME TEXT NOT NULL,
            SEARCH_PARAM_TYPE TEXT NOT NULL,
            RESOURCE_NAME TEXT NOT NULL,
            EXPRESSION TEXT NOT NULL,
            IS_CUSTOM BOOLEAN NOT NULL DEFAULT FALSE
        );
        CREATE INDEX IF NOT EXISTS IDX_SEARCH_PARAM_RESOURCE ON SEARCH_PARAM_RES_EXPRESSIONS(RESOURCE_NAME);

        CREATE TABLE IF NOT EXISTS CUSTOM_EXTENSION_SEARCH_PARAMS (
            ID INTEGER PRIMARY KEY AUTOINCREMENT,
            RESOURCE_TYPE TEXT NOT NULL,
            RESOURCE_ID TEXT NOT NULL,
            PARAM_NAME TEXT NOT NULL,
            VALUE_TEXT TEXT,
            VALUE_NUMBER REAL,
            VALUE_DATE TEXT,
            VALUE_TOKEN_SYSTEM TEXT,
            VALUE_TOKEN_CODE TEXT,
            VALUE_REFERENCE_TYPE TEXT,
            VALUE_REFERENCE_ID TEXT
        );
        CREATE INDEX IF NOT EXISTS IDX_CUSTOM_PARAM_LOOKUP
            ON CUSTOM_EXTENSION_SEARCH_PARAMS(RESOURCE_TYPE, PARAM_NAME);
        CREATE INDEX IF NOT EXISTS IDX_CUSTOM_PARAM_RESOURCE
            ON CUSTOM_EXTENSION_SEARCH_PARAMS(RESOURCE_TYPE, RESOURCE_ID);

        CREATE TABLE IF NOT EXISTS RESOURCE_HISTORY (
            RESOURCE_TYPE TEXT NOT NULL,
            RESOURCE_ID TEXT NOT NULL,
            VERSION_ID INTEGER NOT NULL,
            OPERATION TEXT NOT NULL,
            SNAPSHOT TEXT NOT NULL,
            RECORDED_AT TEXT NOT NULL,
            PRIMARY KEY (RESOURCE_TYPE, RESOURCE_ID, VERSION_ID)
        );
        CREATE INDEX IF NOT EXISTS IDX_HISTORY_RESOURCE ON RESOURCE_HISTORY(RESOURCE_TYPE, RESOURCE_ID);",
    )
    .map_err(|e| internal(format!("failed to initialize fixed schema: {e}")))?;
    Ok(())
}

/// Creates `<Type>Table` if it doesn't exist, with the metadata columns
/// plus one set of columns per standard search parameter.
pub fn ensure_resource_table(
    conn: &Connection,
    resource_type: &str,
    columns: &[(String, SearchParamType)],
) -> StoreResult<()> {
    let table = naming::table_name(resource_type);
    let pk = naming::primary_key(resource_type);

    let existing: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [&table],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if existing {
        return ensure_columns(conn, &table, columns);
    }

    let mut ddl = format!(
        "CREATE TABLE {table} (\n    {pk} TEXT PRIMARY KEY,\n    VERSION_ID INTEGER NOT NULL,\n    \
         CREATED_AT TEXT NOT NULL,\n    LAST_UPDATED TEXT NOT NULL,\n    CONTENT TEXT NOT NULL"
    );
    for (name, param_type) in columns {
        for (column, sql_type) in naming::column_specs(name, *param_type) {
            ddl.push_str(&format!(",\n    {column} {sql_type}"));
        }
    }
    ddl.push_str("\n)");

    conn.execute(&ddl, [])
        .map_err(|e| internal(format!("failed to create {table}: {e}")))?;
    Ok(())
}

/// Adds any columns from `columns` that the live table doesn't have yet —
/// handles a `SearchParameter` resource introducing a new custom parameter
/// for a type that already has a table.
fn ensure_columns(
    conn: &Connection,
    table: &str,
    columns: &[(String, SearchParamType)],
) -> StoreResult<()> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| internal(format!("failed to introspect {table}: {e}")))?;
    let existing: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| internal(format!("failed to introspect {table}: {e}")))?
        .filter_map(Result::ok)
        .collect();

    for (name, param_type) in columns {
        for (column, sql_type) in naming::column_specs(name, *param_type) {
            if !existing.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
                conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}"), [])
                    .map_err(|e| internal(format!("failed to add column {column} to {table}: {e}")))?;
            }
        }
    }
    Ok(())
}

/// Live column names of `table`, in schema order.
pub fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| internal(format!("failed to introspect {table}: {e}")))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| internal(format!("failed to introspect {table}: {e}")))?
        .filter_map(Result::ok)
        .collect();
    Ok(columns)
}
