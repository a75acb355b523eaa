//! PostgreSQL schema definitions.

use tokio_postgres::Client;

use crate::error::{StoreError, StoreResult};
use crate::naming;
use crate::types::SearchParamType;

fn internal(message: impl Into<String>) -> StoreError {
    StoreError::Internal(message.into())
}

/// Creates the four fixed tables if they don't already exist.
pub async fn initialize_schema(client: &Client) -> StoreResult<()> {
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS \"REFERENCES\" (
                ID BIGSERIAL PRIMARY KEY,
                SOURCE_RESOURCE_TYPE TEXT NOT NULL,
                SOURCE_RESOURCE_ID TEXT NOT NULL,
                SOURCE_EXPRESSION TEXT NOT NULL,
                TARGET_RESOURCE_TYPE TEXT NOT NULL,
                TARGET_RESOURCE_ID TEXT NOT NULL,
                DISPLAY_VALUE TEXT,
                CREATED_AT TIMESTAMPTZ NOT NULL,
                UPDATED_AT TIMESTAMPTZ NOT NULL,
                LAST_UPDATED TIMESTAMPTZ NOT NULL
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
                ID BIGSERIAL PRIMARY KEY,
                RESOURCE_TYPE TEXT NOT NULL,
                RESOURCE_ID TEXT NOT NULL,
                PARAM_NAME TEXT NOT NULL,
                VALUE_TEXT TEXT,
                VALUE_NUMBER DOUBLE PRECISION,
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
                VERSION_ID BIGINT NOT NULL,
                OPERATION TEXT NOT NULL,
                SNAPSHOT TEXT NOT NULL,
                RECORDED_AT TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (RESOURCE_TYPE, RESOURCE_ID, VERSION_ID)
            );
            CREATE INDEX IF NOT EXISTS IDX_HISTORY_RESOURCE ON RESOURCE_HISTORY(RESOURCE_TYPE, RESOURCE_ID);",
        )
        .await
        .map_err(|e| internal(format!("failed to initialize fixed schema: {e}")))?;
    Ok(())
}

/// Creates `<Type>Table` if it doesn't exist, with the metadata columns
/// plus one set of columns per standard search parameter.
pub async fn ensure_resource_table(
    client: &Client,
    resource_type: &str,
    columns: &[(String, SearchParamType)],
) -> StoreResult<()> {
    let table = naming::table_name(resource_type);
    let pk = naming::primary_key(resource_type);
    let lower_table = table.to_lowercase();

    let existing = client
        .query(
            "SELECT 1 FROM information_schema.tables WHERE table_name = $1",
            &[&lower_table],
        )
        .await
        .map_err(|e| internal(format!("failed to check existence of {table}: {e}")))?;
    if !existing.is_empty() {
        return ensure_columns(client, &table, columns).await;
    }

    let mut ddl = format!(
        "CREATE TABLE {table} (\n    {pk} TEXT PRIMARY KEY,\n    VERSION_ID BIGINT NOT NULL,\n    \
         CREATED_AT TIMESTAMPTZ NOT NULL,\n    LAST_UPDATED TIMESTAMPTZ NOT NULL,\n    CONTENT TEXT NOT NULL"
    );
    for (name, param_type) in columns {
        for (column, sql_type) in naming::column_specs(name, *param_type) {
            let pg_type = if sql_type == "REAL" { "DOUBLE PRECISION" } else { sql_type };
            ddl.push_str(&format!(",\n    {column} {pg_type}"));
        }
    }
    ddl.push_str("\n)");

    client
        .batch_execute(&ddl)
        .await
        .map_err(|e| internal(format!("failed to create {table}: {e}")))?;
    Ok(())
}

async fn ensure_columns(
    client: &Client,
    table: &str,
    columns: &[(String, SearchParamType)],
) -> StoreResult<()> {
    let existing = table_columns(client, table).await?;
    for (name, param_type) in columns {
        for (column, sql_type) in naming::column_specs(name, *param_type) {
            if !existing.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
                let pg_type = if sql_type == "REAL" { "DOUBLE PRECISION" } else { sql_type };
                let ddl = format!("ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {column} {pg_type}");
                client
                    .batch_execute(&ddl)
                    .await
                    .map_err(|e| internal(format!("failed to add column {column} to {table}: {e}")))?;
            }
        }
    }
    Ok(())
}

/// Live column names of `table` (uppercased to match the naming
/// convention used everywhere else, since PostgreSQL folds unquoted
/// identifiers to lowercase in its catalog).
pub async fn table_columns(client: &Client, table: &str) -> StoreResult<Vec<String>> {
    let rows = client
        .query(
            "SELECT column_name FROM information_schema.columns WHERE table_name = $1",
            &[&table.to_lowercase()],
        )
        .await
        .map_err(|e| internal(format!("failed to introspect {table}: {e}")))?;
    Ok(rows
        .iter()
        .map(|row| row.get::<_, String>(0).to_uppercase())
        .collect())
}
