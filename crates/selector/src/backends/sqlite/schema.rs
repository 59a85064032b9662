//! SQLite schema for pages, templates and field tables.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{ExecutionError, SchemaError, SelectorResult};
use crate::fieldtypes::StorageKind;
use crate::schema::{FieldDefinition, SchemaRegistry};

fn exec_failed(sql: &str) -> impl Fn(rusqlite::Error) -> ExecutionError + '_ {
    move |e| ExecutionError::QueryFailed {
        message: e.to_string(),
        sql: sql.to_string(),
    }
}

const CORE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pages (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER NOT NULL DEFAULT 0,
        templates_id INTEGER NOT NULL DEFAULT 0,
        name TEXT NOT NULL DEFAULT '',
        status INTEGER NOT NULL DEFAULT 1,
        sort INTEGER NOT NULL DEFAULT 0,
        created TEXT,
        modified TEXT,
        published TEXT,
        created_users_id INTEGER NOT NULL DEFAULT 0,
        modified_users_id INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_pages_parent ON pages(parent_id, sort);
    CREATE INDEX IF NOT EXISTS idx_pages_template ON pages(templates_id);
    CREATE INDEX IF NOT EXISTS idx_pages_name ON pages(name, parent_id);

    CREATE TABLE IF NOT EXISTS templates (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS pages_parents (
        pages_id INTEGER NOT NULL,
        parents_id INTEGER NOT NULL,
        PRIMARY KEY (pages_id, parents_id)
    );
    CREATE INDEX IF NOT EXISTS idx_pages_parents_parent ON pages_parents(parents_id);

    CREATE TABLE IF NOT EXISTS pages_access (
        pages_id INTEGER PRIMARY KEY,
        templates_id INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_pages_access_template ON pages_access(templates_id);
";

/// Creates the `pages`, `templates`, `pages_parents` and `pages_access` tables.
pub fn install_core(conn: &Connection) -> SelectorResult<()> {
    conn.execute_batch(CORE_SCHEMA)
        .map_err(exec_failed(CORE_SCHEMA))?;
    Ok(())
}

/// Mirrors the registry's templates into the `templates` table.
pub fn sync_templates(conn: &Connection, registry: &SchemaRegistry) -> SelectorResult<()> {
    const SQL: &str = "INSERT INTO templates (id, name) VALUES (?1, ?2)
        ON CONFLICT(id) DO UPDATE SET name = excluded.name";
    for template in registry.templates() {
        conn.execute(SQL, rusqlite::params![template.id, template.name])
            .map_err(exec_failed(SQL))?;
    }
    Ok(())
}

/// Creates the storage table of one field.
///
/// Single-value tables key on `pages_id`; multi-value tables only index it.
pub fn create_field_table(conn: &Connection, field: &FieldDefinition) -> SelectorResult<()> {
    let fieldtype = &field.fieldtype;
    let mut columns = vec![match fieldtype.storage() {
        StorageKind::SingleValue => "pages_id INTEGER PRIMARY KEY".to_string(),
        StorageKind::MultiValue => "pages_id INTEGER NOT NULL".to_string(),
    }];
    columns.extend(
        fieldtype
            .columns()
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type)),
    );

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        field.table,
        columns.join(", ")
    );
    sql.push_str(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_data ON {table}({column});",
        table = field.table,
        column = fieldtype.primary_column()
    ));
    if fieldtype.storage() == StorageKind::MultiValue {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_pages ON {table}(pages_id);",
            table = field.table
        ));
    }

    debug!(table = %field.table, "creating field table");
    conn.execute_batch(&sql).map_err(exec_failed(&sql))?;
    Ok(())
}

/// Checks that a field table exists and has every column its type declares.
pub fn verify_field_table(conn: &Connection, field: &FieldDefinition) -> SelectorResult<()> {
    let sql = format!("PRAGMA table_info({})", field.table);
    let mut stmt = conn.prepare(&sql).map_err(exec_failed(&sql))?;
    let existing: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(exec_failed(&sql))?
        .collect::<Result<_, _>>()
        .map_err(exec_failed(&sql))?;

    if existing.is_empty() {
        return Err(SchemaError::MissingTable {
            table: field.table.clone(),
        }
        .into());
    }

    let required = std::iter::once("pages_id").chain(field.fieldtype.columns().iter().map(|c| c.name));
    for column in required {
        if !existing.iter().any(|c| c == column) {
            return Err(SchemaError::MissingColumn {
                table: field.table.clone(),
                column: column.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Installs the core schema, the registry's templates and every field table.
pub fn install(conn: &Connection, registry: &SchemaRegistry) -> SelectorResult<()> {
    install_core(conn)?;
    sync_templates(conn, registry)?;
    let mut tables = 0;
    for field in registry.fields() {
        create_field_table(conn, field)?;
        tables += 1;
    }
    info!(
        templates = registry.templates().count(),
        field_tables = tables,
        "installed sqlite schema"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldtypes::{IntegerField, PageRefField};
    use crate::schema::TemplateDefinition;
    use std::sync::Arc;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register_template(TemplateDefinition::new(1, "basic"))
            .unwrap();
        registry
            .register_field(FieldDefinition::new("views", Arc::new(IntegerField)).unwrap())
            .unwrap();
        registry
            .register_field(FieldDefinition::new("refs", Arc::new(PageRefField)).unwrap())
            .unwrap();
        registry
    }

    #[test]
    fn test_install_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = registry();
        install(&conn, &registry).unwrap();
        install(&conn, &registry).unwrap();

        let name: String = conn
            .query_row("SELECT name FROM templates WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "basic");
        for field in registry.fields() {
            verify_field_table(&conn, field).unwrap();
        }
    }

    #[test]
    fn test_multi_value_table_allows_many_rows() {
        let conn = Connection::open_in_memory().unwrap();
        install(&conn, &registry()).unwrap();
        conn.execute_batch(
            "INSERT INTO field_refs (pages_id, data, sort) VALUES (5, 1, 0), (5, 2, 1);",
        )
        .unwrap();
        assert!(
            conn.execute_batch("INSERT INTO field_views (pages_id, data) VALUES (5, 1), (5, 2);")
                .is_err()
        );
    }

    #[test]
    fn test_verify_reports_missing_table_and_column() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = registry();
        let views = registry.field("views").unwrap();

        let err = verify_field_table(&conn, &views).unwrap_err();
        assert!(err.is_schema());

        conn.execute_batch("CREATE TABLE field_views (pages_id INTEGER)").unwrap();
        let err = verify_field_table(&conn, &views).unwrap_err();
        assert!(err.to_string().contains("missing required column data"));
    }
}
