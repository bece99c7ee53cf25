//! Database schema migrations.
//!
//! Version 1 holds the lab inventory (users, chemicals, equipment,
//! borrowings, lecture schedules, usage log) with FTS5 indexes over
//! chemical and equipment names. Version 2 adds the chat tables.

use rusqlite::Connection;
use tracing::info;

use labkeeper_core::error::LabError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), LabError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| LabError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| LabError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: inventory_schema");
    }
    if current_version < 2 {
        apply_v2(conn)?;
        info!("Applied migration v2: chat_schema");
    }

    Ok(())
}

/// Version 1: inventory schema.
fn apply_v1(conn: &Connection) -> Result<(), LabError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            role            TEXT NOT NULL
                            CHECK (role IN ('admin', 'technician', 'borrower')),
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS chemicals (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            name                TEXT NOT NULL,
            category            TEXT NOT NULL DEFAULT '',
            quantity            REAL NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            unit                TEXT NOT NULL DEFAULT '',
            storage_location    TEXT,
            expiration_date     TEXT,
            safety_info         TEXT,
            hazard_class        TEXT,
            low_stock_threshold REAL,
            created_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_chemicals_name
            ON chemicals (name COLLATE NOCASE);

        CREATE INDEX IF NOT EXISTS idx_chemicals_expiration
            ON chemicals (expiration_date)
            WHERE expiration_date IS NOT NULL;

        CREATE TABLE IF NOT EXISTS equipment (
            id                        INTEGER PRIMARY KEY AUTOINCREMENT,
            name                      TEXT NOT NULL,
            category                  TEXT NOT NULL DEFAULT '',
            status                    TEXT NOT NULL DEFAULT 'available'
                                      CHECK (status IN ('available', 'in_use', 'maintenance', 'retired')),
            location                  TEXT,
            serial_number             TEXT,
            last_maintenance          TEXT,
            maintenance_interval_days INTEGER,
            calibration_due           TEXT,
            created_at                INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_equipment_name
            ON equipment (name COLLATE NOCASE);

        CREATE TABLE IF NOT EXISTS borrowings (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            borrower_id     INTEGER NOT NULL,
            equipment_id    INTEGER,
            chemical_id     INTEGER,
            quantity        REAL,
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'approved', 'rejected', 'returned', 'overdue')),
            purpose         TEXT NOT NULL DEFAULT '',
            start_date      TEXT NOT NULL,
            end_date        TEXT NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            CHECK (equipment_id IS NOT NULL OR chemical_id IS NOT NULL),
            FOREIGN KEY (borrower_id) REFERENCES users(id),
            FOREIGN KEY (equipment_id) REFERENCES equipment(id),
            FOREIGN KEY (chemical_id) REFERENCES chemicals(id)
        );

        CREATE INDEX IF NOT EXISTS idx_borrowings_borrower
            ON borrowings (borrower_id, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_borrowings_equipment
            ON borrowings (equipment_id, start_date)
            WHERE equipment_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS lecture_schedules (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            title               TEXT NOT NULL,
            technician_id       INTEGER,
            lecture_date        TEXT NOT NULL,
            start_time          TEXT NOT NULL,
            end_time            TEXT NOT NULL,
            room                TEXT NOT NULL DEFAULT '',
            status              TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'approved', 'rejected', 'completed')),
            required_equipment  TEXT,
            required_chemicals  TEXT,
            created_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (technician_id) REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_lecture_schedules_date
            ON lecture_schedules (lecture_date, start_time);

        CREATE TABLE IF NOT EXISTS chemical_usage_logs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            chemical_id     INTEGER NOT NULL,
            user_id         INTEGER NOT NULL,
            quantity_used   REAL NOT NULL CHECK (quantity_used > 0),
            remaining       REAL NOT NULL,
            purpose         TEXT,
            used_at         INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (chemical_id) REFERENCES chemicals(id),
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_usage_logs_user
            ON chemical_usage_logs (user_id, used_at DESC);

        -- Full-text indexes kept in sync by triggers.
        CREATE VIRTUAL TABLE IF NOT EXISTS chemicals_fts USING fts5(
            name, category, hazard_class,
            content='chemicals', content_rowid='id'
        );

        CREATE TRIGGER IF NOT EXISTS chemicals_fts_insert AFTER INSERT ON chemicals BEGIN
            INSERT INTO chemicals_fts (rowid, name, category, hazard_class)
            VALUES (new.id, new.name, new.category, COALESCE(new.hazard_class, ''));
        END;

        CREATE TRIGGER IF NOT EXISTS chemicals_fts_delete AFTER DELETE ON chemicals BEGIN
            INSERT INTO chemicals_fts (chemicals_fts, rowid, name, category, hazard_class)
            VALUES ('delete', old.id, old.name, old.category, COALESCE(old.hazard_class, ''));
        END;

        CREATE TRIGGER IF NOT EXISTS chemicals_fts_update AFTER UPDATE OF name, category, hazard_class ON chemicals BEGIN
            INSERT INTO chemicals_fts (chemicals_fts, rowid, name, category, hazard_class)
            VALUES ('delete', old.id, old.name, old.category, COALESCE(old.hazard_class, ''));
            INSERT INTO chemicals_fts (rowid, name, category, hazard_class)
            VALUES (new.id, new.name, new.category, COALESCE(new.hazard_class, ''));
        END;

        CREATE VIRTUAL TABLE IF NOT EXISTS equipment_fts USING fts5(
            name, category,
            content='equipment', content_rowid='id'
        );

        CREATE TRIGGER IF NOT EXISTS equipment_fts_insert AFTER INSERT ON equipment BEGIN
            INSERT INTO equipment_fts (rowid, name, category)
            VALUES (new.id, new.name, new.category);
        END;

        CREATE TRIGGER IF NOT EXISTS equipment_fts_delete AFTER DELETE ON equipment BEGIN
            INSERT INTO equipment_fts (equipment_fts, rowid, name, category)
            VALUES ('delete', old.id, old.name, old.category);
        END;

        CREATE TRIGGER IF NOT EXISTS equipment_fts_update AFTER UPDATE OF name, category ON equipment BEGIN
            INSERT INTO equipment_fts (equipment_fts, rowid, name, category)
            VALUES ('delete', old.id, old.name, old.category);
            INSERT INTO equipment_fts (rowid, name, category)
            VALUES (new.id, new.name, new.category);
        END;

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'inventory_schema');
        ",
    )
    .map_err(|e| LabError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

/// Version 2: conversations, context bag, chat audit log.
fn apply_v2(conn: &Connection) -> Result<(), LabError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id                  TEXT PRIMARY KEY NOT NULL,
            user_id             INTEGER NOT NULL,
            conversation_type   TEXT NOT NULL DEFAULT 'bot'
                                CHECK (conversation_type IN ('bot', 'live', 'support')),
            status              TEXT NOT NULL DEFAULT 'active'
                                CHECK (status IN ('active', 'closed', 'archived')),
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user_active
            ON conversations (user_id, conversation_type, status, updated_at DESC);

        CREATE TABLE IF NOT EXISTS conversation_context (
            conversation_id TEXT NOT NULL,
            context_key     TEXT NOT NULL,
            context_value   TEXT NOT NULL,
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (conversation_id, context_key),
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS chatbot_queries (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL,
            query_text      TEXT NOT NULL,
            response_text   TEXT NOT NULL,
            query_type      TEXT NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_chatbot_queries_user
            ON chatbot_queries (user_id, created_at DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (2, 'chat_schema');
        ",
    )
    .map_err(|e| LabError::Storage(format!("Failed to apply migration v2: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            > 0
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_all_tables_exist() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        for table in [
            "users",
            "chemicals",
            "equipment",
            "borrowings",
            "lecture_schedules",
            "chemical_usage_logs",
            "chemicals_fts",
            "equipment_fts",
            "conversations",
            "conversation_context",
            "chatbot_queries",
        ] {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
    }

    #[test]
    fn test_negative_quantity_rejected_by_schema() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO chemicals (name, quantity) VALUES ('Acetone', -1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_context_key_unique_per_conversation() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name, email, role) VALUES (1, 'Ana', 'ana@lab', 'borrower');
             INSERT INTO conversations (id, user_id, created_at, updated_at) VALUES ('c1', 1, 0, 0);
             INSERT INTO conversation_context (conversation_id, context_key, context_value)
                 VALUES ('c1', 'last_topic', 'chemicals');",
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO conversation_context (conversation_id, context_key, context_value)
             VALUES ('c1', 'last_topic', 'equipment')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_fts_trigger_indexes_new_chemicals() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO chemicals (name, category) VALUES ('Sodium Chloride', 'Salt')",
            [],
        )
        .unwrap();
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chemicals_fts WHERE chemicals_fts MATCH 'sodium'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }
}
