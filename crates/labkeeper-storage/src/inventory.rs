//! Inventory repository: read queries over users, chemicals, equipment,
//! borrowings, lecture schedules and the usage log, plus the inserts used
//! to stock a fresh database.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use labkeeper_core::error::LabError;
use labkeeper_core::traits::LabReader;
use labkeeper_core::types::{
    Borrowing, Chemical, Equipment, LectureSchedule, NewChemical, NewEquipment,
    NewLectureSchedule, Role, UsageRecord, User,
};

use crate::db::{storage_err, Database};
use crate::search::FtsSearch;

pub(crate) const CHEMICAL_COLUMNS: &str = "c.id, c.name, c.category, c.quantity, c.unit, \
     c.storage_location, c.expiration_date, c.safety_info, c.hazard_class, c.low_stock_threshold";

pub(crate) const EQUIPMENT_COLUMNS: &str = "e.id, e.name, e.category, e.status, e.location, \
     e.serial_number, e.last_maintenance, e.maintenance_interval_days, e.calibration_due";

const BORROWING_SELECT: &str = "SELECT b.id, b.borrower_id, b.equipment_id, b.chemical_id, \
     b.quantity, b.status, b.purpose, b.start_date, b.end_date, b.created_at, \
     COALESCE(e.name, c.name, '') \
     FROM borrowings b \
     LEFT JOIN equipment e ON e.id = b.equipment_id \
     LEFT JOIN chemicals c ON c.id = b.chemical_id";

const SCHEDULE_SELECT: &str = "SELECT id, title, technician_id, lecture_date, start_time, \
     end_time, room, status, required_equipment, required_chemicals \
     FROM lecture_schedules";

/// SQLite-backed implementation of [`LabReader`].
pub struct InventoryRepository {
    pub(crate) db: Arc<Database>,
    fts: FtsSearch,
}

impl InventoryRepository {
    pub fn new(db: Arc<Database>) -> Self {
        let fts = FtsSearch::new(Arc::clone(&db));
        Self { db, fts }
    }

    /// Insert a user and return the stored record.
    pub fn add_user(&self, name: &str, email: &str, role: Role) -> Result<User, LabError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, email, role) VALUES (?1, ?2, ?3)",
                params![name, email, role.to_string()],
            )
            .map_err(storage_err)?;
            Ok(User {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                email: email.to_string(),
                role,
            })
        })
    }

    pub fn add_chemical(&self, chemical: &NewChemical) -> Result<Chemical, LabError> {
        self.db.with_conn(|conn| insert_chemical(conn, chemical))
    }

    pub fn add_equipment(&self, equipment: &NewEquipment) -> Result<Equipment, LabError> {
        self.db.with_conn(|conn| insert_equipment(conn, equipment))
    }

    pub fn add_schedule(&self, schedule: &NewLectureSchedule) -> Result<LectureSchedule, LabError> {
        self.db.with_conn(|conn| insert_schedule(conn, schedule))
    }

    pub fn chemical_by_id(&self, id: i64) -> Result<Option<Chemical>, LabError> {
        self.db.with_conn(|conn| chemical_by_id(conn, id))
    }

    pub fn equipment_by_id(&self, id: i64) -> Result<Option<Equipment>, LabError> {
        self.db.with_conn(|conn| equipment_by_id(conn, id))
    }

    pub fn schedule_by_id(&self, id: i64) -> Result<Option<LectureSchedule>, LabError> {
        self.db.with_conn(|conn| schedule_by_id(conn, id))
    }

    fn query_chemicals(
        &self,
        tail: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Chemical>, LabError> {
        let sql = format!("SELECT {} FROM chemicals c {}", CHEMICAL_COLUMNS, tail);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(params, row_to_chemical)
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }

    fn query_equipment(
        &self,
        tail: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Equipment>, LabError> {
        let sql = format!("SELECT {} FROM equipment e {}", EQUIPMENT_COLUMNS, tail);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(params, row_to_equipment)
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }

    fn query_borrowings(
        &self,
        tail: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Borrowing>, LabError> {
        let sql = format!("{} {}", BORROWING_SELECT, tail);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(params, row_to_borrowing)
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }

    fn query_schedules(
        &self,
        tail: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<LectureSchedule>, LabError> {
        let sql = format!("{} {}", SCHEDULE_SELECT, tail);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(params, row_to_schedule)
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }

    fn count(&self, sql: &str) -> Result<u64, LabError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(storage_err)?;
            Ok(n as u64)
        })
    }
}

impl LabReader for InventoryRepository {
    fn user_by_id(&self, id: i64) -> Result<Option<User>, LabError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, role FROM users WHERE id = ?1",
                [id],
                row_to_user,
            )
            .optional()
            .map_err(storage_err)
        })
    }

    fn list_chemicals(&self) -> Result<Vec<Chemical>, LabError> {
        self.query_chemicals("ORDER BY c.name COLLATE NOCASE", [])
    }

    fn count_chemicals(&self) -> Result<u64, LabError> {
        self.count("SELECT COUNT(*) FROM chemicals")
    }

    fn chemical_by_exact_name(&self, name: &str) -> Result<Option<Chemical>, LabError> {
        Ok(self
            .query_chemicals("WHERE c.name = ?1 LIMIT 1", [name])?
            .into_iter()
            .next())
    }

    fn chemical_by_name_ci(&self, name: &str) -> Result<Option<Chemical>, LabError> {
        Ok(self
            .query_chemicals(
                "WHERE lower(trim(c.name)) = lower(trim(?1)) ORDER BY c.id LIMIT 1",
                [name],
            )?
            .into_iter()
            .next())
    }

    fn search_chemicals_ranked(&self, query: &str, limit: usize) -> Result<Vec<Chemical>, LabError> {
        self.fts.search_chemicals(query, limit)
    }

    fn search_chemicals_substring(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Chemical>, LabError> {
        self.fts.substring_chemicals(query, limit)
    }

    fn low_stock_chemicals(&self, default_threshold: f64) -> Result<Vec<Chemical>, LabError> {
        self.query_chemicals(
            "WHERE c.quantity <= COALESCE(c.low_stock_threshold, ?1) ORDER BY c.quantity ASC",
            [default_threshold],
        )
    }

    fn expiring_chemicals(
        &self,
        today: NaiveDate,
        within_days: i64,
    ) -> Result<Vec<Chemical>, LabError> {
        let until = today + chrono::Duration::days(within_days);
        self.query_chemicals(
            "WHERE c.expiration_date IS NOT NULL
               AND c.expiration_date >= ?1 AND c.expiration_date <= ?2
             ORDER BY c.expiration_date ASC",
            params![today, until],
        )
    }

    fn expired_chemicals(&self, today: NaiveDate) -> Result<Vec<Chemical>, LabError> {
        self.query_chemicals(
            "WHERE c.expiration_date IS NOT NULL AND c.expiration_date < ?1
             ORDER BY c.expiration_date ASC",
            [today],
        )
    }

    fn list_equipment(&self) -> Result<Vec<Equipment>, LabError> {
        self.query_equipment("ORDER BY e.name COLLATE NOCASE", [])
    }

    fn count_equipment(&self) -> Result<u64, LabError> {
        self.count("SELECT COUNT(*) FROM equipment")
    }

    fn equipment_by_exact_name(&self, name: &str) -> Result<Option<Equipment>, LabError> {
        Ok(self
            .query_equipment("WHERE e.name = ?1 LIMIT 1", [name])?
            .into_iter()
            .next())
    }

    fn equipment_by_name_ci(&self, name: &str) -> Result<Option<Equipment>, LabError> {
        Ok(self
            .query_equipment(
                "WHERE lower(trim(e.name)) = lower(trim(?1)) ORDER BY e.id LIMIT 1",
                [name],
            )?
            .into_iter()
            .next())
    }

    fn search_equipment_ranked(&self, query: &str, limit: usize) -> Result<Vec<Equipment>, LabError> {
        self.fts.search_equipment(query, limit)
    }

    fn search_equipment_substring(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Equipment>, LabError> {
        self.fts.substring_equipment(query, limit)
    }

    fn maintenance_due_equipment(&self, today: NaiveDate) -> Result<Vec<Equipment>, LabError> {
        self.query_equipment(
            "WHERE e.status != 'retired'
               AND (e.status = 'maintenance'
                    OR (e.last_maintenance IS NOT NULL
                        AND e.maintenance_interval_days IS NOT NULL
                        AND date(e.last_maintenance, '+' || e.maintenance_interval_days || ' days') <= ?1))
             ORDER BY e.name COLLATE NOCASE",
            [today],
        )
    }

    fn calibration_due_equipment(
        &self,
        today: NaiveDate,
        within_days: i64,
    ) -> Result<Vec<Equipment>, LabError> {
        let until = today + chrono::Duration::days(within_days);
        self.query_equipment(
            "WHERE e.status != 'retired'
               AND e.calibration_due IS NOT NULL AND e.calibration_due <= ?1
             ORDER BY e.calibration_due ASC",
            [until],
        )
    }

    fn equipment_conflicts(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Borrowing>, LabError> {
        self.query_borrowings(
            "WHERE b.equipment_id = ?1
               AND b.status IN ('pending', 'approved')
               AND b.start_date <= ?3 AND b.end_date >= ?2
             ORDER BY b.start_date ASC",
            params![equipment_id, from, to],
        )
    }

    fn recent_bookings(&self, equipment_id: i64, limit: usize) -> Result<Vec<Borrowing>, LabError> {
        self.query_borrowings(
            "WHERE b.equipment_id = ?1 ORDER BY b.start_date DESC, b.id DESC LIMIT ?2",
            params![equipment_id, limit as i64],
        )
    }

    fn borrowings_by_borrower(
        &self,
        borrower_id: i64,
        limit: usize,
    ) -> Result<Vec<Borrowing>, LabError> {
        self.query_borrowings(
            "WHERE b.borrower_id = ?1 ORDER BY b.created_at DESC, b.id DESC LIMIT ?2",
            params![borrower_id, limit as i64],
        )
    }

    fn pending_borrowings(&self, limit: usize) -> Result<Vec<Borrowing>, LabError> {
        self.query_borrowings(
            "WHERE b.status = 'pending' ORDER BY b.created_at ASC, b.id ASC LIMIT ?1",
            [limit as i64],
        )
    }

    fn count_pending_borrowings(&self, borrower_id: Option<i64>) -> Result<u64, LabError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM borrowings
                     WHERE status = 'pending' AND (?1 IS NULL OR borrower_id = ?1)",
                    [borrower_id],
                    |row| row.get(0),
                )
                .map_err(storage_err)?;
            Ok(n as u64)
        })
    }

    fn schedules_on(&self, date: NaiveDate) -> Result<Vec<LectureSchedule>, LabError> {
        self.query_schedules("WHERE lecture_date = ?1 ORDER BY start_time ASC", [date])
    }

    fn upcoming_schedules(
        &self,
        from: NaiveDate,
        limit: usize,
    ) -> Result<Vec<LectureSchedule>, LabError> {
        self.query_schedules(
            "WHERE lecture_date >= ?1 AND status != 'rejected'
             ORDER BY lecture_date ASC, start_time ASC LIMIT ?2",
            params![from, limit as i64],
        )
    }

    fn usage_history(&self, user_id: i64, limit: usize) -> Result<Vec<UsageRecord>, LabError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, chemical_id, user_id, quantity_used, remaining, purpose, used_at
                     FROM chemical_usage_logs
                     WHERE user_id = ?1
                     ORDER BY used_at DESC, id DESC
                     LIMIT ?2",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(params![user_id, limit as i64], row_to_usage)
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }
}

// =============================================================================
// Inserts shared with seeding and transactions
// =============================================================================

pub(crate) fn insert_chemical(conn: &Connection, c: &NewChemical) -> Result<Chemical, LabError> {
    if c.quantity < 0.0 {
        return Err(LabError::validation("quantity", "must not be negative"));
    }
    conn.execute(
        "INSERT INTO chemicals (name, category, quantity, unit, storage_location,
                                expiration_date, safety_info, hazard_class, low_stock_threshold)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            c.name,
            c.category,
            c.quantity,
            c.unit,
            c.storage_location,
            c.expiration_date,
            c.safety_info,
            c.hazard_class,
            c.low_stock_threshold,
        ],
    )
    .map_err(storage_err)?;
    let id = conn.last_insert_rowid();
    chemical_by_id(conn, id)?.ok_or(LabError::NotFound {
        entity: "chemical",
        id,
    })
}

pub(crate) fn insert_equipment(conn: &Connection, e: &NewEquipment) -> Result<Equipment, LabError> {
    conn.execute(
        "INSERT INTO equipment (name, category, status, location, serial_number,
                                last_maintenance, maintenance_interval_days, calibration_due)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            e.name,
            e.category,
            e.status.to_string(),
            e.location,
            e.serial_number,
            e.last_maintenance,
            e.maintenance_interval_days,
            e.calibration_due,
        ],
    )
    .map_err(storage_err)?;
    let id = conn.last_insert_rowid();
    equipment_by_id(conn, id)?.ok_or(LabError::NotFound {
        entity: "equipment",
        id,
    })
}

pub(crate) fn insert_schedule(
    conn: &Connection,
    s: &NewLectureSchedule,
) -> Result<LectureSchedule, LabError> {
    if s.end_time <= s.start_time {
        return Err(LabError::validation("end_time", "must be after start_time"));
    }
    conn.execute(
        "INSERT INTO lecture_schedules (title, technician_id, lecture_date, start_time, end_time,
                                        room, required_equipment, required_chemicals)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            s.title,
            s.technician_id,
            s.lecture_date,
            s.start_time,
            s.end_time,
            s.room,
            s.required_equipment,
            s.required_chemicals,
        ],
    )
    .map_err(storage_err)?;
    let id = conn.last_insert_rowid();
    schedule_by_id(conn, id)?.ok_or(LabError::NotFound {
        entity: "lecture schedule",
        id,
    })
}

pub(crate) fn chemical_by_id(conn: &Connection, id: i64) -> Result<Option<Chemical>, LabError> {
    let sql = format!("SELECT {} FROM chemicals c WHERE c.id = ?1", CHEMICAL_COLUMNS);
    conn.query_row(&sql, [id], row_to_chemical)
        .optional()
        .map_err(storage_err)
}

pub(crate) fn equipment_by_id(conn: &Connection, id: i64) -> Result<Option<Equipment>, LabError> {
    let sql = format!("SELECT {} FROM equipment e WHERE e.id = ?1", EQUIPMENT_COLUMNS);
    conn.query_row(&sql, [id], row_to_equipment)
        .optional()
        .map_err(storage_err)
}

pub(crate) fn borrowing_by_id(conn: &Connection, id: i64) -> Result<Option<Borrowing>, LabError> {
    let sql = format!("{} WHERE b.id = ?1", BORROWING_SELECT);
    conn.query_row(&sql, [id], row_to_borrowing)
        .optional()
        .map_err(storage_err)
}

pub(crate) fn schedule_by_id(
    conn: &Connection,
    id: i64,
) -> Result<Option<LectureSchedule>, LabError> {
    let sql = format!("{} WHERE id = ?1", SCHEDULE_SELECT);
    conn.query_row(&sql, [id], row_to_schedule)
        .optional()
        .map_err(storage_err)
}

// =============================================================================
// Row mapping
// =============================================================================

/// Parse a TEXT column into one of the status enums.
fn parse_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub(crate) fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_column(3, row.get(3)?)?,
    })
}

pub(crate) fn row_to_chemical(row: &Row<'_>) -> rusqlite::Result<Chemical> {
    Ok(Chemical {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        quantity: row.get(3)?,
        unit: row.get(4)?,
        storage_location: row.get(5)?,
        expiration_date: row.get(6)?,
        safety_info: row.get(7)?,
        hazard_class: row.get(8)?,
        low_stock_threshold: row.get(9)?,
    })
}

pub(crate) fn row_to_equipment(row: &Row<'_>) -> rusqlite::Result<Equipment> {
    Ok(Equipment {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        status: parse_column(3, row.get(3)?)?,
        location: row.get(4)?,
        serial_number: row.get(5)?,
        last_maintenance: row.get(6)?,
        maintenance_interval_days: row.get(7)?,
        calibration_due: row.get(8)?,
    })
}

fn row_to_borrowing(row: &Row<'_>) -> rusqlite::Result<Borrowing> {
    Ok(Borrowing {
        id: row.get(0)?,
        borrower_id: row.get(1)?,
        equipment_id: row.get(2)?,
        chemical_id: row.get(3)?,
        quantity: row.get(4)?,
        status: parse_column(5, row.get(5)?)?,
        purpose: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        created_at: timestamp(row.get(9)?),
        item_name: row.get(10)?,
    })
}

fn row_to_schedule(row: &Row<'_>) -> rusqlite::Result<LectureSchedule> {
    Ok(LectureSchedule {
        id: row.get(0)?,
        title: row.get(1)?,
        technician_id: row.get(2)?,
        lecture_date: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        room: row.get(6)?,
        status: parse_column(7, row.get(7)?)?,
        required_equipment: row.get(8)?,
        required_chemicals: row.get(9)?,
    })
}

pub(crate) fn row_to_usage(row: &Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        id: row.get(0)?,
        chemical_id: row.get(1)?,
        user_id: row.get(2)?,
        quantity_used: row.get(3)?,
        remaining_quantity: row.get(4)?,
        purpose: row.get(5)?,
        used_at: timestamp(row.get(6)?),
    })
}
