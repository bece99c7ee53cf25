//! Inventory writes that must be atomic.
//!
//! Each operation runs inside one immediate transaction on the shared
//! connection: read, check, write, commit. Any failure rolls the whole
//! sequence back and propagates to the caller.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use labkeeper_core::error::LabError;
use labkeeper_core::types::{Borrowing, LectureSchedule, NewBorrowing, ScheduleStatus, UsageRecord};

use crate::db::storage_err;
use crate::inventory::{
    borrowing_by_id, chemical_by_id, equipment_by_id, schedule_by_id, timestamp, InventoryRepository,
};

impl InventoryRepository {
    /// Record usage of a chemical and decrement its stock.
    ///
    /// The decrement is a guarded `UPDATE .. WHERE quantity >= ?`, so two
    /// concurrent requests can never both consume the same stock and the
    /// remaining quantity never drops below zero.
    pub fn log_usage(
        &self,
        chemical_id: i64,
        user_id: i64,
        quantity_used: f64,
        purpose: Option<&str>,
    ) -> Result<UsageRecord, LabError> {
        if !(quantity_used > 0.0) {
            return Err(LabError::validation("quantity_used", "must be greater than zero"));
        }

        let record = self.db.with_transaction(|tx| {
            let available: f64 = tx
                .query_row(
                    "SELECT quantity FROM chemicals WHERE id = ?1",
                    [chemical_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err)?
                .ok_or(LabError::NotFound {
                    entity: "chemical",
                    id: chemical_id,
                })?;

            if available < quantity_used {
                return Err(LabError::InsufficientQuantity {
                    requested: quantity_used,
                    available,
                });
            }

            let now = Utc::now().timestamp();
            let updated = tx
                .execute(
                    "UPDATE chemicals SET quantity = quantity - ?1, updated_at = ?2
                     WHERE id = ?3 AND quantity >= ?1",
                    params![quantity_used, now, chemical_id],
                )
                .map_err(storage_err)?;
            if updated == 0 {
                return Err(LabError::InsufficientQuantity {
                    requested: quantity_used,
                    available,
                });
            }

            let remaining = available - quantity_used;
            tx.execute(
                "INSERT INTO chemical_usage_logs (chemical_id, user_id, quantity_used, remaining, purpose, used_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![chemical_id, user_id, quantity_used, remaining, purpose, now],
            )
            .map_err(storage_err)?;

            Ok(UsageRecord {
                id: tx.last_insert_rowid(),
                chemical_id,
                user_id,
                quantity_used,
                remaining_quantity: remaining,
                purpose: purpose.map(str::to_string),
                used_at: timestamp(now),
            })
        });

        match &record {
            Ok(r) => info!(
                chemical_id,
                user_id,
                quantity_used,
                remaining = r.remaining_quantity,
                "Logged chemical usage"
            ),
            Err(e) => warn!(chemical_id, user_id, quantity_used, error = %e, "Chemical usage rejected"),
        }
        record
    }

    /// Create a pending borrowing request.
    ///
    /// Chemical requests need enough stock for the requested quantity.
    /// Equipment requests need a bookable item with no pending or approved
    /// booking overlapping the requested window.
    pub fn create_borrowing(&self, request: &NewBorrowing) -> Result<Borrowing, LabError> {
        if request.equipment_id.is_none() && request.chemical_id.is_none() {
            return Err(LabError::validation(
                "item",
                "a borrowing needs an equipment_id or a chemical_id",
            ));
        }
        if request.end_date < request.start_date {
            return Err(LabError::validation("end_date", "must not be before start_date"));
        }

        let borrowing = self.db.with_transaction(|tx| {
            let borrower_exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                    [request.borrower_id],
                    |row| row.get(0),
                )
                .map_err(storage_err)?;
            if !borrower_exists {
                return Err(LabError::NotFound {
                    entity: "user",
                    id: request.borrower_id,
                });
            }

            if let Some(chemical_id) = request.chemical_id {
                let chemical = chemical_by_id(tx, chemical_id)?.ok_or(LabError::NotFound {
                    entity: "chemical",
                    id: chemical_id,
                })?;
                let requested = request.quantity.ok_or_else(|| {
                    LabError::validation("quantity", "required when borrowing a chemical")
                })?;
                if !(requested > 0.0) {
                    return Err(LabError::validation("quantity", "must be greater than zero"));
                }
                if chemical.quantity < requested {
                    return Err(LabError::InsufficientQuantity {
                        requested,
                        available: chemical.quantity,
                    });
                }
            }

            if let Some(equipment_id) = request.equipment_id {
                let equipment = equipment_by_id(tx, equipment_id)?.ok_or(LabError::NotFound {
                    entity: "equipment",
                    id: equipment_id,
                })?;
                if !equipment.status.is_bookable() {
                    return Err(LabError::Conflict(format!(
                        "{} is {} and cannot be booked",
                        equipment.name, equipment.status
                    )));
                }
                let overlapping: i64 = tx
                    .query_row(
                        "SELECT COUNT(*) FROM borrowings
                         WHERE equipment_id = ?1
                           AND status IN ('pending', 'approved')
                           AND start_date <= ?3 AND end_date >= ?2",
                        params![equipment_id, request.start_date, request.end_date],
                        |row| row.get(0),
                    )
                    .map_err(storage_err)?;
                if overlapping > 0 {
                    return Err(LabError::Conflict(format!(
                        "{} is already booked between {} and {}",
                        equipment.name, request.start_date, request.end_date
                    )));
                }
            }

            tx.execute(
                "INSERT INTO borrowings (borrower_id, equipment_id, chemical_id, quantity, status,
                                         purpose, start_date, end_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?8)",
                params![
                    request.borrower_id,
                    request.equipment_id,
                    request.chemical_id,
                    request.quantity,
                    request.purpose,
                    request.start_date,
                    request.end_date,
                    Utc::now().timestamp(),
                ],
            )
            .map_err(storage_err)?;

            let id = tx.last_insert_rowid();
            borrowing_by_id(tx, id)?.ok_or(LabError::NotFound {
                entity: "borrowing",
                id,
            })
        })?;

        info!(
            borrowing_id = borrowing.id,
            borrower_id = borrowing.borrower_id,
            item = %borrowing.item_name,
            "Created borrowing request"
        );
        Ok(borrowing)
    }

    /// Move a lecture schedule to a new status and return the updated row.
    pub fn update_schedule_status(
        &self,
        schedule_id: i64,
        status: ScheduleStatus,
    ) -> Result<LectureSchedule, LabError> {
        let schedule = self.db.with_transaction(|tx| {
            let updated = tx
                .execute(
                    "UPDATE lecture_schedules SET status = ?1 WHERE id = ?2",
                    params![status.to_string(), schedule_id],
                )
                .map_err(storage_err)?;
            if updated == 0 {
                return Err(LabError::NotFound {
                    entity: "lecture schedule",
                    id: schedule_id,
                });
            }
            schedule_by_id(tx, schedule_id)?.ok_or(LabError::NotFound {
                entity: "lecture schedule",
                id: schedule_id,
            })
        })?;

        info!(schedule_id, status = %status, "Updated lecture schedule status");
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::db::Database;
    use labkeeper_core::traits::LabReader;
    use labkeeper_core::types::{
        BorrowingStatus, EquipmentStatus, NewChemical, NewEquipment, NewLectureSchedule, Role,
    };

    fn make_repo() -> Arc<InventoryRepository> {
        Arc::new(InventoryRepository::new(Arc::new(Database::in_memory().unwrap())))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn equipment_request(borrower_id: i64, equipment_id: i64, start: NaiveDate, end: NaiveDate) -> NewBorrowing {
        NewBorrowing {
            borrower_id,
            equipment_id: Some(equipment_id),
            chemical_id: None,
            quantity: None,
            purpose: "practical".to_string(),
            start_date: start,
            end_date: end,
        }
    }

    #[test]
    fn test_log_usage_decrements_stock() {
        let repo = make_repo();
        let user = repo.add_user("Ana", "ana@lab.test", Role::Technician).unwrap();
        let chem = repo.add_chemical(&NewChemical::new("Ethanol", "Solvent", 10.0, "L")).unwrap();

        let record = repo.log_usage(chem.id, user.id, 4.0, Some("cleaning")).unwrap();
        assert_eq!(record.remaining_quantity, 6.0);
        assert_eq!(repo.chemical_by_id(chem.id).unwrap().unwrap().quantity, 6.0);
        assert_eq!(repo.usage_history(user.id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_log_usage_rejects_overdraw_without_side_effects() {
        let repo = make_repo();
        let user = repo.add_user("Ana", "ana@lab.test", Role::Technician).unwrap();
        let chem = repo.add_chemical(&NewChemical::new("Ethanol", "Solvent", 3.0, "L")).unwrap();

        let err = repo.log_usage(chem.id, user.id, 5.0, None).unwrap_err();
        assert!(matches!(err, LabError::InsufficientQuantity { .. }));
        assert_eq!(repo.chemical_by_id(chem.id).unwrap().unwrap().quantity, 3.0);
        assert!(repo.usage_history(user.id, 10).unwrap().is_empty());

        assert!(matches!(
            repo.log_usage(chem.id, user.id, 0.0, None).unwrap_err(),
            LabError::Validation { .. }
        ));
        assert!(matches!(
            repo.log_usage(999, user.id, 1.0, None).unwrap_err(),
            LabError::NotFound { .. }
        ));
    }

    #[test]
    fn test_concurrent_usage_never_goes_negative() {
        let repo = make_repo();
        let user = repo.add_user("Ana", "ana@lab.test", Role::Technician).unwrap();
        let chem = repo.add_chemical(&NewChemical::new("Acetone", "Solvent", 10.0, "L")).unwrap();
        let (chem_id, user_id) = (chem.id, user.id);

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let repo = Arc::clone(&repo);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    repo.log_usage(chem_id, user_id, 6.0, None)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let rejections = results
            .iter()
            .filter(|r| matches!(r, Err(LabError::InsufficientQuantity { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(rejections, 1);
        assert_eq!(repo.chemical_by_id(chem.id).unwrap().unwrap().quantity, 4.0);
    }

    #[test]
    fn test_many_concurrent_small_withdrawals() {
        let repo = make_repo();
        let user = repo.add_user("Ana", "ana@lab.test", Role::Technician).unwrap();
        let chem = repo.add_chemical(&NewChemical::new("Acetone", "Solvent", 10.0, "L")).unwrap();
        let (chem_id, user_id) = (chem.id, user.id);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || repo.log_usage(chem_id, user_id, 3.0, None).is_ok())
            })
            .collect();
        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(ok, 3);
        assert_eq!(repo.chemical_by_id(chem.id).unwrap().unwrap().quantity, 1.0);
    }

    #[test]
    fn test_create_equipment_borrowing_checks_overlap() {
        let repo = make_repo();
        let user = repo.add_user("Ben", "ben@lab.test", Role::Borrower).unwrap();
        let item = repo.add_equipment(&NewEquipment::new("Centrifuge", "Separation")).unwrap();

        let first = repo
            .create_borrowing(&equipment_request(user.id, item.id, date(2026, 10, 20), date(2026, 10, 21)))
            .unwrap();
        assert_eq!(first.status, BorrowingStatus::Pending);
        assert_eq!(first.item_name, "Centrifuge");

        let clash = repo
            .create_borrowing(&equipment_request(user.id, item.id, date(2026, 10, 21), date(2026, 10, 22)))
            .unwrap_err();
        assert!(matches!(clash, LabError::Conflict(_)));

        repo.create_borrowing(&equipment_request(user.id, item.id, date(2026, 10, 22), date(2026, 10, 23)))
            .unwrap();
    }

    #[test]
    fn test_create_borrowing_rejects_unbookable_equipment() {
        let repo = make_repo();
        let user = repo.add_user("Ben", "ben@lab.test", Role::Borrower).unwrap();
        let mut new = NewEquipment::new("Autoclave", "Sterilization");
        new.status = EquipmentStatus::Maintenance;
        let item = repo.add_equipment(&new).unwrap();

        let err = repo
            .create_borrowing(&equipment_request(user.id, item.id, date(2026, 10, 20), date(2026, 10, 20)))
            .unwrap_err();
        assert!(matches!(err, LabError::Conflict(_)));
    }

    #[test]
    fn test_create_chemical_borrowing_checks_stock() {
        let repo = make_repo();
        let user = repo.add_user("Ben", "ben@lab.test", Role::Borrower).unwrap();
        let chem = repo.add_chemical(&NewChemical::new("Glucose", "Sugar", 50.0, "g")).unwrap();

        let mut request = NewBorrowing {
            borrower_id: user.id,
            equipment_id: None,
            chemical_id: Some(chem.id),
            quantity: Some(80.0),
            purpose: "culture media".to_string(),
            start_date: date(2026, 10, 20),
            end_date: date(2026, 10, 20),
        };
        assert!(matches!(
            repo.create_borrowing(&request).unwrap_err(),
            LabError::InsufficientQuantity { .. }
        ));

        request.quantity = Some(20.0);
        let created = repo.create_borrowing(&request).unwrap();
        assert_eq!(created.chemical_id, Some(chem.id));
        assert_eq!(repo.count_pending_borrowings(Some(user.id)).unwrap(), 1);
    }

    #[test]
    fn test_create_borrowing_validates_shape() {
        let repo = make_repo();
        let user = repo.add_user("Ben", "ben@lab.test", Role::Borrower).unwrap();
        let mut request = equipment_request(user.id, 1, date(2026, 10, 21), date(2026, 10, 20));
        assert!(matches!(
            repo.create_borrowing(&request).unwrap_err(),
            LabError::Validation { .. }
        ));

        request.end_date = date(2026, 10, 22);
        request.borrower_id = 999;
        assert!(matches!(
            repo.create_borrowing(&request).unwrap_err(),
            LabError::NotFound { entity: "user", .. }
        ));
    }

    #[test]
    fn test_update_schedule_status() {
        let repo = make_repo();
        let lecture = repo
            .add_schedule(&NewLectureSchedule {
                title: "Spectroscopy".to_string(),
                technician_id: None,
                lecture_date: date(2026, 10, 20),
                start_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
                room: "Lab 2".to_string(),
                required_equipment: None,
                required_chemicals: None,
            })
            .unwrap();

        let updated = repo
            .update_schedule_status(lecture.id, ScheduleStatus::Approved)
            .unwrap();
        assert_eq!(updated.status, ScheduleStatus::Approved);
        assert!(matches!(
            repo.update_schedule_status(999, ScheduleStatus::Approved).unwrap_err(),
            LabError::NotFound { .. }
        ));
    }
}
