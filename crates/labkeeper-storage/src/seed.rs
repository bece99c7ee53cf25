//! Demo inventory for a fresh database.

use chrono::{Duration, NaiveDate, NaiveTime};
use rusqlite::params;
use tracing::info;

use labkeeper_core::error::LabError;
use labkeeper_core::types::{EquipmentStatus, NewChemical, NewEquipment, NewLectureSchedule};

use crate::db::{storage_err, Database};
use crate::inventory::{insert_chemical, insert_equipment, insert_schedule};

/// What a seeding run inserted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub chemicals: usize,
    pub equipment: usize,
    pub schedules: usize,
}

/// Insert demo users, chemicals, equipment and lectures relative to `today`.
///
/// Does nothing when the database already holds users or inventory, so it
/// is safe to run on every start.
pub fn seed_demo(db: &Database, today: NaiveDate) -> Result<SeedSummary, LabError> {
    let summary = db.with_transaction(|tx| {
        let existing: i64 = tx
            .query_row(
                "SELECT (SELECT COUNT(*) FROM users) + (SELECT COUNT(*) FROM chemicals)
                      + (SELECT COUNT(*) FROM equipment)",
                [],
                |row| row.get(0),
            )
            .map_err(storage_err)?;
        if existing > 0 {
            return Ok(SeedSummary::default());
        }

        let mut summary = SeedSummary::default();

        let users = [
            ("Dana Admin", "admin@lab.local", "admin"),
            ("Tomas Tech", "tech@lab.local", "technician"),
            ("Bea Borrower", "student@lab.local", "borrower"),
        ];
        for (name, email, role) in users {
            tx.execute(
                "INSERT INTO users (name, email, role) VALUES (?1, ?2, ?3)",
                params![name, email, role],
            )
            .map_err(storage_err)?;
            summary.users += 1;
        }
        let technician_id: i64 = tx
            .query_row(
                "SELECT id FROM users WHERE role = 'technician' LIMIT 1",
                [],
                |row| row.get(0),
            )
            .map_err(storage_err)?;

        let mut chemicals = vec![
            NewChemical::new("Sodium Chloride", "Salt", 100.0, "g"),
            NewChemical::new("Ethanol", "Solvent", 2.5, "L"),
            NewChemical::new("Hydrochloric Acid", "Acid", 500.0, "mL"),
            NewChemical::new("Sodium Hydroxide", "Base", 8.0, "g"),
            NewChemical::new("Hydrogen Peroxide", "Oxidizer", 1.0, "L"),
        ];
        chemicals[0].safety_info = Some("Low hazard. Avoid eye contact.".to_string());
        chemicals[0].storage_location = Some("Cabinet A1".to_string());
        chemicals[1].hazard_class = Some("Flammable".to_string());
        chemicals[1].low_stock_threshold = Some(0.5);
        chemicals[1].safety_info =
            Some("Keep away from open flames. Store in a ventilated cabinet.".to_string());
        chemicals[2].hazard_class = Some("Corrosive".to_string());
        chemicals[2].safety_info =
            Some("Wear gloves and goggles. Handle in a fume hood.".to_string());
        chemicals[3].hazard_class = Some("Corrosive".to_string());
        chemicals[3].low_stock_threshold = Some(20.0);
        chemicals[4].hazard_class = Some("Oxidizer".to_string());
        chemicals[4].low_stock_threshold = Some(0.2);
        chemicals[4].expiration_date = Some(today + Duration::days(20));
        for chemical in &chemicals {
            insert_chemical(tx, chemical)?;
            summary.chemicals += 1;
        }

        let mut equipment = vec![
            NewEquipment::new("Centrifuge", "Separation"),
            NewEquipment::new("Microscope", "Optics"),
            NewEquipment::new("Analytical Balance", "Weighing"),
            NewEquipment::new("Autoclave", "Sterilization"),
        ];
        equipment[0].location = Some("Lab 1".to_string());
        equipment[0].last_maintenance = Some(today - Duration::days(200));
        equipment[0].maintenance_interval_days = Some(180);
        equipment[1].location = Some("Lab 2".to_string());
        equipment[2].calibration_due = Some(today + Duration::days(5));
        equipment[3].status = EquipmentStatus::Maintenance;
        for item in &equipment {
            insert_equipment(tx, item)?;
            summary.equipment += 1;
        }

        let lectures = [
            ("Acid-base titration", today, (9, 0), (11, 0), "Lab 1"),
            ("Microscopy practical", today + Duration::days(1), (13, 0), (15, 0), "Lab 2"),
        ];
        for (title, lecture_date, (sh, sm), (eh, em), room) in lectures {
            let (Some(start_time), Some(end_time)) = (
                NaiveTime::from_hms_opt(sh, sm, 0),
                NaiveTime::from_hms_opt(eh, em, 0),
            ) else {
                continue;
            };
            insert_schedule(
                tx,
                &NewLectureSchedule {
                    title: title.to_string(),
                    technician_id: Some(technician_id),
                    lecture_date,
                    start_time,
                    end_time,
                    room: room.to_string(),
                    required_equipment: None,
                    required_chemicals: None,
                },
            )?;
            summary.schedules += 1;
        }

        Ok(summary)
    })?;

    if summary.users > 0 {
        info!(
            users = summary.users,
            chemicals = summary.chemicals,
            equipment = summary.equipment,
            schedules = summary.schedules,
            "Seeded demo inventory"
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::inventory::InventoryRepository;
    use labkeeper_core::traits::LabReader;

    #[test]
    fn test_seed_populates_empty_database_once() {
        let db = Arc::new(Database::in_memory().unwrap());
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        let first = seed_demo(&db, today).unwrap();
        assert_eq!(first.users, 3);
        assert_eq!(first.chemicals, 5);
        assert_eq!(first.equipment, 4);
        assert_eq!(first.schedules, 2);

        let second = seed_demo(&db, today).unwrap();
        assert_eq!(second, SeedSummary::default());

        let repo = InventoryRepository::new(db);
        assert_eq!(repo.count_chemicals().unwrap(), 5);
        assert_eq!(repo.schedules_on(today).unwrap().len(), 1);
        let low = repo.low_stock_chemicals(10.0).unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Sodium Hydroxide");
        assert_eq!(repo.maintenance_due_equipment(today).unwrap().len(), 2);
    }
}
