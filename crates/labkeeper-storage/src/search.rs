//! Name search over chemicals and equipment.
//!
//! Ranked search runs against the `chemicals_fts` / `equipment_fts` FTS5
//! tables, ordered by BM25 rank. Substring search is a plain `LIKE` scan
//! that prefers prefix matches, used when the ranked tier fails or comes up
//! empty.

use std::sync::Arc;

use labkeeper_core::error::LabError;
use labkeeper_core::types::{Chemical, Equipment};

use crate::db::{storage_err, Database};
use crate::inventory::{row_to_chemical, row_to_equipment, CHEMICAL_COLUMNS, EQUIPMENT_COLUMNS};

/// Turn free text into an FTS5 query of quoted prefix terms.
///
/// Every alphanumeric token becomes `"token"*`, joined with implicit AND,
/// so user input can never inject FTS5 operators. Returns `None` when the
/// input has no searchable tokens.
pub fn sanitize_fts5_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"*", t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Escape `LIKE` wildcards and wrap the input for a substring match.
fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn prefix_pattern(raw: &str) -> String {
    let escaped = raw
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{}%", escaped)
}

/// Search engine over the inventory name indexes.
pub struct FtsSearch {
    db: Arc<Database>,
}

impl FtsSearch {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Ranked full-text search over chemical name, category and hazard class.
    pub fn search_chemicals(&self, query: &str, limit: usize) -> Result<Vec<Chemical>, LabError> {
        let Some(fts_query) = sanitize_fts5_query(query) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {}
             FROM chemicals_fts
             JOIN chemicals c ON c.id = chemicals_fts.rowid
             WHERE chemicals_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
            CHEMICAL_COLUMNS
        );
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| LabError::Storage(format!("FTS5 query prepare failed: {}", e)))?;
            let rows = stmt
                .query_map(rusqlite::params![fts_query, limit as i64], row_to_chemical)
                .map_err(|e| LabError::Storage(format!("FTS5 query failed: {}", e)))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }

    /// Ranked full-text search over equipment name and category.
    pub fn search_equipment(&self, query: &str, limit: usize) -> Result<Vec<Equipment>, LabError> {
        let Some(fts_query) = sanitize_fts5_query(query) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {}
             FROM equipment_fts
             JOIN equipment e ON e.id = equipment_fts.rowid
             WHERE equipment_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
            EQUIPMENT_COLUMNS
        );
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| LabError::Storage(format!("FTS5 query prepare failed: {}", e)))?;
            let rows = stmt
                .query_map(rusqlite::params![fts_query, limit as i64], row_to_equipment)
                .map_err(|e| LabError::Storage(format!("FTS5 query failed: {}", e)))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }

    /// Substring search on chemical name or category, prefix hits first.
    pub fn substring_chemicals(&self, query: &str, limit: usize) -> Result<Vec<Chemical>, LabError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {}
             FROM chemicals c
             WHERE c.name LIKE ?1 ESCAPE '\\' OR c.category LIKE ?1 ESCAPE '\\'
             ORDER BY CASE WHEN c.name LIKE ?2 ESCAPE '\\' THEN 0 ELSE 1 END,
                      c.name COLLATE NOCASE
             LIMIT ?3",
            CHEMICAL_COLUMNS
        );
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![like_pattern(query), prefix_pattern(query), limit as i64],
                    row_to_chemical,
                )
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }

    /// Substring search on equipment name or category, prefix hits first.
    pub fn substring_equipment(&self, query: &str, limit: usize) -> Result<Vec<Equipment>, LabError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {}
             FROM equipment e
             WHERE e.name LIKE ?1 ESCAPE '\\' OR e.category LIKE ?1 ESCAPE '\\'
             ORDER BY CASE WHEN e.name LIKE ?2 ESCAPE '\\' THEN 0 ELSE 1 END,
                      e.name COLLATE NOCASE
             LIMIT ?3",
            EQUIPMENT_COLUMNS
        );
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![like_pattern(query), prefix_pattern(query), limit as i64],
                    row_to_equipment,
                )
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryRepository;
    use labkeeper_core::types::{NewChemical, NewEquipment};

    fn setup() -> (FtsSearch, InventoryRepository) {
        let db = Arc::new(Database::in_memory().unwrap());
        (FtsSearch::new(Arc::clone(&db)), InventoryRepository::new(db))
    }

    #[test]
    fn test_sanitize_fts5_query() {
        assert_eq!(
            sanitize_fts5_query("Sodium chloride").as_deref(),
            Some("\"sodium\"* \"chloride\"*")
        );
        assert_eq!(
            sanitize_fts5_query("acid\" OR name:*").as_deref(),
            Some("\"acid\"* \"or\"* \"name\"*")
        );
        assert_eq!(sanitize_fts5_query("  ?!  "), None);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" 50%_mix "), "%50\\%\\_mix%");
        assert_eq!(prefix_pattern("eth"), "eth%");
    }

    #[test]
    fn test_ranked_search_matches_prefixes() {
        let (search, repo) = setup();
        repo.add_chemical(&NewChemical::new("Sodium Chloride", "Salt", 100.0, "g")).unwrap();
        repo.add_chemical(&NewChemical::new("Sodium Hydroxide", "Base", 50.0, "g")).unwrap();
        repo.add_chemical(&NewChemical::new("Ethanol", "Solvent", 2.0, "L")).unwrap();

        let hits = search.search_chemicals("sod chlor", 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Sodium Chloride");

        assert_eq!(search.search_chemicals("sodium", 20).unwrap().len(), 2);
        assert!(search.search_chemicals("", 20).unwrap().is_empty());
    }

    #[test]
    fn test_ranked_search_respects_limit() {
        let (search, repo) = setup();
        for i in 0..5 {
            repo.add_equipment(&NewEquipment::new(&format!("Pipette {}", i), "Liquid handling"))
                .unwrap();
        }
        assert_eq!(search.search_equipment("pipette", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_substring_search_prefers_prefix_hits() {
        let (search, repo) = setup();
        repo.add_chemical(&NewChemical::new("Acetic Acid", "Acid", 1.0, "L")).unwrap();
        repo.add_chemical(&NewChemical::new("Hydrochloric Acid", "Acid", 1.0, "L")).unwrap();
        repo.add_chemical(&NewChemical::new("Chloroform", "Solvent", 1.0, "L")).unwrap();

        let hits = search.substring_chemicals("chlor", 20).unwrap();
        let names: Vec<&str> = hits.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Chloroform", "Hydrochloric Acid"]);
    }

    #[test]
    fn test_fts_index_follows_renames() {
        let (search, repo) = setup();
        let item = repo.add_equipment(&NewEquipment::new("Old Scope", "Optics")).unwrap();
        repo.db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE equipment SET name = 'Microscope' WHERE id = ?1",
                    [item.id],
                )
                .map_err(storage_err)?;
                Ok(())
            })
            .unwrap();
        assert!(search.search_equipment("old", 20).unwrap().is_empty());
        assert_eq!(search.search_equipment("microscope", 20).unwrap().len(), 1);
    }
}
