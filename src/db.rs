use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::cache::{CachedRcExpiry, RcExpiryCache};
use crate::error::{FleetError, Result};
use crate::expiry::parse_expiry;
use crate::models::{DocType, OtherExpense, VehicleRecord};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vehicles (
    id INTEGER PRIMARY KEY,
    registration_number TEXT NOT NULL UNIQUE,
    registration_date TEXT,
    owner_name TEXT,
    maker_model TEXT,
    rc_expiry_date TEXT,
    rc_cost REAL,
    insurance_expiry_date TEXT,
    insurance_premium_amount REAL,
    fitness_expiry_date TEXT,
    fitness_cost REAL,
    permit_expiry_date TEXT,
    permit_cost REAL,
    puc_expiry_date TEXT,
    puc_cost REAL,
    tax_expiry_date TEXT,
    tax_amount REAL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS vehicle_documents (
    id INTEGER PRIMARY KEY,
    vehicle_id INTEGER NOT NULL,
    doc_type TEXT NOT NULL,
    url TEXT NOT NULL,
    uploaded_at TEXT DEFAULT (datetime('now')),
    UNIQUE (vehicle_id, doc_type, url),
    FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS other_expenses (
    id INTEGER PRIMARY KEY,
    vehicle_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    amount REAL NOT NULL,
    description TEXT,
    FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS rc_expiry_cache (
    vehicle_id INTEGER PRIMARY KEY,
    registration_date TEXT NOT NULL,
    rc_expiry_date TEXT NOT NULL,
    FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn vehicle_columns() -> String {
    let mut cols = vec![
        "id".to_string(),
        "registration_number".to_string(),
        "registration_date".to_string(),
        "owner_name".to_string(),
        "maker_model".to_string(),
    ];
    for doc in DocType::ALL {
        cols.push(doc.expiry_column().to_string());
        cols.push(doc.cost_column().to_string());
    }
    cols.join(", ")
}

fn row_to_vehicle(row: &rusqlite::Row) -> rusqlite::Result<VehicleRecord> {
    let mut v = VehicleRecord {
        id: row.get(0)?,
        registration_number: row.get(1)?,
        registration_date: row.get(2)?,
        owner_name: row.get(3)?,
        maker_model: row.get(4)?,
        ..VehicleRecord::default()
    };
    for (i, doc) in DocType::ALL.iter().enumerate() {
        let slot = v.slot_mut(*doc);
        slot.expiry_date = row.get(5 + i * 2)?;
        slot.cost = row.get(6 + i * 2)?;
    }
    Ok(v)
}

/// Read the whole fleet, documents and expenses included, ordered by
/// registration number.
pub fn load_vehicles(conn: &Connection) -> Result<Vec<VehicleRecord>> {
    let sql = format!(
        "SELECT {} FROM vehicles ORDER BY registration_number",
        vehicle_columns()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut vehicles: Vec<VehicleRecord> = stmt
        .query_map([], row_to_vehicle)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let index: HashMap<i64, usize> = vehicles.iter().enumerate().map(|(i, v)| (v.id, i)).collect();

    let mut doc_stmt =
        conn.prepare("SELECT vehicle_id, doc_type, url FROM vehicle_documents ORDER BY id")?;
    let docs: Vec<(i64, String, String)> = doc_stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (vehicle_id, doc_type, url) in docs {
        let (Some(&i), Ok(doc)) = (index.get(&vehicle_id), doc_type.parse::<DocType>()) else {
            continue;
        };
        vehicles[i].slot_mut(doc).urls.push(url);
    }

    let mut exp_stmt = conn.prepare(
        "SELECT vehicle_id, date, amount, description FROM other_expenses ORDER BY date, id",
    )?;
    let expenses: Vec<(i64, OtherExpense)> = exp_stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                OtherExpense {
                    date: row.get(1)?,
                    amount: row.get(2)?,
                    description: row.get(3)?,
                },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (vehicle_id, expense) in expenses {
        if let Some(&i) = index.get(&vehicle_id) {
            vehicles[i].other_expenses.push(expense);
        }
    }

    Ok(vehicles)
}

pub fn find_vehicle_id(conn: &Connection, registration_number: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM vehicles WHERE registration_number = ?1",
        [registration_number],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| FleetError::UnknownVehicle(registration_number.to_string()))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

pub fn add_vehicle(
    conn: &Connection,
    registration_number: &str,
    registration_date: Option<&str>,
    owner_name: Option<&str>,
    maker_model: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO vehicles (registration_number, registration_date, owner_name, maker_model) \
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![registration_number, registration_date, owner_name, maker_model],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert the vehicle if it is new, otherwise return the existing id.
pub fn ensure_vehicle(conn: &Connection, registration_number: &str) -> Result<(i64, bool)> {
    match find_vehicle_id(conn, registration_number) {
        Ok(id) => Ok((id, false)),
        Err(FleetError::UnknownVehicle(_)) => {
            Ok((add_vehicle(conn, registration_number, None, None, None)?, true))
        }
        Err(e) => Err(e),
    }
}

pub fn remove_vehicle(conn: &Connection, registration_number: &str) -> Result<()> {
    let id = find_vehicle_id(conn, registration_number)?;
    conn.execute("DELETE FROM vehicles WHERE id = ?1", [id])?;
    Ok(())
}

/// Update a vehicle's profile fields; `None` leaves the stored value alone.
pub fn update_profile(
    conn: &Connection,
    vehicle_id: i64,
    registration_date: Option<&str>,
    owner_name: Option<&str>,
    maker_model: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE vehicles SET \
         registration_date = COALESCE(?1, registration_date), \
         owner_name = COALESCE(?2, owner_name), \
         maker_model = COALESCE(?3, maker_model), \
         updated_at = datetime('now') \
         WHERE id = ?4",
        rusqlite::params![registration_date, owner_name, maker_model, vehicle_id],
    )?;
    Ok(())
}

/// Set a document's expiry date and/or cost; `None` leaves the stored value alone.
pub fn set_document(
    conn: &Connection,
    vehicle_id: i64,
    doc: DocType,
    expiry_date: Option<&str>,
    cost: Option<f64>,
) -> Result<()> {
    if let Some(raw) = expiry_date {
        if parse_expiry(raw).is_none() {
            return Err(FleetError::Other(format!(
                "Invalid expiry date for {}: {raw} (expected YYYY-MM-DD)",
                doc.label()
            )));
        }
    }
    let sql = format!(
        "UPDATE vehicles SET {exp} = COALESCE(?1, {exp}), {cost} = COALESCE(?2, {cost}), \
         updated_at = datetime('now') WHERE id = ?3",
        exp = doc.expiry_column(),
        cost = doc.cost_column(),
    );
    conn.execute(&sql, rusqlite::params![expiry_date, cost, vehicle_id])?;
    Ok(())
}

/// Attach a stored document URL. Returns false if it was already attached.
pub fn add_document_url(conn: &Connection, vehicle_id: i64, doc: DocType, url: &str) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO vehicle_documents (vehicle_id, doc_type, url) VALUES (?1, ?2, ?3)",
        rusqlite::params![vehicle_id, doc.key(), url],
    )?;
    Ok(changed > 0)
}

pub fn add_other_expense(
    conn: &Connection,
    vehicle_id: i64,
    date: &str,
    amount: f64,
    description: Option<&str>,
) -> Result<()> {
    if parse_expiry(date).is_none() {
        return Err(FleetError::Other(format!("Invalid expense date: {date} (expected YYYY-MM-DD)")));
    }
    conn.execute(
        "INSERT INTO other_expenses (vehicle_id, date, amount, description) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![vehicle_id, date, amount, description],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// RC expiry cache persistence
// ---------------------------------------------------------------------------

pub fn load_rc_cache(conn: &Connection) -> Result<RcExpiryCache> {
    let mut stmt =
        conn.prepare("SELECT vehicle_id, registration_date, rc_expiry_date FROM rc_expiry_cache")?;
    let rows: Vec<(i64, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RcExpiryCache::from_entries(rows.into_iter().filter_map(
        |(id, registration_date, rc_expiry)| {
            Some((
                id,
                CachedRcExpiry {
                    registration_date,
                    rc_expiry: parse_expiry(&rc_expiry)?,
                },
            ))
        },
    )))
}

pub fn save_rc_cache(conn: &Connection, cache: &RcExpiryCache) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM rc_expiry_cache", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO rc_expiry_cache (vehicle_id, registration_date, rc_expiry_date) \
             SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM vehicles WHERE id = ?1)",
        )?;
        for (id, entry) in cache.entries() {
            stmt.execute(rusqlite::params![
                id,
                entry.registration_date,
                entry.rc_expiry.format("%Y-%m-%d").to_string()
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["vehicles", "vehicle_documents", "other_expenses", "imports", "rc_expiry_cache"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_load_vehicles_assembles_slots() {
        let (_dir, conn) = test_db();
        let id = add_vehicle(&conn, "MH12AB1234", Some("2014-02-01"), Some("R. Sharma"), None).unwrap();
        set_document(&conn, id, DocType::Insurance, Some("2025-08-01"), Some(16_500.0)).unwrap();
        add_document_url(&conn, id, DocType::Insurance, "https://files.test/ins.pdf").unwrap();
        add_other_expense(&conn, id, "2025-04-10", 2_400.0, Some("Battery")).unwrap();

        let fleet = load_vehicles(&conn).unwrap();
        assert_eq!(fleet.len(), 1);
        let v = &fleet[0];
        assert_eq!(v.registration_date.as_deref(), Some("2014-02-01"));
        assert_eq!(v.insurance.expiry_date.as_deref(), Some("2025-08-01"));
        assert_eq!(v.insurance.cost, Some(16_500.0));
        assert_eq!(v.insurance.urls, vec!["https://files.test/ins.pdf".to_string()]);
        assert!(v.permit.expiry_date.is_none());
        assert_eq!(v.other_expenses.len(), 1);
        assert_eq!(v.other_expenses[0].amount, 2_400.0);
    }

    #[test]
    fn test_set_document_keeps_unspecified_fields() {
        let (_dir, conn) = test_db();
        let id = add_vehicle(&conn, "MH12AB1234", None, None, None).unwrap();
        set_document(&conn, id, DocType::Tax, Some("2025-09-30"), Some(11_000.0)).unwrap();
        set_document(&conn, id, DocType::Tax, None, Some(11_500.0)).unwrap();
        let v = &load_vehicles(&conn).unwrap()[0];
        assert_eq!(v.tax.expiry_date.as_deref(), Some("2025-09-30"));
        assert_eq!(v.tax.cost, Some(11_500.0));
    }

    #[test]
    fn test_set_document_rejects_bad_date() {
        let (_dir, conn) = test_db();
        let id = add_vehicle(&conn, "MH12AB1234", None, None, None).unwrap();
        let err = set_document(&conn, id, DocType::Puc, Some("31/12/2025"), None).unwrap_err();
        assert!(err.to_string().contains("PUC"));
    }

    #[test]
    fn test_duplicate_document_url_ignored() {
        let (_dir, conn) = test_db();
        let id = add_vehicle(&conn, "MH12AB1234", None, None, None).unwrap();
        assert!(add_document_url(&conn, id, DocType::Rc, "https://files.test/rc.pdf").unwrap());
        assert!(!add_document_url(&conn, id, DocType::Rc, "https://files.test/rc.pdf").unwrap());
    }

    #[test]
    fn test_unknown_vehicle() {
        let (_dir, conn) = test_db();
        let err = find_vehicle_id(&conn, "KA01X1").unwrap_err();
        assert!(matches!(err, FleetError::UnknownVehicle(_)));
    }

    #[test]
    fn test_ensure_vehicle() {
        let (_dir, conn) = test_db();
        let (id, created) = ensure_vehicle(&conn, "MH12AB1234").unwrap();
        assert!(created);
        let (again, created) = ensure_vehicle(&conn, "MH12AB1234").unwrap();
        assert_eq!(id, again);
        assert!(!created);
    }

    #[test]
    fn test_remove_vehicle_cascades() {
        let (_dir, conn) = test_db();
        let id = add_vehicle(&conn, "MH12AB1234", None, None, None).unwrap();
        add_document_url(&conn, id, DocType::Rc, "https://files.test/rc.pdf").unwrap();
        remove_vehicle(&conn, "MH12AB1234").unwrap();
        let docs: i64 = conn.query_row("SELECT count(*) FROM vehicle_documents", [], |r| r.get(0)).unwrap();
        assert_eq!(docs, 0);
    }

    #[test]
    fn test_rc_cache_roundtrip() {
        let (_dir, conn) = test_db();
        let id = add_vehicle(&conn, "MH12AB1234", Some("2012-01-15"), None, None).unwrap();
        let fleet = load_vehicles(&conn).unwrap();
        let mut cache = RcExpiryCache::new();
        cache.rc_expiry(&fleet[0]);
        save_rc_cache(&conn, &cache).unwrap();

        let loaded = load_rc_cache(&conn).unwrap();
        let entry = loaded.get(id).unwrap();
        assert_eq!(entry.registration_date, "2012-01-15");
        assert_eq!(entry.rc_expiry.format("%Y-%m-%d").to_string(), "2027-01-15");
    }
}
