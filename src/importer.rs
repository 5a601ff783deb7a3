use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::db::{add_document_url, ensure_vehicle, set_document, update_profile};
use crate::error::Result;
use crate::expiry::parse_expiry;
use crate::models::{normalize_registration, DocType, ParsedVehicle};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw
        .replace(',', "")
        .replace('"', "")
        .replace('\u{20b9}', "")
        .replace("Rs.", "")
        .replace("INR", "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let value = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => -inner.trim().parse::<f64>().ok()?,
        None => s.parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

pub fn parse_date_dmy(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split(['/', '-', '.']).collect();
    if parts.len() != 3 || parts[2].len() != 4 {
        return None;
    }
    let d: u32 = parts[0].parse().ok()?;
    let m: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(y, m, d).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Normalize an imported date to `YYYY-MM-DD`; ISO dates, timestamps and
/// `DD/MM/YYYY` are accepted.
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_expiry(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .or_else(|| parse_date_dmy(raw))
}

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_date(serial: f64) -> Option<String> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    // 2_958_465 is 9999-12-31, the last date Excel can hold
    if !(0.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = base.checked_add_signed(chrono::Duration::try_days(serial as i64)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

struct FleetColumns {
    registration_number: usize,
    registration_date: Option<usize>,
    owner_name: Option<usize>,
    maker_model: Option<usize>,
    expiry: [Option<usize>; 6],
    cost: [Option<usize>; 6],
    url: [Option<usize>; 6],
}

impl FleetColumns {
    fn from_headers(headers: &[String]) -> Option<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let mut cols = FleetColumns {
            registration_number: find("registration_number")?,
            registration_date: find("registration_date"),
            owner_name: find("owner_name"),
            maker_model: find("maker_model"),
            expiry: [None; 6],
            cost: [None; 6],
            url: [None; 6],
        };
        for (i, doc) in DocType::ALL.iter().enumerate() {
            cols.expiry[i] = find(doc.expiry_column());
            cols.cost[i] = find(doc.cost_column());
            cols.url[i] = find(&doc.url_column());
        }
        Some(cols)
    }

    fn is_date_column(&self, idx: usize) -> bool {
        self.registration_date == Some(idx) || self.expiry.contains(&Some(idx))
    }
}

fn cell(row: &[String], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i)).map(String::as_str)
}

/// Turn raw rows into parsed vehicles. Rows with unusable registration
/// numbers are skipped and counted.
fn rows_to_vehicles(cols: &FleetColumns, rows: Vec<Vec<String>>) -> (Vec<ParsedVehicle>, usize) {
    let mut parsed = Vec::new();
    let mut invalid = 0usize;

    for row in rows {
        let raw_reg = cell(&row, Some(cols.registration_number)).unwrap_or("");
        if raw_reg.trim().is_empty() {
            continue;
        }
        let registration_number = match normalize_registration(raw_reg) {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping row: {e}");
                invalid += 1;
                continue;
            }
        };

        let mut vehicle = ParsedVehicle {
            registration_number,
            registration_date: cell(&row, cols.registration_date).and_then(normalize_date),
            owner_name: cell(&row, cols.owner_name).and_then(non_empty),
            maker_model: cell(&row, cols.maker_model).and_then(non_empty),
            ..ParsedVehicle::default()
        };
        for (i, doc) in DocType::ALL.iter().enumerate() {
            if let Some(raw) = cell(&row, cols.expiry[i]).filter(|s| !s.trim().is_empty()) {
                vehicle.expiry[i] = normalize_date(raw);
                if vehicle.expiry[i].is_none() {
                    warn!(
                        vehicle = %vehicle.registration_number,
                        "ignoring unreadable {} expiry date: {raw}",
                        doc.label()
                    );
                }
            }
            vehicle.cost[i] = cell(&row, cols.cost[i]).and_then(parse_amount);
            if vehicle.cost[i].is_some_and(|c| c < 0.0) {
                warn!(
                    vehicle = %vehicle.registration_number,
                    "ignoring negative {} cost",
                    doc.label()
                );
                vehicle.cost[i] = None;
            }
            vehicle.url[i] = cell(&row, cols.url[i]).and_then(non_empty);
        }
        parsed.push(vehicle);
    }
    (parsed, invalid)
}

// ---------------------------------------------------------------------------
// File formats
// ---------------------------------------------------------------------------

fn parse_fleet_csv(file_path: &Path) -> Result<(Vec<ParsedVehicle>, usize)> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(file));
    let headers: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
    let Some(cols) = FleetColumns::from_headers(&headers) else {
        return Err(crate::error::FleetError::Other(
            "Fleet file has no registration_number column".to_string(),
        ));
    };
    let mut rows = Vec::new();
    for result in rdr.records() {
        let Ok(record) = result else { continue };
        rows.push(record.iter().map(String::from).collect());
    }
    Ok(rows_to_vehicles(&cols, rows))
}

#[cfg(feature = "xlsx")]
fn parse_fleet_xlsx(file_path: &Path) -> Result<(Vec<ParsedVehicle>, usize)> {
    use calamine::{Data, Reader};

    use crate::error::FleetError;

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| FleetError::Other(format!("Failed to open XLSX: {e}")))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok((Vec::new(), 0));
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| FleetError::Other(format!("Failed to read sheet {sheet}: {e}")))?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok((Vec::new(), 0));
    };
    let headers: Vec<String> = header_row.iter().map(|c| c.to_string()).collect();
    let Some(cols) = FleetColumns::from_headers(&headers) else {
        return Err(FleetError::Other(
            "Fleet sheet has no registration_number column".to_string(),
        ));
    };

    let rows = sheet_rows
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(idx, c)| {
                    let is_date = cols.is_date_column(idx);
                    match c {
                        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).unwrap_or_default(),
                        Data::DateTimeIso(s) => s.clone(),
                        Data::Float(f) if is_date => excel_serial_to_date(*f).unwrap_or_default(),
                        Data::Int(i) if is_date => excel_serial_to_date(*i as f64).unwrap_or_default(),
                        Data::Float(f) => f.to_string(),
                        Data::Int(i) => i.to_string(),
                        Data::String(s) => s.clone(),
                        Data::Empty => String::new(),
                        other => other.to_string(),
                    }
                })
                .collect()
        })
        .collect();
    Ok(rows_to_vehicles(&cols, rows))
}

fn parse_fleet_file(file_path: &Path) -> Result<(Vec<ParsedVehicle>, usize)> {
    let is_xlsx = file_path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xls"));
    if is_xlsx {
        #[cfg(feature = "xlsx")]
        return parse_fleet_xlsx(file_path);
        #[cfg(not(feature = "xlsx"))]
        return Err(crate::error::FleetError::Other(
            "Spreadsheet import requires the `xlsx` feature".to_string(),
        ));
    }
    parse_fleet_csv(file_path)
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ImportResult {
    pub created: usize,
    pub updated: usize,
    pub invalid: usize,
    pub documents_attached: usize,
    pub duplicate_file: bool,
}

pub fn apply_parsed(conn: &Connection, vehicle: &ParsedVehicle) -> Result<(bool, usize)> {
    let (id, created) = ensure_vehicle(conn, &vehicle.registration_number)?;
    update_profile(
        conn,
        id,
        vehicle.registration_date.as_deref(),
        vehicle.owner_name.as_deref(),
        vehicle.maker_model.as_deref(),
    )?;
    let mut attached = 0usize;
    for (i, doc) in DocType::ALL.iter().enumerate() {
        if vehicle.expiry[i].is_some() || vehicle.cost[i].is_some() {
            set_document(conn, id, *doc, vehicle.expiry[i].as_deref(), vehicle.cost[i])?;
        }
        if let Some(url) = &vehicle.url[i] {
            if add_document_url(conn, id, *doc, url)? {
                attached += 1;
            }
        }
    }
    Ok((created, attached))
}

pub fn import_file(conn: &Connection, file_path: &Path) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    {
        let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1")?;
        if stmt.exists([&checksum])? {
            return Ok(ImportResult {
                duplicate_file: true,
                ..ImportResult::default()
            });
        }
    }

    let (parsed, invalid) = parse_fleet_file(file_path)?;

    let tx = conn.unchecked_transaction()?;
    let mut result = ImportResult {
        invalid,
        ..ImportResult::default()
    };
    for vehicle in &parsed {
        let (created, attached) = apply_parsed(&tx, vehicle)?;
        if created {
            result.created += 1;
        } else {
            result.updated += 1;
        }
        result.documents_attached += attached;
    }
    tx.execute(
        "INSERT INTO imports (filename, record_count, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            parsed.len() as i64,
            checksum,
        ],
    )?;
    tx.commit()?;

    info!(
        file = %file_path.display(),
        created = result.created,
        updated = result.updated,
        invalid = result.invalid,
        "fleet import finished"
    );
    Ok(result)
}
