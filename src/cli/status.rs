use comfy_table::{Cell, Table};

use crate::aggregate::{document_matrix, MatrixRow};
use crate::cli::{open_store, status_label, today};
use crate::db::{load_rc_cache, load_vehicles, save_rc_cache};
use crate::error::Result;
use crate::expiry::DocumentStatus;
use crate::models::DocType;

/// Rows matching the search text and, when given, having a shown document in
/// the requested status.
pub(crate) fn filter_rows<'a>(
    rows: &'a [MatrixRow],
    docs: &[DocType],
    only: Option<DocumentStatus>,
    search: Option<&str>,
) -> Vec<&'a MatrixRow> {
    let needle = search.map(|s| s.replace([' ', '-'], "").to_uppercase());
    rows.iter()
        .filter(|row| {
            needle
                .as_deref()
                .map_or(true, |n| row.registration_number.contains(n))
        })
        .filter(|row| {
            only.map_or(true, |status| {
                docs.iter()
                    .filter_map(|d| row.cell(*d))
                    .any(|c| c.status == status)
            })
        })
        .collect()
}

pub fn run(doc: Option<&str>, only: Option<&str>, search: Option<&str>) -> Result<()> {
    let docs: Vec<DocType> = match doc {
        Some(d) => vec![d.parse()?],
        None => DocType::ALL.to_vec(),
    };
    let only = only.map(|s| s.parse::<DocumentStatus>()).transpose()?;

    let conn = open_store()?;
    let vehicles = load_vehicles(&conn)?;
    let mut cache = load_rc_cache(&conn)?;
    let matrix = document_matrix(&vehicles, today(), &mut cache);
    save_rc_cache(&conn, &cache)?;

    let rows = filter_rows(&matrix, &docs, only, search);
    if rows.is_empty() {
        println!("No vehicles match.");
        return Ok(());
    }

    let mut table = Table::new();
    let mut header = vec!["Registration".to_string()];
    header.extend(docs.iter().map(|d| d.label().to_string()));
    table.set_header(header);

    for row in &rows {
        let mut cells = vec![Cell::new(&row.registration_number)];
        for d in &docs {
            let text = match row.cell(*d) {
                Some(c) if c.document_count > 0 => format!(
                    "{}\n{} ({} file{})",
                    status_label(c.status),
                    c.display_expiry(),
                    c.document_count,
                    if c.document_count == 1 { "" } else { "s" }
                ),
                Some(c) => format!("{}\n{}", status_label(c.status), c.display_expiry()),
                None => String::new(),
            };
            cells.push(Cell::new(text));
        }
        table.add_row(cells);
    }
    println!("Document Status ({} of {} vehicles)\n{table}", rows.len(), matrix.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::cache::RcExpiryCache;
    use crate::models::VehicleRecord;

    fn matrix() -> Vec<MatrixRow> {
        let mut a = VehicleRecord::new(1, "MH12AB0001");
        a.insurance.expiry_date = Some("2025-06-01".to_string());
        let mut b = VehicleRecord::new(2, "KA01CD0002");
        b.insurance.expiry_date = Some("2026-06-01".to_string());
        b.tax.expiry_date = Some("2025-06-20".to_string());
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        document_matrix(&[a, b], today, &mut RcExpiryCache::new())
    }

    #[test]
    fn test_filter_by_search() {
        let m = matrix();
        let rows = filter_rows(&m, &DocType::ALL, None, Some("mh 12"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].registration_number, "MH12AB0001");
    }

    #[test]
    fn test_filter_by_status_and_doc() {
        let m = matrix();
        let expired = filter_rows(&m, &[DocType::Insurance], Some(DocumentStatus::Expired), None);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].vehicle_id, 1);

        let expiring = filter_rows(&m, &DocType::ALL, Some(DocumentStatus::Expiring), None);
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].vehicle_id, 2);

        let none = filter_rows(&m, &[DocType::Insurance], Some(DocumentStatus::Expiring), None);
        assert!(none.is_empty());
    }
}
