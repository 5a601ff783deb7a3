use std::io::Write;
use std::path::Path;

use crate::aggregate::MatrixRow;
use crate::error::Result;
use crate::models::DocType;

const MAX_COLUMN_WIDTH: usize = 50;

pub fn matrix_headers() -> Vec<String> {
    let mut headers = vec!["Registration Number".to_string()];
    for doc in DocType::ALL {
        headers.push(format!("{} Status", doc.label()));
        headers.push(format!("{} Expiry", doc.label()));
    }
    headers
}

fn matrix_record(row: &MatrixRow) -> Vec<String> {
    let mut record = vec![row.registration_number.clone()];
    for doc in DocType::ALL {
        match row.cell(doc) {
            Some(cell) => {
                record.push(cell.status.key().to_string());
                record.push(cell.iso_expiry());
            }
            None => {
                record.push(String::new());
                record.push(String::new());
            }
        }
    }
    record
}

/// A single worksheet's worth of tabular data.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn from_matrix(rows: &[MatrixRow]) -> Self {
        Self {
            name: "Document Status".to_string(),
            headers: matrix_headers(),
            rows: rows.iter().map(matrix_record).collect(),
        }
    }

    /// Widest cell in each column plus padding, capped.
    pub fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|c| c.chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0);
                (longest + 2).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub fn write_sheet_csv<W: Write>(sheet: &Sheet, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv(sheet: &Sheet, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_sheet_csv(sheet, file)
}

// ---------------------------------------------------------------------------
// XLSX
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
pub fn write_xlsx(sheet: &Sheet, path: &Path) -> Result<()> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&sheet.name)?;

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &bold)?;
    }
    for (r, row) in sheet.rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string(r as u32 + 1, col as u16, value)?;
        }
    }
    for (col, width) in sheet.column_widths().into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width as f64)?;
    }

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::aggregate::document_matrix;
    use crate::cache::RcExpiryCache;
    use crate::models::VehicleRecord;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn sample_rows() -> Vec<MatrixRow> {
        let mut a = VehicleRecord::new(1, "MH12AB0001");
        a.insurance.expiry_date = Some("2025-06-25".to_string());
        a.tax.expiry_date = Some("2025-03-10".to_string());
        let mut b = VehicleRecord::new(2, "KA01\"Q\",7");
        b.registration_date = Some("2015-01-01".to_string());
        document_matrix(&[a, b], today(), &mut RcExpiryCache::new())
    }

    #[test]
    fn test_headers() {
        let headers = matrix_headers();
        assert_eq!(headers.len(), 13);
        assert_eq!(headers[0], "Registration Number");
        assert_eq!(headers[1], "RC Status");
        assert_eq!(headers[2], "RC Expiry");
        assert_eq!(headers[3], "Insurance Status");
        assert_eq!(headers[9], "PUC Status");
    }

    #[test]
    fn test_csv_matches_matrix() {
        let rows = sample_rows();
        let sheet = Sheet::from_matrix(&rows);
        let mut buf = Vec::new();
        write_sheet_csv(&sheet, &mut buf).unwrap();

        let mut rdr = csv::Reader::from_reader(buf.as_slice());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.get(1), Some("RC Status"));

        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), rows.len());
        for (record, row) in records.iter().zip(&rows) {
            assert_eq!(record.get(0), Some(row.registration_number.as_str()));
            for (i, doc) in DocType::ALL.iter().enumerate() {
                let cell = row.cell(*doc).unwrap();
                assert_eq!(record.get(1 + i * 2), Some(cell.status.key()));
            }
        }
        assert_eq!(records[0].get(3), Some("expiring"));
        assert_eq!(records[0].get(4), Some("2025-06-25"));
        assert_eq!(records[0].get(11), Some("expired"));
        assert_eq!(records[1].get(0), Some("KA01\"Q\",7"));
        assert_eq!(records[1].get(1), Some("valid"));
        assert_eq!(records[1].get(2), Some("2030-01-01"));
    }

    #[test]
    fn test_column_widths() {
        let sheet = Sheet {
            name: "S".to_string(),
            headers: vec!["A".to_string(), "Long header".to_string(), "C".to_string()],
            rows: vec![
                vec!["abcd".to_string(), "x".to_string(), "y".repeat(80)],
                vec!["ab".to_string()],
            ],
        };
        assert_eq!(sheet.column_widths(), vec![6, 13, 50]);
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_xlsx_readable() {
        use calamine::{open_workbook_auto, Reader};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.xlsx");
        let sheet = Sheet::from_matrix(&sample_rows());
        write_xlsx(&sheet, &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Document Status".to_string()]);
        let range = workbook.worksheet_range("Document Status").unwrap();
        let rows: Vec<_> = range.rows().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0].to_string(), "Registration Number");
        assert_eq!(rows[1][0].to_string(), "MH12AB0001");
        assert_eq!(rows[1][3].to_string(), "expiring");
    }
}
