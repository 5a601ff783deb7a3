use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;

use crate::cache::RcExpiryCache;
use crate::error::{FleetError, Result};
use crate::expiry::{classify_date, display_date, parse_expiry, DocumentStatus, EXPIRY_WINDOW_DAYS};
use crate::models::{DocType, VehicleRecord};

// ---------------------------------------------------------------------------
// Renewal window
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RenewalWindow {
    ThisMonth,
    Next30Days,
    Custom { from: NaiveDate, to: NaiveDate },
}

impl RenewalWindow {
    /// Inclusive date range covered by the window.
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::ThisMonth => {
                let first = first_of_month(today);
                let last = first
                    .checked_add_months(Months::new(1))
                    .map(|d| d - Duration::days(1))
                    .unwrap_or(first);
                (first, last)
            }
            Self::Next30Days => (today, today + Duration::days(EXPIRY_WINDOW_DAYS)),
            Self::Custom { from, to } => (*from, *to),
        }
    }

    /// Build a window from CLI-style options. `--from/--to` win over a named
    /// window and must be given together.
    pub fn from_options(name: Option<&str>, from: Option<&str>, to: Option<&str>) -> Result<Self> {
        match (from, to) {
            (Some(f), Some(t)) => {
                let from = parse_expiry(f)
                    .ok_or_else(|| FleetError::Other(format!("Invalid --from date: {f}")))?;
                let to = parse_expiry(t)
                    .ok_or_else(|| FleetError::Other(format!("Invalid --to date: {t}")))?;
                if from > to {
                    return Err(FleetError::Other(format!(
                        "--from ({from}) must not be after --to ({to})"
                    )));
                }
                return Ok(Self::Custom { from, to });
            }
            (Some(_), None) => {
                return Err(FleetError::Other(
                    "--from requires --to (both date boundaries must be specified)".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(FleetError::Other(
                    "--to requires --from (both date boundaries must be specified)".to_string(),
                ));
            }
            (None, None) => {}
        }
        match name.unwrap_or("next-30-days") {
            "this-month" => Ok(Self::ThisMonth),
            "next-30-days" => Ok(Self::Next30Days),
            other => Err(FleetError::Other(format!(
                "Unknown window: {other} (expected this-month or next-30-days)"
            ))),
        }
    }
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// Effective expiry of one document. RC falls back to the date derived from
/// registration through the cache; other documents use their own field.
pub fn effective_expiry(
    vehicle: &VehicleRecord,
    doc: DocType,
    cache: &mut RcExpiryCache,
) -> Option<NaiveDate> {
    match doc {
        DocType::Rc => cache.rc_expiry(vehicle),
        _ => vehicle.slot(doc).expiry_date.as_deref().and_then(parse_expiry),
    }
}

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub missing: usize,
    pub expired: usize,
    pub expiring: usize,
    pub valid: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: DocumentStatus) {
        match status {
            DocumentStatus::Missing => self.missing += 1,
            DocumentStatus::Expired => self.expired += 1,
            DocumentStatus::Expiring => self.expiring += 1,
            DocumentStatus::Valid => self.valid += 1,
        }
    }

    pub fn get(&self, status: DocumentStatus) -> usize {
        match status {
            DocumentStatus::Missing => self.missing,
            DocumentStatus::Expired => self.expired,
            DocumentStatus::Expiring => self.expiring,
            DocumentStatus::Valid => self.valid,
        }
    }

    pub fn total(&self) -> usize {
        self.missing + self.expired + self.expiring + self.valid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyExpenditure {
    /// `YYYY-MM`
    pub month: String,
    /// `Mon YYYY`
    pub label: String,
    pub rc: f64,
    pub insurance: f64,
    pub fitness: f64,
    pub permit: f64,
    pub puc: f64,
    pub tax: f64,
    pub other: f64,
}

impl MonthlyExpenditure {
    fn for_month(first: NaiveDate) -> Self {
        Self {
            month: first.format("%Y-%m").to_string(),
            label: first.format("%b %Y").to_string(),
            ..Self::default()
        }
    }

    pub fn amount(&self, doc: DocType) -> f64 {
        match doc {
            DocType::Rc => self.rc,
            DocType::Insurance => self.insurance,
            DocType::Fitness => self.fitness,
            DocType::Permit => self.permit,
            DocType::Puc => self.puc,
            DocType::Tax => self.tax,
        }
    }

    fn add(&mut self, doc: DocType, amount: f64) {
        let field = match doc {
            DocType::Rc => &mut self.rc,
            DocType::Insurance => &mut self.insurance,
            DocType::Fitness => &mut self.fitness,
            DocType::Permit => &mut self.permit,
            DocType::Puc => &mut self.puc,
            DocType::Tax => &mut self.tax,
        };
        *field += amount;
    }

    pub fn total(&self) -> f64 {
        DocType::ALL.iter().map(|d| self.amount(*d)).sum::<f64>() + self.other
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyExpenditure {
    pub year: i32,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleExpenditure {
    pub vehicle_id: i64,
    pub registration_number: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetSummary {
    pub today: NaiveDate,
    pub window_from: NaiveDate,
    pub window_to: NaiveDate,
    pub status_counts: StatusCounts,
    pub by_document: BTreeMap<DocType, StatusCounts>,
    pub monthly_expenditure: Vec<MonthlyExpenditure>,
    pub yearly_expenditure: Vec<YearlyExpenditure>,
    pub vehicle_expenditure: Vec<VehicleExpenditure>,
    pub renewals_in_range: usize,
    pub lapsed_count: usize,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

fn empty_series(today: NaiveDate, months: usize) -> Vec<MonthlyExpenditure> {
    let current = first_of_month(today);
    (0..months)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back as u32)))
        .map(MonthlyExpenditure::for_month)
        .collect()
}

/// Fold the fleet into status counts, expenditure series and renewal figures.
/// Recorded costs land in the calendar month and year of the document's expiry;
/// other expenses land on their own date. Documents without a recorded cost
/// contribute nothing to expenditure.
pub fn aggregate(
    vehicles: &[VehicleRecord],
    window: &RenewalWindow,
    months: usize,
    today: NaiveDate,
    cache: &mut RcExpiryCache,
) -> FleetSummary {
    let (window_from, window_to) = window.resolve(today);

    let mut status_counts = StatusCounts::default();
    let mut by_document: BTreeMap<DocType, StatusCounts> =
        DocType::ALL.iter().map(|d| (*d, StatusCounts::default())).collect();
    let mut monthly = empty_series(today, months);
    let mut yearly: BTreeMap<i32, f64> = BTreeMap::new();
    let mut vehicle_expenditure = Vec::with_capacity(vehicles.len());
    let mut renewals_in_range = 0usize;
    let mut lapsed_count = 0usize;

    for vehicle in vehicles {
        let mut vehicle_total = 0.0f64;

        for doc in DocType::ALL {
            let expiry = effective_expiry(vehicle, doc, cache);
            let status = classify_date(expiry, today);
            status_counts.record(status);
            if let Some(counts) = by_document.get_mut(&doc) {
                counts.record(status);
            }
            if status == DocumentStatus::Expired {
                lapsed_count += 1;
            }

            let Some(expiry) = expiry else { continue };
            if expiry >= window_from && expiry <= window_to {
                renewals_in_range += 1;
            }
            if let Some(cost) = vehicle.slot(doc).positive_cost() {
                vehicle_total += cost;
                *yearly.entry(expiry.year()).or_default() += cost;
                let key = expiry.format("%Y-%m").to_string();
                if let Some(bucket) = monthly.iter_mut().find(|m| m.month == key) {
                    bucket.add(doc, cost);
                }
            }
        }

        for expense in &vehicle.other_expenses {
            if expense.amount <= 0.0 {
                continue;
            }
            let Some(date) = parse_expiry(&expense.date) else { continue };
            vehicle_total += expense.amount;
            *yearly.entry(date.year()).or_default() += expense.amount;
            let key = date.format("%Y-%m").to_string();
            if let Some(bucket) = monthly.iter_mut().find(|m| m.month == key) {
                bucket.other += expense.amount;
            }
        }

        vehicle_expenditure.push(VehicleExpenditure {
            vehicle_id: vehicle.id,
            registration_number: vehicle.registration_number.clone(),
            total: vehicle_total,
        });
    }

    vehicle_expenditure.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.registration_number.cmp(&b.registration_number))
    });

    FleetSummary {
        today,
        window_from,
        window_to,
        status_counts,
        by_document,
        monthly_expenditure: monthly,
        yearly_expenditure: yearly
            .into_iter()
            .map(|(year, total)| YearlyExpenditure { year, total })
            .collect(),
        vehicle_expenditure,
        renewals_in_range,
        lapsed_count,
    }
}

// ---------------------------------------------------------------------------
// Document-status matrix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MatrixCell {
    pub doc_type: DocType,
    pub status: DocumentStatus,
    pub expiry: Option<NaiveDate>,
    pub raw_expiry: Option<String>,
    pub document_count: usize,
}

impl MatrixCell {
    pub fn display_expiry(&self) -> String {
        match self.expiry {
            Some(d) => d.format("%d %b %Y").to_string(),
            None => display_date(self.raw_expiry.as_deref()),
        }
    }

    /// ISO date for machine-readable exports, empty when there is none.
    pub fn iso_expiry(&self) -> String {
        self.expiry
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub vehicle_id: i64,
    pub registration_number: String,
    pub cells: Vec<MatrixCell>,
}

impl MatrixRow {
    pub fn cell(&self, doc: DocType) -> Option<&MatrixCell> {
        self.cells.iter().find(|c| c.doc_type == doc)
    }

    pub fn worst_status(&self) -> Option<DocumentStatus> {
        self.cells.iter().map(|c| c.status).min()
    }
}

pub fn document_matrix(
    vehicles: &[VehicleRecord],
    today: NaiveDate,
    cache: &mut RcExpiryCache,
) -> Vec<MatrixRow> {
    vehicles
        .iter()
        .map(|vehicle| MatrixRow {
            vehicle_id: vehicle.id,
            registration_number: vehicle.registration_number.clone(),
            cells: DocType::ALL
                .iter()
                .map(|doc| {
                    let expiry = effective_expiry(vehicle, *doc, cache);
                    let slot = vehicle.slot(*doc);
                    MatrixCell {
                        doc_type: *doc,
                        status: classify_date(expiry, today),
                        expiry,
                        raw_expiry: slot.expiry_date.clone(),
                        document_count: slot.urls.len(),
                    }
                })
                .collect(),
        })
        .collect()
}
