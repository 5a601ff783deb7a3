use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Rc,
    Insurance,
    Fitness,
    Permit,
    Puc,
    Tax,
}

/// Fallback cost for non-document expenses when nothing better is known.
pub const OTHER_DEFAULT_COST: f64 = 3_000.0;
/// Yearly inflation applied to non-document expenses.
pub const OTHER_INFLATION_RATE: f64 = 0.08;

impl DocType {
    pub const ALL: [DocType; 6] = [
        DocType::Rc,
        DocType::Insurance,
        DocType::Fitness,
        DocType::Permit,
        DocType::Puc,
        DocType::Tax,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Rc => "rc",
            Self::Insurance => "insurance",
            Self::Fitness => "fitness",
            Self::Permit => "permit",
            Self::Puc => "puc",
            Self::Tax => "tax",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rc => "RC",
            Self::Insurance => "Insurance",
            Self::Fitness => "Fitness",
            Self::Permit => "Permit",
            Self::Puc => "PUC",
            Self::Tax => "Tax",
        }
    }

    pub fn expiry_column(&self) -> &'static str {
        match self {
            Self::Rc => "rc_expiry_date",
            Self::Insurance => "insurance_expiry_date",
            Self::Fitness => "fitness_expiry_date",
            Self::Permit => "permit_expiry_date",
            Self::Puc => "puc_expiry_date",
            Self::Tax => "tax_expiry_date",
        }
    }

    pub fn cost_column(&self) -> &'static str {
        match self {
            Self::Rc => "rc_cost",
            Self::Insurance => "insurance_premium_amount",
            Self::Fitness => "fitness_cost",
            Self::Permit => "permit_cost",
            Self::Puc => "puc_cost",
            Self::Tax => "tax_amount",
        }
    }

    /// Column name for an attached document URL in import files.
    pub fn url_column(&self) -> String {
        format!("{}_document_url", self.key())
    }

    /// Renewal cost (INR) used when neither the vehicle nor the fleet has one.
    pub fn default_cost(&self) -> f64 {
        match self {
            Self::Rc => 2_000.0,
            Self::Insurance => 15_000.0,
            Self::Fitness => 5_000.0,
            Self::Permit => 10_000.0,
            Self::Puc => 500.0,
            Self::Tax => 12_000.0,
        }
    }

    /// Expected change of the renewal cost over the last paid amount.
    pub fn inflation_rate(&self) -> f64 {
        match self {
            Self::Insurance => -0.075,
            Self::Tax => 0.075,
            Self::Permit => 0.0,
            Self::Rc | Self::Fitness | Self::Puc => 0.05,
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocType {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        DocType::ALL
            .iter()
            .find(|d| d.key() == needle)
            .copied()
            .ok_or_else(|| FleetError::UnknownDocType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Vehicle snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSlot {
    pub expiry_date: Option<String>,
    pub cost: Option<f64>,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl DocumentSlot {
    /// Recorded cost if it is usable for averaging and expenditure.
    pub fn positive_cost(&self) -> Option<f64> {
        self.cost.filter(|c| c.is_finite() && *c > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherExpense {
    pub date: String,
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: i64,
    pub registration_number: String,
    pub registration_date: Option<String>,
    pub owner_name: Option<String>,
    pub maker_model: Option<String>,
    pub rc: DocumentSlot,
    pub insurance: DocumentSlot,
    pub fitness: DocumentSlot,
    pub permit: DocumentSlot,
    pub puc: DocumentSlot,
    pub tax: DocumentSlot,
    #[serde(default)]
    pub other_expenses: Vec<OtherExpense>,
}

impl VehicleRecord {
    pub fn new(id: i64, registration_number: &str) -> Self {
        Self {
            id,
            registration_number: registration_number.to_string(),
            ..Self::default()
        }
    }

    pub fn slot(&self, doc: DocType) -> &DocumentSlot {
        match doc {
            DocType::Rc => &self.rc,
            DocType::Insurance => &self.insurance,
            DocType::Fitness => &self.fitness,
            DocType::Permit => &self.permit,
            DocType::Puc => &self.puc,
            DocType::Tax => &self.tax,
        }
    }

    pub fn slot_mut(&mut self, doc: DocType) -> &mut DocumentSlot {
        match doc {
            DocType::Rc => &mut self.rc,
            DocType::Insurance => &mut self.insurance,
            DocType::Fitness => &mut self.fitness,
            DocType::Permit => &mut self.permit,
            DocType::Puc => &mut self.puc,
            DocType::Tax => &mut self.tax,
        }
    }
}

// ---------------------------------------------------------------------------
// Registration numbers
// ---------------------------------------------------------------------------

static STATE_SERIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}\d{1,2}[A-Z]{0,3}\d{1,4}$").unwrap());
static BHARAT_SERIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}BH\d{4}[A-Z]{1,2}$").unwrap());

/// Uppercase a registration number and drop spaces, dashes and dots, then
/// check it against the state series (`MH12AB1234`) or Bharat series
/// (`22BH1234AA`) layouts.
pub fn normalize_registration(raw: &str) -> Result<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect::<String>()
        .to_uppercase();
    if STATE_SERIES.is_match(&cleaned) || BHARAT_SERIES.is_match(&cleaned) {
        Ok(cleaned)
    } else {
        Err(FleetError::InvalidRegistration(raw.trim().to_string()))
    }
}

/// Intermediate representation of one fleet row from a CSV/XLSX file.
#[derive(Debug, Clone, Default)]
pub struct ParsedVehicle {
    pub registration_number: String,
    pub registration_date: Option<String>,
    pub owner_name: Option<String>,
    pub maker_model: Option<String>,
    pub expiry: [Option<String>; 6],
    pub cost: [Option<f64>; 6],
    pub url: [Option<String>; 6],
}
