pub mod docs;
pub mod expenses;
pub mod export;
pub mod import;
pub mod info;
pub mod init;
pub mod refresh;
pub mod renewals;
pub mod status;
pub mod summary;
pub mod vehicles;

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{FleetError, Result};
use crate::expiry::DocumentStatus;
use crate::settings::get_db_path;

/// Open the fleet store, refusing to create one outside `init`.
pub(crate) fn open_store() -> Result<Connection> {
    let db_path = get_db_path();
    if !db_path.exists() {
        return Err(FleetError::Settings(format!(
            "No database found at {}\nRun `fleetdocs init` to set up.",
            db_path.display()
        )));
    }
    get_connection(&db_path)
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub(crate) fn status_label(status: DocumentStatus) -> ColoredString {
    match status {
        DocumentStatus::Missing => "Missing".dimmed(),
        DocumentStatus::Expired => "Expired".red().bold(),
        DocumentStatus::Expiring => "Expiring".yellow(),
        DocumentStatus::Valid => "Valid".green(),
    }
}

#[derive(Parser)]
#[command(
    name = "fleetdocs",
    version,
    about = "Track truck compliance documents and renewal costs."
)]
pub struct Cli {
    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// Log more (-v info, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for fleet data (default: ~/Documents/fleetdocs)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Company name shown in reports
        #[arg(long)]
        company: Option<String>,
    },
    /// Show the data directory, database and record counts.
    Info,
    /// Manage vehicles and their documents.
    Vehicles {
        #[command(subcommand)]
        command: VehiclesCommands,
    },
    /// Import vehicles from a CSV/XLSX file.
    Import {
        /// Path to CSV or XLSX file
        file: String,
    },
    /// Document status for every vehicle.
    Status {
        /// Only show this document type (rc, insurance, fitness, permit, puc, tax)
        #[arg(long)]
        doc: Option<String>,
        /// Only show vehicles with a document in this status
        #[arg(long)]
        only: Option<String>,
        /// Filter by registration number substring
        #[arg(long)]
        search: Option<String>,
    },
    /// Fleet compliance summary for a renewal window.
    Summary {
        /// Named window: this-month, next-30-days
        #[arg(long)]
        window: Option<String>,
        /// Custom window start (YYYY-MM-DD)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// Custom window end (YYYY-MM-DD)
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Trailing months in the expenditure series
        #[arg(long)]
        months: Option<usize>,
    },
    /// Recorded expenditure by month, year and vehicle.
    Expenses {
        /// Trailing months in the series
        #[arg(long)]
        months: Option<usize>,
    },
    /// Projected renewal costs for documents due by the end of a window.
    Renewals {
        /// Named window: this-month, next-30-days
        #[arg(long)]
        window: Option<String>,
        /// Custom window start (YYYY-MM-DD)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// Custom window end (YYYY-MM-DD)
        #[arg(long = "to")]
        to_date: Option<String>,
    },
    /// Export the document status matrix.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Refresh vehicle details from the registry.
    Refresh {
        /// Only refresh this vehicle
        #[arg(long)]
        vehicle: Option<String>,
    },
    /// List, attach, view and download document files.
    Docs {
        #[command(subcommand)]
        command: DocsCommands,
    },
}

#[derive(Subcommand)]
pub enum VehiclesCommands {
    /// Add a vehicle.
    Add {
        /// Registration number, e.g. MH12AB1234
        registration: String,
        /// Registration date (YYYY-MM-DD)
        #[arg(long = "registration-date")]
        registration_date: Option<String>,
        /// Owner name
        #[arg(long)]
        owner: Option<String>,
        /// Maker and model
        #[arg(long)]
        model: Option<String>,
    },
    /// List all vehicles.
    List,
    /// Set a document's expiry date and/or cost.
    SetDoc {
        registration: String,
        /// Document type: rc, insurance, fitness, permit, puc, tax
        #[arg(long)]
        doc: String,
        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: Option<String>,
        /// Renewal cost
        #[arg(long)]
        cost: Option<f64>,
    },
    /// Record a non-document expense.
    Expense {
        registration: String,
        /// Expense date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a vehicle and everything recorded for it.
    Remove { registration: String },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export to CSV.
    Csv {
        /// Output file path (default: <data_dir>/exports/document-status-YYYY-MM-DD.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Export to XLSX.
    #[cfg(feature = "xlsx")]
    Xlsx {
        /// Output file path (default: <data_dir>/exports/document-status-YYYY-MM-DD.xlsx)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum DocsCommands {
    /// List attached document files for a vehicle.
    List { registration: String },
    /// Attach a document file URL to a vehicle.
    Attach {
        registration: String,
        #[arg(long)]
        doc: String,
        url: String,
    },
    /// Check whether a document file can be previewed.
    View { url: String },
    /// Download a vehicle's document files.
    Download {
        registration: String,
        #[arg(long)]
        doc: String,
        /// Output directory (default: <data_dir>/documents/<registration>)
        #[arg(long)]
        output: Option<String>,
    },
}
