use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Unknown vehicle: {0}")]
    UnknownVehicle(String),

    #[error("Invalid registration number: {0}")]
    InvalidRegistration(String),

    #[error("Unknown document type: {0} (expected one of rc, insurance, fitness, permit, puc, tax)")]
    UnknownDocType(String),

    #[error("Unknown status: {0} (expected one of missing, expired, expiring, valid)")]
    UnknownStatus(String),

    #[error("Registry lookup failed for {registration}: {message}")]
    Registry { registration: String, message: String },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_names_vehicle() {
        let err = FleetError::Registry {
            registration: "MH12AB1234".to_string(),
            message: "503 Service Unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("MH12AB1234"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_unknown_doc_type_lists_choices() {
        let msg = FleetError::UnknownDocType("licence".to_string()).to_string();
        assert!(msg.contains("licence"));
        assert!(msg.contains("insurance"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FleetError = io_err.into();
        assert!(matches!(err, FleetError::Io(_)));
    }
}
