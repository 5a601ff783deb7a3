use std::path::PathBuf;

use crate::cli::open_store;
use crate::error::{FleetError, Result};
use crate::importer::import_file;

pub fn run(file: &str) -> Result<()> {
    let file_path = PathBuf::from(file);
    if !file_path.exists() {
        return Err(FleetError::Other(format!("File not found: {file}")));
    }
    let conn = open_store()?;

    let result = import_file(&conn, &file_path)?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!(
        "{} added, {} updated, {} document files attached",
        result.created, result.updated, result.documents_attached
    );
    if result.invalid > 0 {
        println!("{} rows skipped (invalid registration number)", result.invalid);
    }
    Ok(())
}
