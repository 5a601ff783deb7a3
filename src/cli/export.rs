use std::path::PathBuf;

use crate::aggregate::document_matrix;
use crate::cli::{open_store, today};
use crate::db::{load_rc_cache, load_vehicles, save_rc_cache};
use crate::error::Result;
use crate::export::{write_csv, Sheet};
use crate::settings::{get_data_dir, shellexpand_path};

fn build_sheet() -> Result<Sheet> {
    let conn = open_store()?;
    let vehicles = load_vehicles(&conn)?;
    let mut cache = load_rc_cache(&conn)?;
    let matrix = document_matrix(&vehicles, today(), &mut cache);
    save_rc_cache(&conn, &cache)?;
    Ok(Sheet::from_matrix(&matrix))
}

fn output_path(output: Option<String>, ext: &str) -> Result<PathBuf> {
    match output {
        Some(p) => Ok(PathBuf::from(shellexpand_path(&p))),
        None => {
            let dir = get_data_dir().join("exports");
            std::fs::create_dir_all(&dir)?;
            Ok(dir.join(format!("document-status-{}.{ext}", today().format("%Y-%m-%d"))))
        }
    }
}

pub fn csv(output: Option<String>) -> Result<()> {
    let sheet = build_sheet()?;
    let path = output_path(output, "csv")?;
    write_csv(&sheet, &path)?;
    println!("Exported {} vehicles to {}", sheet.rows.len(), path.display());
    Ok(())
}

#[cfg(feature = "xlsx")]
pub fn xlsx(output: Option<String>) -> Result<()> {
    let sheet = build_sheet()?;
    let path = output_path(output, "xlsx")?;
    crate::export::write_xlsx(&sheet, &path)?;
    println!("Exported {} vehicles to {}", sheet.rows.len(), path.display());
    Ok(())
}
