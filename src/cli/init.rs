use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path, DB_FILE_NAME};

pub fn run(data_dir: Option<String>, company: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(name) = company {
        settings.company_name = name;
    }
    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("exports"))?;
    std::fs::create_dir_all(resolved.join("documents"))?;

    let conn = get_connection(&resolved.join(DB_FILE_NAME))?;
    init_db(&conn)?;

    println!("Initialized fleetdocs at {}", resolved.display());
    Ok(())
}
