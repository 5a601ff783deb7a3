use std::path::PathBuf;

use comfy_table::{Cell, Table};
use reqwest::Client;

use crate::cli::open_store;
use crate::db::{add_document_url, find_vehicle_id, load_vehicles};
use crate::error::{FleetError, Result};
use crate::models::{normalize_registration, DocType, VehicleRecord};
use crate::settings::{get_data_dir, shellexpand_path};
use crate::viewer::{self, ViewOutcome};

fn load_vehicle(registration: &str) -> Result<VehicleRecord> {
    let conn = open_store()?;
    let reg = normalize_registration(registration)?;
    load_vehicles(&conn)?
        .into_iter()
        .find(|v| v.registration_number == reg)
        .ok_or(FleetError::UnknownVehicle(reg))
}

pub fn list(registration: &str) -> Result<()> {
    let vehicle = load_vehicle(registration)?;
    let mut table = Table::new();
    table.set_header(vec!["Document", "File", "Preview"]);
    let mut count = 0usize;
    for doc in DocType::ALL {
        for url in &vehicle.slot(doc).urls {
            let preview = match viewer::view(url) {
                ViewOutcome::Rendered { kind, .. } => kind.label().to_string(),
                ViewOutcome::Fallback { reason, .. } => format!("download only ({reason})"),
            };
            table.add_row(vec![Cell::new(doc.label()), Cell::new(url), Cell::new(preview)]);
            count += 1;
        }
    }
    if count == 0 {
        println!("No document files attached to {}.", vehicle.registration_number);
        return Ok(());
    }
    println!("Documents for {}\n{table}", vehicle.registration_number);
    Ok(())
}

pub fn attach(registration: &str, doc: &str, url: &str) -> Result<()> {
    let doc: DocType = doc.parse()?;
    let conn = open_store()?;
    let reg = normalize_registration(registration)?;
    let id = find_vehicle_id(&conn, &reg)?;
    if add_document_url(&conn, id, doc, url.trim())? {
        println!("Attached {} file to {reg}", doc.label());
    } else {
        println!("That {} file is already attached to {reg}", doc.label());
    }
    Ok(())
}

pub fn view(url: &str) -> Result<()> {
    let outcome = viewer::view(url);
    match &outcome {
        ViewOutcome::Rendered { kind, .. } => println!("{} document, ready to preview.", kind.label()),
        ViewOutcome::Fallback { reason, .. } => {
            println!("Unable to preview this document ({reason}).");
            println!("Download it instead:");
        }
    }
    println!("{}", outcome.url());
    Ok(())
}

pub fn download(registration: &str, doc: &str, output: Option<String>) -> Result<()> {
    let doc: DocType = doc.parse()?;
    let vehicle = load_vehicle(registration)?;
    let urls = &vehicle.slot(doc).urls;
    if urls.is_empty() {
        return Err(FleetError::Other(format!(
            "No {} files attached to {}",
            doc.label(),
            vehicle.registration_number
        )));
    }
    let dest_dir = match output {
        Some(p) => PathBuf::from(shellexpand_path(&p)),
        None => get_data_dir().join("documents").join(&vehicle.registration_number),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let client = Client::new();
    for url in urls {
        let path = runtime.block_on(viewer::download(&client, url, &dest_dir))?;
        println!("Saved {}", path.display());
    }
    Ok(())
}
