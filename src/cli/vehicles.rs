use comfy_table::{Cell, Table};

use crate::aggregate::document_matrix;
use crate::cli::{open_store, status_label, today};
use crate::db::{
    add_other_expense, add_vehicle, find_vehicle_id, load_rc_cache, load_vehicles, remove_vehicle,
    save_rc_cache, set_document,
};
use crate::error::{FleetError, Result};
use crate::expiry::{classify, days_until, display_date};
use crate::importer::normalize_date;
use crate::models::{normalize_registration, DocType};

pub fn add(
    registration: &str,
    registration_date: Option<&str>,
    owner: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    let conn = open_store()?;
    let reg = normalize_registration(registration)?;
    if find_vehicle_id(&conn, &reg).is_ok() {
        return Err(FleetError::Other(format!("Vehicle {reg} already exists")));
    }
    let registered = match registration_date {
        Some(raw) => Some(normalize_date(raw).ok_or_else(|| {
            FleetError::Other(format!("Invalid registration date: {raw} (expected YYYY-MM-DD)"))
        })?),
        None => None,
    };
    add_vehicle(&conn, &reg, registered.as_deref(), owner, model)?;
    println!("Added vehicle: {reg}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_store()?;
    let vehicles = load_vehicles(&conn)?;
    if vehicles.is_empty() {
        println!("No vehicles yet. Add one with `fleetdocs vehicles add` or `fleetdocs import`.");
        return Ok(());
    }
    let mut cache = load_rc_cache(&conn)?;
    let matrix = document_matrix(&vehicles, today(), &mut cache);
    save_rc_cache(&conn, &cache)?;

    let mut table = Table::new();
    table.set_header(vec!["Registration", "Owner", "Model", "Registered", "Worst Status"]);
    for (vehicle, row) in vehicles.iter().zip(&matrix) {
        let worst = row
            .worst_status()
            .map(|s| status_label(s).to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&vehicle.registration_number),
            Cell::new(vehicle.owner_name.as_deref().unwrap_or("")),
            Cell::new(vehicle.maker_model.as_deref().unwrap_or("")),
            Cell::new(display_date(vehicle.registration_date.as_deref())),
            Cell::new(worst),
        ]);
    }
    println!("Vehicles ({})\n{table}", vehicles.len());
    Ok(())
}

pub fn set_doc(registration: &str, doc: &str, expiry: Option<&str>, cost: Option<f64>) -> Result<()> {
    let doc: DocType = doc.parse()?;
    if expiry.is_none() && cost.is_none() {
        return Err(FleetError::Other("Nothing to set: pass --expiry and/or --cost".to_string()));
    }
    if cost.is_some_and(|c| c < 0.0) {
        return Err(FleetError::Other("Cost must not be negative".to_string()));
    }
    let conn = open_store()?;
    let reg = normalize_registration(registration)?;
    let id = find_vehicle_id(&conn, &reg)?;
    let expiry = match expiry {
        Some(raw) => Some(normalize_date(raw).ok_or_else(|| {
            FleetError::Other(format!("Invalid expiry date for {}: {raw} (expected YYYY-MM-DD)", doc.label()))
        })?),
        None => None,
    };
    set_document(&conn, id, doc, expiry.as_deref(), cost)?;
    match expiry.as_deref() {
        Some(date) => {
            let today = today();
            let days = days_until(Some(date), today).unwrap_or_default();
            let when = if days < 0 {
                format!("{} days ago", -days)
            } else {
                format!("in {days} days")
            };
            println!(
                "Updated {} for {reg}: {}, expires {when}",
                doc.label(),
                status_label(classify(Some(date), today))
            );
        }
        None => println!("Updated {} for {reg}", doc.label()),
    }
    Ok(())
}

pub fn expense(registration: &str, date: &str, amount: f64, description: Option<&str>) -> Result<()> {
    if amount <= 0.0 {
        return Err(FleetError::Other("Amount must be greater than zero".to_string()));
    }
    let conn = open_store()?;
    let reg = normalize_registration(registration)?;
    let id = find_vehicle_id(&conn, &reg)?;
    let date = normalize_date(date)
        .ok_or_else(|| FleetError::Other(format!("Invalid expense date: {date} (expected YYYY-MM-DD)")))?;
    add_other_expense(&conn, id, &date, amount, description)?;
    println!("Recorded expense for {reg} on {date}");
    Ok(())
}

pub fn remove(registration: &str) -> Result<()> {
    let conn = open_store()?;
    let reg = normalize_registration(registration)?;
    remove_vehicle(&conn, &reg)?;
    println!("Removed vehicle: {reg}");
    Ok(())
}
