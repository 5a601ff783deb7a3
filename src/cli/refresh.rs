use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::db::{find_vehicle_id, load_rc_cache, load_vehicles, save_rc_cache};
use crate::error::Result;
use crate::models::normalize_registration;
use crate::registry::{apply_updates, refresh_fleet, BatchPolicy, HttpRegistryClient};
use crate::settings::load_settings;

pub fn run(vehicle: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let conn = open_store()?;
    let mut vehicles = load_vehicles(&conn)?;
    if let Some(reg) = vehicle {
        let reg = normalize_registration(reg)?;
        let id = find_vehicle_id(&conn, &reg)?;
        vehicles.retain(|v| v.id == id);
    }
    if vehicles.is_empty() {
        println!("No vehicles to refresh.");
        return Ok(());
    }

    let client = HttpRegistryClient::new(&settings.registry)?;
    let policy = BatchPolicy::from(&settings.registry);
    println!(
        "Refreshing {} vehicles from {} ({} per batch)",
        vehicles.len(),
        settings.registry.base_url,
        policy.batch_size
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(refresh_fleet(&client, &vehicles, policy));

    apply_updates(&conn, &report.updates)?;

    // Registration dates may have changed.
    let mut cache = load_rc_cache(&conn)?;
    for v in &load_vehicles(&conn)? {
        cache.rc_expiry(v);
    }
    save_rc_cache(&conn, &cache)?;

    let failed = report.failed().to_string();
    println!(
        "{} refreshed, {} failed ({} batches)",
        report.succeeded().to_string().green(),
        if report.failed() > 0 { failed.red() } else { failed.normal() },
        report.batches
    );
    if !report.failures.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Vehicle", "Error"]);
        for f in &report.failures {
            table.add_row(vec![Cell::new(&f.registration_number), Cell::new(&f.message)]);
        }
        println!("{table}");
    }
    Ok(())
}
