use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregate::{aggregate, RenewalWindow};
use crate::cli::{open_store, status_label, today};
use crate::db::{load_rc_cache, load_vehicles, save_rc_cache};
use crate::error::Result;
use crate::estimator::projected_renewals;
use crate::expiry::DocumentStatus;
use crate::fmt::money;
use crate::models::DocType;
use crate::settings::load_settings;

pub fn run(
    window: Option<&str>,
    from_date: Option<&str>,
    to_date: Option<&str>,
    months: Option<usize>,
) -> Result<()> {
    let window = RenewalWindow::from_options(window, from_date, to_date)?;
    let months = months.unwrap_or_else(|| load_settings().trailing_months);

    let conn = open_store()?;
    let vehicles = load_vehicles(&conn)?;
    let today = today();
    let mut cache = load_rc_cache(&conn)?;
    let summary = aggregate(&vehicles, &window, months, today, &mut cache);
    let forecast = projected_renewals(&vehicles, &window, today, &mut cache);
    save_rc_cache(&conn, &cache)?;

    println!(
        "{} vehicles, {} documents tracked",
        vehicles.len(),
        summary.status_counts.total()
    );
    println!(
        "Renewal window: {} to {}",
        summary.window_from.format("%d %b %Y"),
        summary.window_to.format("%d %b %Y")
    );

    let mut table = Table::new();
    let mut header = vec!["Document".to_string()];
    header.extend(DocumentStatus::ALL.iter().map(|s| status_label(*s).to_string()));
    table.set_header(header);
    for doc in DocType::ALL {
        let Some(counts) = summary.by_document.get(&doc) else { continue };
        let mut row = vec![Cell::new(doc.label())];
        row.extend(DocumentStatus::ALL.iter().map(|s| Cell::new(counts.get(*s))));
        table.add_row(row);
    }
    let mut total_row = vec![Cell::new("Total".bold())];
    total_row.extend(
        DocumentStatus::ALL
            .iter()
            .map(|s| Cell::new(summary.status_counts.get(*s).to_string().bold())),
    );
    table.add_row(total_row);
    println!("{table}");

    println!();
    println!("Renewals in window:        {}", summary.renewals_in_range);
    let lapsed = summary.lapsed_count.to_string();
    println!(
        "Lapsed documents:          {}",
        if summary.lapsed_count > 0 { lapsed.red().bold() } else { lapsed.normal() }
    );
    println!("Projected renewal cost:    {}", money(forecast.total));

    let recorded: f64 = summary.monthly_expenditure.iter().map(|m| m.total()).sum();
    println!("Spent, last {months} months:    {}", money(recorded));
    Ok(())
}
