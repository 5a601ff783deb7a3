use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregate::RenewalWindow;
use crate::cli::{open_store, status_label, today};
use crate::db::{load_rc_cache, load_vehicles, save_rc_cache};
use crate::error::Result;
use crate::estimator::{project_other, projected_renewals, CostSource};
use crate::fmt::money;
use crate::models::VehicleRecord;

fn source_label(source: CostSource) -> &'static str {
    match source {
        CostSource::Recorded => "last paid",
        CostSource::FleetAverage => "fleet average",
        CostSource::Default => "default",
    }
}

/// Mean of all recorded non-document expenses, if any.
fn average_other_expense(vehicles: &[VehicleRecord]) -> Option<f64> {
    let amounts: Vec<f64> = vehicles
        .iter()
        .flat_map(|v| v.other_expenses.iter().map(|e| e.amount))
        .filter(|a| *a > 0.0)
        .collect();
    if amounts.is_empty() {
        None
    } else {
        Some(amounts.iter().sum::<f64>() / amounts.len() as f64)
    }
}

pub fn run(window: Option<&str>, from_date: Option<&str>, to_date: Option<&str>) -> Result<()> {
    let window = RenewalWindow::from_options(window, from_date, to_date)?;

    let conn = open_store()?;
    let vehicles = load_vehicles(&conn)?;
    let mut cache = load_rc_cache(&conn)?;
    let forecast = projected_renewals(&vehicles, &window, today(), &mut cache);
    save_rc_cache(&conn, &cache)?;

    println!(
        "Renewals due by {} (window from {})",
        forecast.to.format("%d %b %Y"),
        forecast.from.format("%d %b %Y")
    );
    if forecast.items.is_empty() {
        println!("Nothing due.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Vehicle", "Document", "Expiry", "Status", "Base", "Basis", "Projected"]);
    for item in &forecast.items {
        table.add_row(vec![
            Cell::new(&item.registration_number),
            Cell::new(item.doc_type.label()),
            Cell::new(item.expiry.format("%d %b %Y")),
            Cell::new(status_label(item.status)),
            Cell::new(money(item.basis.amount)),
            Cell::new(source_label(item.basis.source)),
            Cell::new(money(item.projected_cost)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(money(forecast.total).bold()),
    ]);
    println!("{table}");

    println!(
        "Other expenses, projected per occurrence: {}",
        money(project_other(average_other_expense(&vehicles)))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OtherExpense;

    #[test]
    fn test_average_other_expense() {
        assert_eq!(average_other_expense(&[]), None);
        let mut v = VehicleRecord::new(1, "MH12AB0001");
        for amount in [1_000.0, 3_000.0, 0.0] {
            v.other_expenses.push(OtherExpense {
                date: "2025-01-01".to_string(),
                amount,
                description: None,
            });
        }
        assert_eq!(average_other_expense(&[v]), Some(2_000.0));
    }
}
