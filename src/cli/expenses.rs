use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregate::{aggregate, RenewalWindow};
use crate::cli::{open_store, today};
use crate::db::{load_rc_cache, load_vehicles, save_rc_cache};
use crate::error::Result;
use crate::fmt::money;
use crate::models::DocType;
use crate::settings::load_settings;

pub fn run(months: Option<usize>) -> Result<()> {
    let months = months.unwrap_or_else(|| load_settings().trailing_months);

    let conn = open_store()?;
    let vehicles = load_vehicles(&conn)?;
    let mut cache = load_rc_cache(&conn)?;
    let summary = aggregate(&vehicles, &RenewalWindow::ThisMonth, months, today(), &mut cache);
    save_rc_cache(&conn, &cache)?;

    let mut table = Table::new();
    let mut header = vec!["Month".to_string()];
    header.extend(DocType::ALL.iter().map(|d| d.label().to_string()));
    header.push("Other".to_string());
    header.push("Total".to_string());
    table.set_header(header);
    for m in &summary.monthly_expenditure {
        let mut row = vec![Cell::new(&m.label)];
        row.extend(DocType::ALL.iter().map(|d| Cell::new(money(m.amount(*d)))));
        row.push(Cell::new(money(m.other)));
        row.push(Cell::new(money(m.total()).bold()));
        table.add_row(row);
    }
    println!("Expenditure, last {months} months\n{table}");

    if !summary.yearly_expenditure.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Year", "Total"]);
        for y in &summary.yearly_expenditure {
            table.add_row(vec![Cell::new(y.year), Cell::new(money(y.total))]);
        }
        println!("\nBy year\n{table}");
    }

    let spending: Vec<_> = summary
        .vehicle_expenditure
        .iter()
        .filter(|v| v.total > 0.0)
        .collect();
    if !spending.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Vehicle", "Total"]);
        for v in spending {
            table.add_row(vec![Cell::new(&v.registration_number), Cell::new(money(v.total))]);
        }
        println!("\nBy vehicle\n{table}");
    }
    Ok(())
}
