mod aggregate;
mod cache;
mod cli;
mod db;
mod error;
mod estimator;
mod expiry;
mod export;
mod fmt;
mod importer;
mod logging;
mod models;
mod registry;
mod settings;
mod viewer;

use clap::Parser;

use cli::{Cli, Commands, DocsCommands, ExportCommands, VehiclesCommands};
use logging::{init_logging, Verbosity};

fn main() {
    let cli = Cli::parse();
    init_logging(Verbosity::from_flags(cli.quiet, cli.verbose));

    let result = match cli.command {
        Commands::Init { data_dir, company } => cli::init::run(data_dir, company),
        Commands::Info => cli::info::run(),
        Commands::Vehicles { command } => match command {
            VehiclesCommands::Add {
                registration,
                registration_date,
                owner,
                model,
            } => cli::vehicles::add(
                &registration,
                registration_date.as_deref(),
                owner.as_deref(),
                model.as_deref(),
            ),
            VehiclesCommands::List => cli::vehicles::list(),
            VehiclesCommands::SetDoc {
                registration,
                doc,
                expiry,
                cost,
            } => cli::vehicles::set_doc(&registration, &doc, expiry.as_deref(), cost),
            VehiclesCommands::Expense {
                registration,
                date,
                amount,
                description,
            } => cli::vehicles::expense(&registration, &date, amount, description.as_deref()),
            VehiclesCommands::Remove { registration } => cli::vehicles::remove(&registration),
        },
        Commands::Import { file } => cli::import::run(&file),
        Commands::Status { doc, only, search } => {
            cli::status::run(doc.as_deref(), only.as_deref(), search.as_deref())
        }
        Commands::Summary {
            window,
            from_date,
            to_date,
            months,
        } => cli::summary::run(window.as_deref(), from_date.as_deref(), to_date.as_deref(), months),
        Commands::Expenses { months } => cli::expenses::run(months),
        Commands::Renewals {
            window,
            from_date,
            to_date,
        } => cli::renewals::run(window.as_deref(), from_date.as_deref(), to_date.as_deref()),
        Commands::Export { command } => match command {
            ExportCommands::Csv { output } => cli::export::csv(output),
            #[cfg(feature = "xlsx")]
            ExportCommands::Xlsx { output } => cli::export::xlsx(output),
        },
        Commands::Refresh { vehicle } => cli::refresh::run(vehicle.as_deref()),
        Commands::Docs { command } => match command {
            DocsCommands::List { registration } => cli::docs::list(&registration),
            DocsCommands::Attach { registration, doc, url } => {
                cli::docs::attach(&registration, &doc, &url)
            }
            DocsCommands::View { url } => cli::docs::view(&url),
            DocsCommands::Download {
                registration,
                doc,
                output,
            } => cli::docs::download(&registration, &doc, output),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
