use crate::db::{get_connection, load_rc_cache};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{load_settings, DB_FILE_NAME};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE_NAME);

    let company = if settings.company_name.is_empty() { "(not set)" } else { &settings.company_name };
    println!("Company:    {company}");
    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!("Registry:   {}", settings.registry.base_url);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `fleetdocs init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    let vehicles = count("SELECT count(*) FROM vehicles")?;
    let documents = count("SELECT count(*) FROM vehicle_documents")?;
    let expenses = count("SELECT count(*) FROM other_expenses")?;
    let imports = count("SELECT count(*) FROM imports")?;
    let cached = load_rc_cache(&conn)?.len();

    println!();
    println!("Vehicles:        {vehicles}");
    println!("Document files:  {documents}");
    println!("Other expenses:  {expenses}");
    println!("Imports:         {imports}");
    println!("Cached RC dates: {cached}");
    Ok(())
}
