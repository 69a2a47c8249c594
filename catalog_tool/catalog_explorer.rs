use movielib::config::load_config;
use movielib::library::{Catalog, CatalogError};
use rusqlite::{types::ValueRef, Connection, OptionalExtension};
use std::env;
use std::fs;
use std::process::ExitCode;
use thiserror::Error;

const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Error)]
enum ExplorerError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no table named `{0}`")]
    UnknownTable(String),
    #[error("{0}")]
    Usage(&'static str),
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let db_path = load_config().database_path;
    if !db_path.exists() {
        eprintln!(
            "Catalog not found at {}. Run movielib once to scan your library.",
            db_path.display()
        );
        return ExitCode::FAILURE;
    }

    println!("Opening movie catalog: {}", db_path.display());
    let result = Connection::open(&db_path)
        .map_err(ExplorerError::from)
        .and_then(|conn| run(&conn, &db_path, &args));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(conn: &Connection, db_path: &std::path::Path, args: &[String]) -> Result<(), ExplorerError> {
    if args.iter().any(|a| a == "--tables") {
        return list_tables(conn);
    }

    if let Some(idx) = args.iter().position(|a| a == "--schema") {
        let table = args
            .get(idx + 1)
            .ok_or(ExplorerError::Usage("missing table name after --schema"))?;
        return show_schema(conn, table);
    }

    if let Some(idx) = args.iter().position(|a| a == "--movies") {
        let limit = args.get(idx + 1).and_then(|s| s.parse().ok());
        return list_movies(db_path, limit);
    }

    // <table> [limit] [--out file]
    let table = &args[0];
    let limit = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_LIMIT);
    let out_file = args
        .iter()
        .position(|a| a == "--out")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str);

    sample_table(conn, table, limit, out_file)
}

fn print_usage() {
    println!(
        r#"Movie catalog explorer.

Usage:
  cargo run --bin catalog_explorer -- --tables
      List tables in the catalog database.

  cargo run --bin catalog_explorer -- --schema <table>
      Show CREATE TABLE SQL for <table>.

  cargo run --bin catalog_explorer -- --movies [limit]
      List cataloged movies in title order.

  cargo run --bin catalog_explorer -- <table> [limit] [--out file]
      Dump rows from <table> (default limit = 5).
      Use --out to write the output to a file."#
    );
}

fn list_tables(conn: &Connection) -> Result<(), ExplorerError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    println!("Tables ({}):", rows.len());
    for name in rows {
        println!(" - {}", name);
    }
    Ok(())
}

fn table_sql(conn: &Connection, table: &str) -> Result<Option<String>, ExplorerError> {
    Ok(conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type='table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?)
}

fn show_schema(conn: &Connection, table: &str) -> Result<(), ExplorerError> {
    match table_sql(conn, table)? {
        Some(sql) => println!("Schema for `{}`:\n{}\n", table, sql),
        None => println!("No schema found for `{}`.", table),
    }
    Ok(())
}

fn list_movies(db_path: &std::path::Path, limit: Option<usize>) -> Result<(), ExplorerError> {
    let catalog = Catalog::open(db_path)?;
    let movies = catalog.list_all()?;
    println!("Movies ({}):", movies.len());
    for movie in movies.iter().take(limit.unwrap_or(usize::MAX)) {
        let year = movie.year.map(|y| format!(" ({y})")).unwrap_or_default();
        let rating = movie.rating.map(|r| format!(" ★ {r:.1}")).unwrap_or_default();
        let director = movie.director.as_deref().unwrap_or("unknown director");
        let playable = if movie.video_path.is_some() { "" } else { " [no video]" };
        println!(
            " - #{} {}{} · {}{}{}",
            movie.id.unwrap_or_default(),
            movie.title,
            year,
            director,
            rating,
            playable
        );
    }
    Ok(())
}

fn sample_table(
    conn: &Connection,
    table: &str,
    limit: usize,
    out_file: Option<&str>,
) -> Result<(), ExplorerError> {
    if table_sql(conn, table)?.is_none() {
        return Err(ExplorerError::UnknownTable(table.to_string()));
    }
    let sql = format!("SELECT * FROM \"{}\" LIMIT {}", table.replace('"', "\"\""), limit);
    let mut stmt = conn.prepare(&sql)?;

    let column_names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt.query_map([], |row| {
        let mut values: Vec<String> = Vec::with_capacity(column_names.len());
        for i in 0..column_names.len() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => "NULL".to_string(),
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(f) => f.to_string(),
                ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).to_string(),
                ValueRef::Blob(_) => "<BLOB>".to_string(),
            };
            values.push(value);
        }
        Ok(values)
    })?;

    let mut output = String::new();
    output.push_str(&format!("--- Table: {} ---\n", table));
    output.push_str(&format!("Columns: {:?}\n", column_names));
    for row in rows {
        output.push_str(&format!("{:?}\n", row?));
    }

    match out_file {
        Some(path) => {
            fs::write(path, output.as_bytes()).map_err(|source| ExplorerError::Write {
                path: path.to_string(),
                source,
            })?;
            println!("Exported results to {}", path);
        }
        None => print!("{}", output),
    }
    Ok(())
}
