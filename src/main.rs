//! tinySQL - an embeddable, multi-tenant SQL database.
//!
//! This binary is a thin interactive shell over the library: it opens a database from a
//! DSN, reads one statement per line from stdin, and prints whatever it gets back. The
//! library itself has no network listener; embedding applications call `Database::open`
//! and `Database::connect` directly.

use std::io::{self, BufRead, Write};

use log::info;

use tinysql::admission::Context;
use tinysql::types::Value;
use tinysql::Database;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut dsn = "mem://".to_string();
    let mut tenant: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--dsn" | "-d" => {
                if i + 1 < args.len() {
                    dsn = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("tinySQL - an embeddable, multi-tenant SQL database");
                println!();
                println!("Usage: tinysql [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --dsn DSN       Connection string (default: mem://)");
                println!("  -t, --tenant NAME   Tenant to connect as (default: the DSN's tenant option)");
                println!("  -h, --help          Show this help");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!("opening database at '{}'", dsn);
    let db = Database::open(&dsn)?;
    let tenant = tenant.unwrap_or_else(|| db.default_tenant.clone());
    let mut conn = db.connect(&tenant);
    let ctx = Context::background();

    println!("tinySQL ready. tenant='{}'. Ctrl-D to exit.", tenant);
    let stdin = io::stdin();
    print!("tinysql> ");
    io::stdout().flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let sql = line.trim();
        if sql.is_empty() {
            print!("tinysql> ");
            io::stdout().flush()?;
            continue;
        }

        if sql.eq_ignore_ascii_case("exit") || sql.eq_ignore_ascii_case("quit") {
            break;
        }

        match run_one(&mut conn, &ctx, sql) {
            Ok(()) => {}
            Err(e) => println!("error [{}]: {}", e.kind_name(), e),
        }

        print!("tinysql> ");
        io::stdout().flush()?;
    }

    Ok(())
}

fn run_one(conn: &mut tinysql::connection::Connection, ctx: &Context, sql: &str) -> tinysql::error::Result<()> {
    let mut rows = conn.query(ctx, sql, &[])?;
    if rows.columns.is_empty() {
        return Ok(());
    }
    println!("{}", rows.columns.join(" | "));
    let mut count = 0;
    for row in &mut rows {
        println!("{}", row.iter().map(render).collect::<Vec<_>>().join(" | "));
        count += 1;
    }
    println!("({} row(s))", count);
    Ok(())
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}
