//!
//! wardbook server binary
//! ----------------------
//! Command-line entry point for starting the wardbook HTTP server. Supports
//! configuration via CLI flags and environment variables.

use anyhow::Result;
use std::env;

use wardbook::server::{run_with_config, ServerConfig};

fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return args[i + 1].parse::<u16>().ok();
        }
        i += 1;
    }
    None
}

fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    println!(
        r"                      _ _                 _
 __      ____ _ _ __ __| | |__   ___   ___ | | __
 \ \ /\ / / _` | '__/ _` | '_ \ / _ \ / _ \| |/ /
  \ V  V / (_| | | | (_| | |_) | (_) | (_) |   <
   \_/\_/ \__,_|_|  \__,_|_.__/ \___/ \___/|_|\_\  "
    );

    // Initialize tracing subscriber with env filter if provided
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("wardbook Server\n\nUSAGE:\n  wardbook_server [--http-port N] [--db-file PATH]\n\nOPTIONS:\n  --http-port N    HTTP API port (env: WARDBOOK_HTTP_PORT, default 7878)\n  --db-file PATH   Database file (env: WARDBOOK_DB_FILE, default data/hospital.db)\n\nENVIRONMENT:\n  WARDBOOK_ADMIN_PASSWORD   Password used to seed the first-run admin account.\n                            Defaults to \"wardbook\" with a startup warning.\n");
        return Ok(());
    }

    // Defaults
    let default_http: u16 = 7878;
    let default_db: &str = "data/hospital.db";

    // Environment variables; CLI arguments override
    let env_http = parse_port_env("WARDBOOK_HTTP_PORT");
    let env_db = env::var("WARDBOOK_DB_FILE").ok();
    let arg_http = parse_port_arg(&args, "--http-port");
    let arg_db = parse_string_arg(&args, "--db-file");

    let http_port = arg_http.or(env_http).unwrap_or(default_http);
    let db_file = arg_db.or(env_db).unwrap_or_else(|| default_db.to_string());

    let admin_password = match env::var("WARDBOOK_ADMIN_PASSWORD") {
        Ok(p) if !p.is_empty() => p,
        _ => {
            tracing::warn!("WARDBOOK_ADMIN_PASSWORD not set; the first-run admin seed uses the default password");
            "wardbook".to_string()
        }
    };

    println!("wardbook starting: http={}, db_file={}", http_port, db_file);
    tracing::info!("Using port: http={}, db_file={}", http_port, db_file);

    run_with_config(ServerConfig { http_port, db_file, admin_password }).await
}
