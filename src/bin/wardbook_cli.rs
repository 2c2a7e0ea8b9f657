//!
//! wardbook CLI binary
//! -------------------
//! Command-line tool and interactive interpreter for a wardbook server. In
//! REPL mode, supports a `connect` command to authenticate and browse or
//! enter records.

use std::env;

use anyhow::{anyhow, Result};
use serde_json::json;

use wardbook::cli::{self, HttpSession};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} --connect <url> [--user <u>] [--password <p>] [--list patients|doctors|appointments|reports]\n  {program} --repl [--connect <url>] [--user <u>] [--password <p>]   # start interactive interpreter\n\nFlags:\n  --connect <url>       Server base URL, e.g. http://127.0.0.1:7878\n  --user <u>            Username (default: OS login name)\n  --password <p>        Password (prompted when omitted in REPL mode)\n  --list <view>         One-shot: print the named view and exit\n  --repl                Start interactive mode\n  -h, --help            Show this help\n\nExamples:\n  {program} --connect http://127.0.0.1:7878 --user admin --password wardbook --list patients\n  {program} --repl --connect http://127.0.0.1:7878 --user admin --password wardbook\n    > add patient \"Rhea Kapoor\" 34 F"
    );
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
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "wardbook_cli".to_string());

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage(&program);
        return Ok(());
    }

    let base = parse_string_arg(&args, "--connect");
    let user = parse_string_arg(&args, "--user").unwrap_or_else(whoami::username);
    let password = parse_string_arg(&args, "--password");
    let repl = has_flag(&args, "--repl");
    let list = parse_string_arg(&args, "--list");

    // Connect up front when a URL and password were both supplied.
    let session = match (&base, &password) {
        (Some(url), Some(pass)) => Some(
            HttpSession::connect(url, &user, pass)
                .await
                .map_err(|e| anyhow!("connect failed: {}", e))?,
        ),
        _ => None,
    };

    if repl {
        return cli::run_repl(session, base).await;
    }

    // One-shot mode needs an authenticated session.
    let Some(session) = session else {
        print_usage(&program);
        return Err(anyhow!("one-shot mode requires --connect and --password"));
    };
    let Some(view) = list else {
        print_usage(&program);
        return Err(anyhow!("nothing to do; pass --list <view> or --repl"));
    };

    match view.as_str() {
        "patients" | "doctors" | "appointments" => {
            let v = session.get_json(&format!("/{}", view)).await?;
            if let Some(w) = v.get("warning").and_then(|w| w.as_str()) {
                eprintln!("warning: {}", w);
            }
            let rows = v.get("rows").and_then(|r| r.as_array()).cloned().unwrap_or_default();
            if !cli::outputformatter::print_rows(&rows) {
                println!("{}", serde_json::to_string_pretty(&v)?);
            }
        }
        "reports" => {
            let v = session.get_json("/reports").await?;
            let summary = v.get("summary").cloned().unwrap_or(json!({}));
            if !cli::outputformatter::print_rows(&[summary]) {
                println!("{}", serde_json::to_string_pretty(&v)?);
            }
        }
        other => return Err(anyhow!("unknown view: {} (expected patients|doctors|appointments|reports)", other)),
    }
    Ok(())
}
