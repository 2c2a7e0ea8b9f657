//!
//! wardbook CLI support
//! --------------------
//! HTTP client session and interactive interpreter shared by the
//! `wardbook_cli` binary. The client authenticates once against `/login`,
//! captures the CSRF token, and sends it on every mutating request.

use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Url;
use serde_json::{json, Value};

pub mod outputformatter;

/// Authenticated HTTP session against a wardbook server.
#[derive(Clone)]
pub struct HttpSession {
    base: Url,
    client: reqwest::Client,
    csrf: String,
    user: String,
}

impl HttpSession {
    pub async fn connect(base: &str, user: &str, pass: &str) -> Result<Self> {
        let base_url = Url::parse(base).context("invalid base URL")?;
        let client = reqwest::Client::builder().cookie_store(true).build()?;
        // POST /login
        let login_url = base_url.join("/login")?;
        let resp = client
            .post(login_url)
            .json(&json!({"username": user, "password": pass}))
            .send()
            .await?;
        if !resp.status().is_success() {
            let v: Value = resp.json().await.unwrap_or(json!({}));
            let msg = v.get("error").and_then(|e| e.as_str()).unwrap_or("login failed");
            return Err(anyhow!("{}", msg));
        }
        // GET /csrf
        let csrf_url = base_url.join("/csrf")?;
        let resp2 = client.get(csrf_url).send().await?;
        if !resp2.status().is_success() {
            return Err(anyhow!("failed to obtain csrf: HTTP {}", resp2.status()));
        }
        let v2: Value = resp2.json().await.unwrap_or(json!({}));
        let csrf = v2.get("csrf").and_then(|s| s.as_str()).unwrap_or("").to_string();
        if csrf.is_empty() {
            return Err(anyhow!("csrf token missing"));
        }
        Ok(Self { base: base_url, client, csrf, user: user.to_string() })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.base.join(path)?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let val: Value = resp.json().await.unwrap_or(json!({"status":"error"}));
        if !status.is_success() {
            return Err(anyhow!("{}", remote_error(&val, status.as_u16())));
        }
        Ok(val)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.base.join(path)?;
        let mut headers = HeaderMap::new();
        headers.insert("x-csrf-token", HeaderValue::from_str(&self.csrf)?);
        let resp = self.client.post(url).headers(headers).json(body).send().await?;
        let status = resp.status();
        let val: Value = resp.json().await.unwrap_or(json!({"status":"error"}));
        if !status.is_success() {
            return Err(anyhow!("{}", remote_error(&val, status.as_u16())));
        }
        Ok(val)
    }

    pub async fn logout(&self) -> Result<()> {
        let _ = self.post_json("/logout", &json!({})).await?;
        Ok(())
    }
}

fn remote_error(val: &Value, status: u16) -> String {
    val.get("error")
        .and_then(|e| e.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("remote error: HTTP {}", status))
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_list(val: &Value) {
    if let Some(w) = val.get("warning").and_then(|w| w.as_str()) {
        eprintln!("warning: {}", w);
    }
    let rows = val.get("rows").and_then(|r| r.as_array()).cloned().unwrap_or_default();
    if !outputformatter::print_rows(&rows) {
        println!("{}", serde_json::to_string_pretty(val).unwrap_or_default());
    }
}

fn print_help() {
    println!(
        "Interactive commands:\n  connect <url> [user]                connect and log in (password prompted)\n  login [user]                        re-authenticate on the current server\n  logout                              end the server session\n  register <user> <role>              create an account (password prompted)\n  patients | doctors | appointments   list records\n  reports                             summary counts\n  add patient <name> <age> <gender> [contact]\n  add doctor <name> <specialty> [contact]\n  add appointment <patient_id> <doctor_id> <date> [status]\n  status                              show connection info\n  help                                this help\n  quit | exit                         leave the interpreter"
    );
}

/// Interactive interpreter: a plain stdin loop dispatching the commands above.
pub async fn run_repl(mut session: Option<HttpSession>, mut base: Option<String>) -> Result<()> {
    println!("wardbook interpreter. Type 'help' for commands.");
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let parts: Vec<String> = line.split_whitespace().map(|s| s.to_string()).collect();
        let Some(cmd) = parts.first() else { continue };
        match cmd.as_str() {
            "quit" | "exit" => break,
            "help" => print_help(),
            "status" => match &session {
                Some(s) => println!("connected to {} as {}", s.base(), s.user()),
                None => println!("not connected"),
            },
            "connect" => {
                let Some(url) = parts.get(1) else {
                    eprintln!("usage: connect <url> [user]");
                    continue;
                };
                let user = parts.get(2).cloned().unwrap_or_else(whoami::username);
                let pass = prompt(&format!("password for {}: ", user))?;
                match HttpSession::connect(url, &user, &pass).await {
                    Ok(s) => {
                        println!("connected to {} as {}", s.base(), user);
                        base = Some(url.clone());
                        session = Some(s);
                    }
                    Err(e) => eprintln!("connect failed: {}", e),
                }
            }
            "login" => {
                let Some(url) = base.clone() else {
                    eprintln!("no server; use: connect <url> [user]");
                    continue;
                };
                let user = parts.get(1).cloned().unwrap_or_else(whoami::username);
                let pass = prompt(&format!("password for {}: ", user))?;
                match HttpSession::connect(&url, &user, &pass).await {
                    Ok(s) => {
                        println!("logged in as {}", user);
                        session = Some(s);
                    }
                    Err(e) => eprintln!("login failed: {}", e),
                }
            }
            "logout" => {
                if let Some(s) = session.take() {
                    if let Err(e) = s.logout().await {
                        eprintln!("logout failed: {}", e);
                    } else {
                        println!("logged out");
                    }
                } else {
                    println!("not connected");
                }
            }
            "register" => {
                let (Some(user), Some(role)) = (parts.get(1), parts.get(2)) else {
                    eprintln!("usage: register <user> <role>");
                    continue;
                };
                let Some(s) = &session else {
                    eprintln!("not connected");
                    continue;
                };
                let pass = prompt(&format!("password for new user {}: ", user))?;
                match s.post_json("/register", &json!({"username": user, "password": pass, "role": role})).await {
                    Ok(_) => println!("registered {}", user),
                    Err(e) => eprintln!("register failed: {}", e),
                }
            }
            "patients" | "doctors" | "appointments" => {
                let Some(s) = &session else {
                    eprintln!("not connected");
                    continue;
                };
                match s.get_json(&format!("/{}", cmd)).await {
                    Ok(v) => print_list(&v),
                    Err(e) => eprintln!("{}", e),
                }
            }
            "reports" => {
                let Some(s) = &session else {
                    eprintln!("not connected");
                    continue;
                };
                match s.get_json("/reports").await {
                    Ok(v) => {
                        if let Some(w) = v.get("warning").and_then(|w| w.as_str()) {
                            eprintln!("warning: {}", w);
                        }
                        let summary = v.get("summary").cloned().unwrap_or(Value::Null);
                        if !outputformatter::print_rows(std::slice::from_ref(&summary)) {
                            println!("{}", serde_json::to_string_pretty(&v).unwrap_or_default());
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            "add" => {
                let Some(s) = &session else {
                    eprintln!("not connected");
                    continue;
                };
                match handle_add(s, &parts[1..]).await {
                    Ok(msg) => println!("{}", msg),
                    Err(e) => eprintln!("{}", e),
                }
            }
            other => eprintln!("unknown command: {} (try 'help')", other),
        }
    }
    Ok(())
}

async fn handle_add(session: &HttpSession, args: &[String]) -> Result<String> {
    match args.first().map(|s| s.as_str()) {
        Some("patient") => {
            let (Some(name), Some(age), Some(gender)) = (args.get(1), args.get(2), args.get(3)) else {
                return Err(anyhow!("usage: add patient <name> <age> <gender> [contact]"));
            };
            let age: i64 = age.parse().map_err(|_| anyhow!("age must be a number"))?;
            let body = json!({
                "name": name, "age": age, "gender": gender,
                "contact": args.get(4),
            });
            let v = session.post_json("/patients", &body).await?;
            Ok(format!("created patient id {}", v.get("id").and_then(|i| i.as_i64()).unwrap_or(-1)))
        }
        Some("doctor") => {
            let (Some(name), Some(specialty)) = (args.get(1), args.get(2)) else {
                return Err(anyhow!("usage: add doctor <name> <specialty> [contact]"));
            };
            let body = json!({
                "name": name, "specialty": specialty,
                "contact": args.get(3),
            });
            let v = session.post_json("/doctors", &body).await?;
            Ok(format!("created doctor id {}", v.get("id").and_then(|i| i.as_i64()).unwrap_or(-1)))
        }
        Some("appointment") => {
            let (Some(pid), Some(did), Some(date)) = (args.get(1), args.get(2), args.get(3)) else {
                return Err(anyhow!("usage: add appointment <patient_id> <doctor_id> <date> [status]"));
            };
            let pid: i64 = pid.parse().map_err(|_| anyhow!("patient_id must be a number"))?;
            let did: i64 = did.parse().map_err(|_| anyhow!("doctor_id must be a number"))?;
            let mut body = json!({
                "patient_id": pid, "doctor_id": did, "appointment_date": date,
            });
            if let Some(status) = args.get(4) {
                body["status"] = json!(status);
            }
            let v = session.post_json("/appointments", &body).await?;
            Ok(format!("created appointment id {}", v.get("id").and_then(|i| i.as_i64()).unwrap_or(-1)))
        }
        _ => Err(anyhow!("usage: add patient|doctor|appointment ...")),
    }
}
