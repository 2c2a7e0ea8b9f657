//! End-to-end HTTP tests: cookie + CSRF session model, role-gated routes,
//! registration gating and degraded list views, over a live axum server.

use serde_json::{json, Value};

use wardbook::db::SharedDb;
use wardbook::identity::Role;
use wardbook::server::{build_router, build_state, AppState};

const ADMIN_SEED: &str = "adminseed123";

async fn spawn_server() -> (String, AppState, SharedDb) {
    let db = SharedDb::open_in_memory().expect("db");
    let state = build_state(db.clone(), ADMIN_SEED).expect("state");
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{}", addr), state, db)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().expect("client")
}

/// Log in and fetch the CSRF token; returns an authenticated client.
async fn login(base: &str, user: &str, pass: &str) -> (reqwest::Client, String) {
    let c = client();
    let resp = c
        .post(format!("{}/login", base))
        .json(&json!({"username": user, "password": pass}))
        .send()
        .await
        .expect("login request");
    assert!(resp.status().is_success(), "login for {} should succeed", user);
    let resp = c.get(format!("{}/csrf", base)).send().await.expect("csrf request");
    let v: Value = resp.json().await.expect("csrf body");
    let csrf = v["csrf"].as_str().expect("csrf token").to_string();
    (c, csrf)
}

async fn seed_accounts(state: &AppState) {
    state.creds.register("alice", "doctorpw1", Role::Doctor).expect("doctor");
    state.creds.register("dana", "deskpw123", Role::Receptionist).expect("receptionist");
}

#[tokio::test]
async fn login_failure_is_generic_and_identical_for_both_causes() {
    let (base, state, _db) = spawn_server().await;
    seed_accounts(&state).await;

    let c = client();
    let wrong_pw = c
        .post(format!("{}/login", base))
        .json(&json!({"username": "alice", "password": "nope"}))
        .send()
        .await
        .expect("request");
    let unknown = c
        .post(format!("{}/login", base))
        .json(&json!({"username": "nobody", "password": "nope"}))
        .send()
        .await
        .expect("request");

    assert_eq!(wrong_pw.status().as_u16(), 401);
    assert_eq!(unknown.status().as_u16(), 401);
    let b1: Value = wrong_pw.json().await.expect("body");
    let b2: Value = unknown.json().await.expect("body");
    assert_eq!(b1, b2, "failure bodies must be indistinguishable");
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let (base, _state, _db) = spawn_server().await;
    let c = client();
    for path in ["patients", "doctors", "appointments", "reports", "csrf"] {
        let resp = c.get(format!("{}/{}", base, path)).send().await.expect("request");
        assert_eq!(resp.status().as_u16(), 401, "GET /{} without a session must 401", path);
    }
}

#[tokio::test]
async fn receptionist_books_doctor_reads_admin_does_everything() {
    let (base, state, _db) = spawn_server().await;
    seed_accounts(&state).await;

    let (desk, desk_csrf) = login(&base, "dana", "deskpw123").await;
    let (doc, _doc_csrf) = login(&base, "alice", "doctorpw1").await;
    let (admin, admin_csrf) = login(&base, "admin", ADMIN_SEED).await;

    // Receptionist creates a patient; doctor may look but not touch.
    let resp = desk
        .post(format!("{}/patients", base))
        .header("x-csrf-token", &desk_csrf)
        .json(&json!({"name": "Rhea Kapoor", "age": 34, "gender": "F"}))
        .send()
        .await
        .expect("create patient");
    assert!(resp.status().is_success());
    let pid = resp.json::<Value>().await.expect("body")["id"].as_i64().expect("id");

    let resp = doc
        .post(format!("{}/patients", base))
        .json(&json!({"name": "X", "age": 1, "gender": "M"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status().as_u16(), 403, "doctor must not create patients");

    let resp = doc.get(format!("{}/patients", base)).send().await.expect("list");
    assert!(resp.status().is_success());
    let rows = resp.json::<Value>().await.expect("body")["rows"].as_array().expect("rows").clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Rhea Kapoor");

    // Reports: doctor yes, receptionist no.
    let resp = doc.get(format!("{}/reports", base)).send().await.expect("reports");
    assert!(resp.status().is_success());
    let resp = desk.get(format!("{}/reports", base)).send().await.expect("reports");
    assert_eq!(resp.status().as_u16(), 403);

    // Only admin may add doctors.
    let resp = desk
        .post(format!("{}/doctors", base))
        .header("x-csrf-token", &desk_csrf)
        .json(&json!({"name": "Dr. Osei", "specialty": "Cardiology"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status().as_u16(), 403);

    let resp = admin
        .post(format!("{}/doctors", base))
        .header("x-csrf-token", &admin_csrf)
        .json(&json!({"name": "Dr. Osei", "specialty": "Cardiology"}))
        .send()
        .await
        .expect("create doctor");
    assert!(resp.status().is_success());
    let did = resp.json::<Value>().await.expect("body")["id"].as_i64().expect("id");

    // Receptionist books the appointment and the joined view carries names.
    let resp = desk
        .post(format!("{}/appointments", base))
        .header("x-csrf-token", &desk_csrf)
        .json(&json!({"patient_id": pid, "doctor_id": did, "appointment_date": "2026-09-01"}))
        .send()
        .await
        .expect("create appointment");
    assert!(resp.status().is_success());

    let resp = doc.get(format!("{}/appointments", base)).send().await.expect("list");
    let rows = resp.json::<Value>().await.expect("body")["rows"].as_array().expect("rows").clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["patient"], "Rhea Kapoor");
    assert_eq!(rows[0]["doctor"], "Dr. Osei");
    assert_eq!(rows[0]["status"], "scheduled");
}

#[tokio::test]
async fn mutating_routes_require_the_csrf_token() {
    let (base, state, _db) = spawn_server().await;
    seed_accounts(&state).await;
    let (desk, _csrf) = login(&base, "dana", "deskpw123").await;

    // Authenticated and authorized, but no x-csrf-token header.
    let resp = desk
        .post(format!("{}/patients", base))
        .json(&json!({"name": "NoCsrf", "age": 1, "gender": "F"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status().as_u16(), 403);

    let resp = desk
        .post(format!("{}/patients", base))
        .header("x-csrf-token", "wrong-token")
        .json(&json!({"name": "NoCsrf", "age": 1, "gender": "F"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn registration_is_open_for_staff_roles_but_admin_needs_manage_users() {
    let (base, _state, _db) = spawn_server().await;

    // Open self-registration, role name parsed case-insensitively.
    let c = client();
    let resp = c
        .post(format!("{}/register", base))
        .json(&json!({"username": "dana", "password": "deskpw123", "role": "Receptionist"}))
        .send()
        .await
        .expect("register");
    assert!(resp.status().is_success());

    // Duplicate username conflicts.
    let resp = c
        .post(format!("{}/register", base))
        .json(&json!({"username": "dana", "password": "otherpw12", "role": "doctor"}))
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status().as_u16(), 409);

    // Unknown role is a deny at the boundary.
    let resp = c
        .post(format!("{}/register", base))
        .json(&json!({"username": "eve", "password": "longenough", "role": "superuser"}))
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status().as_u16(), 400);

    // Short password rejected at the boundary.
    let resp = c
        .post(format!("{}/register", base))
        .json(&json!({"username": "eve", "password": "short", "role": "doctor"}))
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status().as_u16(), 400);

    // Creating an Admin account without a session is refused.
    let resp = c
        .post(format!("{}/register", base))
        .json(&json!({"username": "eve", "password": "longenough", "role": "admin"}))
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status().as_u16(), 401);

    // A receptionist session cannot create admins either.
    let (desk, desk_csrf) = login(&base, "dana", "deskpw123").await;
    let resp = desk
        .post(format!("{}/register", base))
        .header("x-csrf-token", &desk_csrf)
        .json(&json!({"username": "eve", "password": "longenough", "role": "admin"}))
        .send()
        .await
        .expect("register");
    assert_eq!(resp.status().as_u16(), 403);

    // The seeded admin can.
    let (admin, admin_csrf) = login(&base, "admin", ADMIN_SEED).await;
    let resp = admin
        .post(format!("{}/register", base))
        .header("x-csrf-token", &admin_csrf)
        .json(&json!({"username": "eve", "password": "longenough", "role": "admin"}))
        .send()
        .await
        .expect("register");
    assert!(resp.status().is_success());
    let _ = login(&base, "eve", "longenough").await;
}

#[tokio::test]
async fn credential_reset_is_self_authenticating() {
    let (base, state, _db) = spawn_server().await;
    seed_accounts(&state).await;
    let c = client();

    // Wrong old password: generic 401, credential unchanged.
    let resp = c
        .post(format!("{}/credentials/reset", base))
        .json(&json!({"username": "alice", "old_password": "wrong", "new_password": "newpw12345"}))
        .send()
        .await
        .expect("reset");
    assert_eq!(resp.status().as_u16(), 401);
    let _ = login(&base, "alice", "doctorpw1").await;

    // Correct old password swaps the credential.
    let resp = c
        .post(format!("{}/credentials/reset", base))
        .json(&json!({"username": "alice", "old_password": "doctorpw1", "new_password": "newpw12345"}))
        .send()
        .await
        .expect("reset");
    assert!(resp.status().is_success());
    let _ = login(&base, "alice", "newpw12345").await;
    let resp = c
        .post(format!("{}/login", base))
        .json(&json!({"username": "alice", "password": "doctorpw1"}))
        .send()
        .await
        .expect("old login");
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn logout_is_idempotent_and_kills_the_session() {
    let (base, state, _db) = spawn_server().await;
    seed_accounts(&state).await;

    // Logout without any session is still ok.
    let resp = client().post(format!("{}/logout", base)).send().await.expect("logout");
    assert!(resp.status().is_success());

    let (doc, _csrf) = login(&base, "alice", "doctorpw1").await;
    let resp = doc.get(format!("{}/patients", base)).send().await.expect("list");
    assert!(resp.status().is_success());

    let resp = doc.post(format!("{}/logout", base)).send().await.expect("logout");
    assert!(resp.status().is_success());
    let resp = doc.get(format!("{}/patients", base)).send().await.expect("list");
    assert_eq!(resp.status().as_u16(), 401, "the session must be gone after logout");

    // Second logout with the now-dead cookie is still ok.
    let resp = doc.post(format!("{}/logout", base)).send().await.expect("logout");
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn list_views_degrade_to_empty_rows_when_the_store_fails() {
    let (base, state, db) = spawn_server().await;
    seed_accounts(&state).await;
    let (doc, _csrf) = login(&base, "alice", "doctorpw1").await;

    {
        let conn = db.0.lock();
        conn.execute_batch("DROP TABLE appointments; DROP TABLE patients;").expect("drop");
    }

    let resp = doc.get(format!("{}/patients", base)).send().await.expect("list");
    assert!(resp.status().is_success(), "a store failure must not kill the view");
    let v: Value = resp.json().await.expect("body");
    assert_eq!(v["rows"].as_array().map(|r| r.len()), Some(0));
    assert_eq!(v["warning"], "record store unavailable");

    // The session itself survives: doctors table is intact and still lists.
    let resp = doc.get(format!("{}/doctors", base)).send().await.expect("list");
    let v: Value = resp.json().await.expect("body");
    assert!(v.get("warning").is_none());
}

#[tokio::test]
async fn appointment_with_unknown_references_is_a_user_error() {
    let (base, state, _db) = spawn_server().await;
    seed_accounts(&state).await;
    let (desk, desk_csrf) = login(&base, "dana", "deskpw123").await;

    let resp = desk
        .post(format!("{}/appointments", base))
        .header("x-csrf-token", &desk_csrf)
        .json(&json!({"patient_id": 41, "doctor_id": 7, "appointment_date": "2026-09-01"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status().as_u16(), 400);
    let v: Value = resp.json().await.expect("body");
    assert_eq!(v["code"], "unknown_patient");
}
