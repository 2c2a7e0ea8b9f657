//! Session gate integration tests: the unauthenticated/authenticated state
//! machine and both authorization checks against a real credential store.

use wardbook::credentials::CredentialStore;
use wardbook::db::SharedDb;
use wardbook::error::AuthorizationError;
use wardbook::identity::{Operation, Role, Session};

fn seeded_store() -> CredentialStore {
    let store = CredentialStore::new(SharedDb::open_in_memory().expect("db")).expect("store");
    store.register("root", "rootpw123", Role::Admin).expect("admin");
    store.register("alice", "pw123", Role::Doctor).expect("doctor");
    store.register("dana", "deskpw12", Role::Receptionist).expect("receptionist");
    store
}

#[test]
fn session_that_never_logs_in_fails_every_authorize() {
    let mut session = Session::new();
    for required in Role::ALL {
        assert!(matches!(
            session.authorize(required),
            Err(AuthorizationError::NotAuthenticated)
        ));
    }
    // logout on a fresh session is a no-op, not an error
    session.logout();
    assert!(matches!(
        session.authorize(Role::Doctor),
        Err(AuthorizationError::NotAuthenticated)
    ));
}

#[test]
fn failed_login_leaves_the_session_unauthenticated() {
    let store = seeded_store();
    let mut session = Session::new();
    assert!(session.login(&store, "alice", "wrong").is_err());
    assert!(!session.is_authenticated());
    assert!(session.login(&store, "ghost", "pw123").is_err());
    assert!(!session.is_authenticated());
}

#[test]
fn doctor_fails_admin_gate_and_admin_passes_every_gate() {
    let store = seeded_store();

    let mut doctor = Session::new();
    doctor.login(&store, "alice", "pw123").expect("doctor login");
    assert_eq!(doctor.role(), Some(Role::Doctor));
    assert!(matches!(doctor.authorize(Role::Admin), Err(AuthorizationError::InsufficientRole)));
    assert!(doctor.authorize(Role::Doctor).is_ok());

    let mut admin = Session::new();
    admin.login(&store, "root", "rootpw123").expect("admin login");
    for required in Role::ALL {
        assert!(admin.authorize(required).is_ok(), "admin must pass authorize({})", required);
    }
    for op in [
        Operation::ViewPatients,
        Operation::AddPatient,
        Operation::ViewDoctors,
        Operation::AddDoctor,
        Operation::ViewAppointments,
        Operation::AddAppointment,
        Operation::ViewReports,
        Operation::ManageUsers,
    ] {
        assert!(admin.permit(op).is_ok(), "admin must pass permit({:?})", op);
    }
}

#[test]
fn permit_follows_the_policy_table() {
    let store = seeded_store();

    let mut doctor = Session::new();
    doctor.login(&store, "alice", "pw123").expect("login");
    assert!(doctor.permit(Operation::ViewPatients).is_ok());
    assert!(doctor.permit(Operation::ViewReports).is_ok());
    assert!(matches!(doctor.permit(Operation::AddPatient), Err(AuthorizationError::InsufficientRole)));
    assert!(matches!(doctor.permit(Operation::ManageUsers), Err(AuthorizationError::InsufficientRole)));

    let mut desk = Session::new();
    desk.login(&store, "dana", "deskpw12").expect("login");
    assert!(desk.permit(Operation::AddPatient).is_ok());
    assert!(desk.permit(Operation::AddAppointment).is_ok());
    assert!(matches!(desk.permit(Operation::ViewReports), Err(AuthorizationError::InsufficientRole)));
    assert!(matches!(desk.permit(Operation::AddDoctor), Err(AuthorizationError::InsufficientRole)));
}

#[test]
fn logout_returns_to_unauthenticated_from_any_state() {
    let store = seeded_store();
    let mut session = Session::new();
    session.login(&store, "root", "rootpw123").expect("login");
    assert!(session.is_authenticated());

    session.logout();
    assert!(!session.is_authenticated());
    assert!(session.identity().is_none());
    assert!(session.role().is_none());
    assert!(matches!(session.authorize(Role::Admin), Err(AuthorizationError::NotAuthenticated)));
    assert!(matches!(session.permit(Operation::ViewPatients), Err(AuthorizationError::NotAuthenticated)));

    // Idempotent
    session.logout();
    assert!(!session.is_authenticated());
}

#[test]
fn register_login_authorize_scenario() {
    let store = CredentialStore::new(SharedDb::open_in_memory().expect("db")).expect("store");
    store.register("alice", "pw123", Role::Doctor).expect("register");

    let mut session = Session::new();
    session.login(&store, "alice", "pw123").expect("login succeeds");
    assert_eq!(session.role(), Some(Role::Doctor));
    assert_eq!(session.identity(), Some("alice"));

    assert!(matches!(session.authorize(Role::Admin), Err(AuthorizationError::InsufficientRole)));
    assert!(session.authorize(Role::Doctor).is_ok());
}
