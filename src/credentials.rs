//!
//! wardbook credential store
//! -------------------------
//! Durable registry of `(username, credential_hash, role)` rows in the shared
//! SQLite database, with a single verification primitive. Secrets are stored
//! as Argon2id PHC strings with a per-record random salt; the plaintext never
//! touches the database.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use rusqlite::OptionalExtension;
use tracing::{info, warn};

use crate::db::{is_constraint_violation, map_query_err, SharedDb};
use crate::error::{AuthError, RegistrationError, StoreError};
use crate::identity::Role;

fn hash_secret(secret: &str) -> Result<String, StoreError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| StoreError::QueryFailure(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| StoreError::QueryFailure(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| StoreError::QueryFailure(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_secret(hash: &str, secret: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(secret.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// Credential registry over the shared database.
///
/// Holds a precomputed dummy PHC string so the unknown-user path of `verify`
/// can burn the same derivation cost as the wrong-secret path.
#[derive(Clone)]
pub struct CredentialStore {
    db: SharedDb,
    dummy_hash: String,
}

impl CredentialStore {
    pub fn new(db: SharedDb) -> Result<Self, StoreError> {
        let mut noise = [0u8; 24];
        getrandom::getrandom(&mut noise)
            .map_err(|e| StoreError::QueryFailure(e.to_string()))?;
        let dummy_hash = hash_secret(&format!("{:02x?}", noise))?;
        Ok(Self { db, dummy_hash })
    }

    /// Create a new credential row. One durable write; the username's UNIQUE
    /// constraint decides the race when two registrations collide, so exactly
    /// one caller observes `DuplicateUsername`.
    pub fn register(&self, username: &str, secret: &str, role: Role) -> Result<(), RegistrationError> {
        let hash = hash_secret(secret)?;
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.db.0.lock();
        let result = conn.execute(
            "INSERT INTO users (username, credential_hash, role, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![username, hash, role.as_str(), now],
        );
        match result {
            Ok(_) => {
                info!(user = username, role = %role, "credential registered");
                Ok(())
            }
            Err(e) if is_constraint_violation(&e) => Err(RegistrationError::DuplicateUsername),
            Err(e) => Err(RegistrationError::Store(map_query_err(e))),
        }
    }

    /// Verify a secret and return the stored role.
    ///
    /// The unknown-user and wrong-secret paths cost the same: when no row
    /// matches, the secret is verified against a throwaway hash before the
    /// failure is returned. The two failure variants also render an identical
    /// message (see `AuthError`).
    pub fn verify(&self, username: &str, secret: &str) -> Result<Role, AuthError> {
        let row = self.lookup(username)?;
        match row {
            Some((hash, role)) => {
                if verify_secret(&hash, secret) {
                    Ok(role)
                } else {
                    Err(AuthError::InvalidSecret)
                }
            }
            None => {
                // Equalize timing with the known-user path.
                let _ = verify_secret(&self.dummy_hash, secret);
                Err(AuthError::UnknownUser)
            }
        }
    }

    /// Overwrite the credential hash after re-authenticating with the old
    /// secret. A reset without the current secret is refused.
    pub fn reset_credential(&self, username: &str, old_secret: &str, new_secret: &str) -> Result<(), AuthError> {
        self.verify(username, old_secret)?;
        let hash = hash_secret(new_secret).map_err(AuthError::Store)?;
        let conn = self.db.0.lock();
        conn.execute(
            "UPDATE users SET credential_hash = ?2 WHERE username = ?1",
            rusqlite::params![username, hash],
        )
        .map_err(|e| AuthError::Store(map_query_err(e)))?;
        info!(user = username, "credential reset");
        Ok(())
    }

    /// Stored role for a username, without verifying anything. Used by the
    /// server to decide whether an Admin account already exists.
    pub fn role_of(&self, username: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.lookup(username)?.map(|(_, role)| role))
    }

    pub fn admin_count(&self) -> Result<i64, StoreError> {
        let conn = self.db.0.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            rusqlite::params![Role::Admin.as_str()],
            |r| r.get(0),
        )
        .map_err(map_query_err)
    }

    /// First-run seed: create the default `admin` account when no Admin
    /// credential exists yet.
    pub fn ensure_default_admin(&self, password: &str) -> Result<(), StoreError> {
        if self.admin_count()? > 0 {
            return Ok(());
        }
        match self.register("admin", password, Role::Admin) {
            Ok(()) => {
                warn!("seeded default admin account; rotate its password before exposing the service");
                Ok(())
            }
            // Lost a race with another bootstrap; an admin exists now.
            Err(RegistrationError::DuplicateUsername) => Ok(()),
            Err(RegistrationError::Store(e)) => Err(e),
        }
    }

    fn lookup(&self, username: &str) -> Result<Option<(String, Role)>, StoreError> {
        let conn = self.db.0.lock();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT credential_hash, role FROM users WHERE username = ?1",
                rusqlite::params![username],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(map_query_err)?;
        match row {
            None => Ok(None),
            Some((hash, role_text)) => {
                // A row whose role no longer parses is treated as absent:
                // deny by default rather than guess a tier.
                match role_text.parse::<Role>() {
                    Ok(role) => Ok(Some((hash, role))),
                    Err(()) => {
                        warn!(user = username, role = %role_text, "unrecognized stored role; denying");
                        Ok(None)
                    }
                }
            }
        }
    }
}
