//! Email/password accounts and the signed-in session.
//!
//! Accounts live in the `accounts` table next to the documents.  Passwords
//! are never stored, only their bcrypt hash (salt and cost are embedded in
//! the hash string).

use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tokio::sync::watch;
use uuid::Uuid;

use rjchat_shared::constants::MIN_PASSWORD_LEN;
use rjchat_shared::types::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::AuthIdentity;

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_string()),
        _ => Err(StoreError::InvalidEmail),
    }
}

impl Database {
    /// Create an account and return its identity.
    pub fn create_account(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(StoreError::WeakPassword(MIN_PASSWORD_LEN));
        }

        let password_hash = hash(password, DEFAULT_COST)?;
        let uid = UserId::new(Uuid::new_v4().simple().to_string());

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO accounts (uid, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(email) DO NOTHING",
            params![uid.as_str(), email, password_hash, Utc::now().to_rfc3339()],
        )?;
        if inserted == 0 {
            return Err(StoreError::EmailInUse);
        }

        tracing::info!(uid = %uid, "account created");
        Ok(AuthIdentity { uid, email })
    }

    /// Check credentials and return the matching identity.
    pub fn verify_account(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        let email = normalize_email(email)?;
        let row: Option<(String, String, String)> = self
            .conn()?
            .query_row(
                "SELECT uid, email, password_hash
                 FROM accounts
                 WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((uid, stored_email, password_hash)) = row else {
            return Err(StoreError::InvalidCredentials);
        };
        if !verify(password, &password_hash)? {
            return Err(StoreError::InvalidCredentials);
        }

        Ok(AuthIdentity {
            uid: UserId::new(uid),
            email: stored_email,
        })
    }
}

/// One client's view of the auth service: account operations plus a
/// session-change stream.
pub struct AuthProvider {
    db: Arc<Database>,
    session: watch::Sender<Option<AuthIdentity>>,
}

impl AuthProvider {
    pub fn new(db: Arc<Database>) -> Self {
        let (session, _) = watch::channel(None);
        Self { db, session }
    }

    /// Create an account and sign it in.
    pub fn register(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        let identity = self.db.create_account(email, password)?;
        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        let identity = self.db.verify_account(email, password)?;
        tracing::info!(uid = %identity.uid, "signed in");
        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    pub fn sign_out(&self) {
        if let Some(identity) = self.session.send_replace(None) {
            tracing::info!(uid = %identity.uid, "signed out");
        }
    }

    pub fn current(&self) -> Option<AuthIdentity> {
        self.session.borrow().clone()
    }

    /// Stream of session changes, starting from the current session.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthIdentity>> {
        self.session.subscribe()
    }
}
