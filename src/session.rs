//! Session lifecycle: who is signed in, their profile, and the state of
//! the operation currently in flight.
//!
//! The controller is a small state machine over signed-out / signed-in
//! plus a loading flag and the latest error. Two rules hold on every
//! path out of every operation: the loading flag is released, and the
//! observable state is exactly one of signed-out or signed-in — never a
//! signed-in shell without a profile. The identity and profile
//! collaborators are trait parameters so failures can be injected.

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::credits::SIGNUP_CREDITS;
use crate::db::queries;
use crate::error::AppError;
use crate::models::Profile;

#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    /// Verify credentials; returns the user id.
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AppError>;
    /// Create a new identity; returns the user id.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<String, AppError>;
    /// Revoke every session belonging to the user.
    async fn sign_out(&self, user_id: &str) -> Result<(), AppError>;
    /// Undo a half-finished sign-up by removing the identity again.
    async fn revoke(&self, user_id: &str) -> Result<(), AppError>;
    /// Resolve a session token to its user, if the session is live.
    async fn current_user(&self, token: &str) -> Result<Option<String>, AppError>;
}

#[allow(async_fn_in_trait)]
pub trait ProfileSource {
    async fn read_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError>;
    async fn create_profile(
        &self,
        user_id: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<Profile, AppError>;
}

#[derive(Debug, Clone)]
pub enum SessionState {
    SignedOut,
    SignedIn(Profile),
}

pub struct SessionController<I, P> {
    identity: I,
    profiles: P,
    state: SessionState,
    loading: bool,
    last_error: Option<String>,
}

impl<I: IdentityProvider, P: ProfileSource> SessionController<I, P> {
    pub fn new(identity: I, profiles: P) -> Self {
        Self {
            identity,
            profiles,
            state: SessionState::SignedOut,
            loading: false,
            last_error: None,
        }
    }

    /// Rebuild a signed-in controller from an already-resolved session.
    pub fn resume(identity: I, profiles: P, profile: Profile) -> Self {
        Self {
            identity,
            profiles,
            state: SessionState::SignedIn(profile),
            loading: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.state, SessionState::SignedIn(_))
    }

    pub fn profile(&self) -> Option<&Profile> {
        match &self.state {
            SessionState::SignedIn(profile) => Some(profile),
            SessionState::SignedOut => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The latest failure, kept until the next attempted operation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Profile, AppError> {
        self.loading = true;
        self.last_error = None;
        let outcome = self.sign_in_flow(email, password).await;
        self.loading = false;
        self.settle(outcome)
    }

    async fn sign_in_flow(&self, email: &str, password: &str) -> Result<Profile, AppError> {
        let user_id = self.identity.sign_in(email, password).await?;
        self.profiles
            .read_profile(&user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no profile for account {}", user_id)))
    }

    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Profile, AppError> {
        self.loading = true;
        self.last_error = None;
        let outcome = self.sign_up_flow(email, password, display_name).await;
        self.loading = false;
        self.settle(outcome)
    }

    async fn sign_up_flow(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Profile, AppError> {
        let user_id = self.identity.sign_up(email, password, display_name).await?;
        match self.profiles.create_profile(&user_id, email, display_name).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                // Identity exists but the profile never landed: take the
                // identity back out so no half-created account remains.
                if let Err(revoke_err) = self.identity.revoke(&user_id).await {
                    tracing::warn!(user = %user_id, error = %revoke_err, "sign-up rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Clears local state no matter what; a failed remote revocation is
    /// reported through `last_error` but cannot keep the user signed in.
    pub async fn sign_out(&mut self) -> Result<(), AppError> {
        self.loading = true;
        self.last_error = None;
        let user_id = self.profile().map(|p| p.id.clone());
        if let Some(user_id) = user_id {
            if let Err(e) = self.identity.sign_out(&user_id).await {
                tracing::warn!(user = %user_id, error = %e, "session revocation failed");
                self.last_error = Some(e.to_string());
            }
        }
        self.state = SessionState::SignedOut;
        self.loading = false;
        Ok(())
    }

    /// Re-entrant refresh of the signed-in profile; the freshest read
    /// wins. A failed refresh keeps the current profile and records the
    /// error.
    pub async fn fetch_profile(&mut self) -> Result<Profile, AppError> {
        let user_id = match &self.state {
            SessionState::SignedIn(profile) => profile.id.clone(),
            SessionState::SignedOut => {
                return Err(AppError::Unauthorized("not signed in".into()));
            }
        };

        self.loading = true;
        self.last_error = None;
        let outcome = match self.profiles.read_profile(&user_id).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => Err(AppError::NotFound(format!(
                "profile for account {} is gone",
                user_id
            ))),
            Err(e) => Err(e),
        };
        self.loading = false;

        match outcome {
            Ok(profile) => {
                self.state = SessionState::SignedIn(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn settle(&mut self, outcome: Result<Profile, AppError>) -> Result<Profile, AppError> {
        match outcome {
            Ok(profile) => {
                self.state = SessionState::SignedIn(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                self.state = SessionState::SignedOut;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

// --- SQLite-backed collaborators ---

#[derive(Clone)]
pub struct SqliteIdentity {
    pub db: Arc<Mutex<Connection>>,
}

impl IdentityProvider for SqliteIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = {
            let db = self.db.lock().await;
            queries::get_user_by_email(&db, email)?
        };
        let user = user.ok_or_else(|| AppError::Unauthorized("invalid email or password".into()))?;
        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized("invalid email or password".into()));
        }
        Ok(user.id)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<String, AppError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::BadRequest("a valid email is required".into()));
        }
        if password.len() < 8 {
            return Err(AppError::BadRequest(
                "password must be at least 8 characters".into(),
            ));
        }

        let password_hash = hash_password(password)?;
        let db = self.db.lock().await;
        if queries::email_taken(&db, email)? {
            return Err(AppError::BadRequest("email already registered".into()));
        }
        let user_id = uuid::Uuid::new_v4().to_string();
        queries::insert_user(&db, &user_id, email, &password_hash, display_name)?;
        Ok(user_id)
    }

    async fn sign_out(&self, user_id: &str) -> Result<(), AppError> {
        let db = self.db.lock().await;
        queries::delete_sessions_for_user(&db, user_id)?;
        Ok(())
    }

    async fn revoke(&self, user_id: &str) -> Result<(), AppError> {
        let db = self.db.lock().await;
        queries::delete_user(&db, user_id)?;
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<Option<String>, AppError> {
        let db = self.db.lock().await;
        Ok(queries::get_auth_session(&db, token)?)
    }
}

#[derive(Clone)]
pub struct SqliteProfiles {
    pub db: Arc<Mutex<Connection>>,
}

impl ProfileSource for SqliteProfiles {
    async fn read_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let db = self.db.lock().await;
        Ok(queries::get_profile(&db, user_id)?)
    }

    async fn create_profile(
        &self,
        user_id: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<Profile, AppError> {
        let db = self.db.lock().await;
        queries::insert_profile(&db, user_id, email, display_name, SIGNUP_CREDITS)?;
        queries::get_profile(&db, user_id)?
            .ok_or_else(|| AppError::Internal("created profile did not read back".into()))
    }
}

/// Session tokens are random hex behind a recognizable prefix.
pub fn generate_session_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.gen::<u8>()).collect();
    format!("hum_{}", hex::encode(bytes))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| AppError::Internal(format!("stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlanType;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn test_profile(id: &str, credits: i64) -> Profile {
        Profile {
            id: id.into(),
            email: format!("{id}@example.com"),
            display_name: None,
            credits_remaining: credits,
            plan_type: PlanType::Free,
        }
    }

    #[derive(Default)]
    struct MockIdentity {
        fail_sign_in: AtomicBool,
        fail_sign_up: bool,
        fail_sign_out: bool,
        revoked: AtomicBool,
    }

    impl IdentityProvider for &MockIdentity {
        async fn sign_in(&self, _email: &str, _password: &str) -> Result<String, AppError> {
            if self.fail_sign_in.load(Ordering::SeqCst) {
                return Err(AppError::Unauthorized("invalid email or password".into()));
            }
            Ok("u1".into())
        }

        async fn sign_up(
            &self,
            _email: &str,
            _password: &str,
            _display_name: Option<&str>,
        ) -> Result<String, AppError> {
            if self.fail_sign_up {
                return Err(AppError::Unavailable("identity service down".into()));
            }
            Ok("u1".into())
        }

        async fn sign_out(&self, _user_id: &str) -> Result<(), AppError> {
            if self.fail_sign_out {
                return Err(AppError::Unavailable("revocation failed".into()));
            }
            Ok(())
        }

        async fn revoke(&self, _user_id: &str) -> Result<(), AppError> {
            self.revoked.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn current_user(&self, _token: &str) -> Result<Option<String>, AppError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct MockProfiles {
        missing: bool,
        fail_read: bool,
        fail_create: bool,
        credits: i64,
    }

    impl ProfileSource for &MockProfiles {
        async fn read_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
            if self.fail_read {
                return Err(AppError::Unavailable("profile store down".into()));
            }
            if self.missing {
                return Ok(None);
            }
            Ok(Some(test_profile(user_id, self.credits)))
        }

        async fn create_profile(
            &self,
            user_id: &str,
            _email: &str,
            _display_name: Option<&str>,
        ) -> Result<Profile, AppError> {
            if self.fail_create {
                return Err(AppError::Unavailable("profile store down".into()));
            }
            Ok(test_profile(user_id, SIGNUP_CREDITS))
        }
    }

    #[tokio::test]
    async fn sign_in_success_lands_signed_in() {
        let identity = MockIdentity::default();
        let profiles = MockProfiles { credits: 42, ..Default::default() };
        let mut ctrl = SessionController::new(&identity, &profiles);

        let profile = ctrl.sign_in("u1@example.com", "secret").await.unwrap();
        assert_eq!(profile.credits_remaining, 42);
        assert!(ctrl.is_signed_in());
        assert!(!ctrl.is_loading());
        assert!(ctrl.last_error().is_none());
    }

    #[tokio::test]
    async fn sign_in_failure_lands_signed_out_with_error() {
        let identity = MockIdentity { fail_sign_in: AtomicBool::new(true), ..Default::default() };
        let profiles = MockProfiles::default();
        let mut ctrl = SessionController::new(&identity, &profiles);

        assert!(ctrl.sign_in("u1@example.com", "wrong").await.is_err());
        assert!(!ctrl.is_signed_in());
        assert!(!ctrl.is_loading());
        assert!(ctrl.last_error().is_some());
    }

    #[tokio::test]
    async fn sign_in_without_profile_row_is_not_signed_in() {
        let identity = MockIdentity::default();
        let profiles = MockProfiles { missing: true, ..Default::default() };
        let mut ctrl = SessionController::new(&identity, &profiles);

        assert!(ctrl.sign_in("u1@example.com", "secret").await.is_err());
        assert!(!ctrl.is_signed_in());
        assert!(ctrl.profile().is_none());
    }

    #[tokio::test]
    async fn sign_up_grants_the_default_free_balance() {
        let identity = MockIdentity::default();
        let profiles = MockProfiles::default();
        let mut ctrl = SessionController::new(&identity, &profiles);

        let profile = ctrl.sign_up("u1@example.com", "longenough", Some("U One")).await.unwrap();
        assert_eq!(profile.credits_remaining, SIGNUP_CREDITS);
        assert_eq!(profile.plan_type, PlanType::Free);
        assert!(ctrl.is_signed_in());
    }

    #[tokio::test]
    async fn failed_profile_creation_rolls_the_identity_back() {
        let identity = MockIdentity::default();
        let profiles = MockProfiles { fail_create: true, ..Default::default() };
        let mut ctrl = SessionController::new(&identity, &profiles);

        assert!(ctrl.sign_up("u1@example.com", "longenough", None).await.is_err());
        assert!(!ctrl.is_signed_in());
        assert!(!ctrl.is_loading());
        assert!(ctrl.last_error().is_some());
        assert!(identity.revoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn sign_out_clears_state_even_when_revocation_fails() {
        let identity = MockIdentity { fail_sign_out: true, ..Default::default() };
        let profiles = MockProfiles { credits: 10, ..Default::default() };
        let mut ctrl =
            SessionController::resume(&identity, &profiles, test_profile("u1", 10));

        ctrl.sign_out().await.unwrap();
        assert!(!ctrl.is_signed_in());
        assert!(!ctrl.is_loading());
        // The failure is still reported.
        assert!(ctrl.last_error().is_some());
    }

    #[tokio::test]
    async fn fetch_profile_refreshes_in_place() {
        let identity = MockIdentity::default();
        let profiles = MockProfiles { credits: 7, ..Default::default() };
        let mut ctrl =
            SessionController::resume(&identity, &profiles, test_profile("u1", 99));

        let refreshed = ctrl.fetch_profile().await.unwrap();
        assert_eq!(refreshed.credits_remaining, 7);
        assert_eq!(ctrl.profile().unwrap().credits_remaining, 7);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_session_and_records_the_error() {
        let identity = MockIdentity::default();
        let profiles = MockProfiles { fail_read: true, ..Default::default() };
        let mut ctrl =
            SessionController::resume(&identity, &profiles, test_profile("u1", 99));

        assert!(ctrl.fetch_profile().await.is_err());
        assert!(ctrl.is_signed_in());
        assert_eq!(ctrl.profile().unwrap().credits_remaining, 99);
        assert!(ctrl.last_error().is_some());
        assert!(!ctrl.is_loading());
    }

    #[tokio::test]
    async fn fetch_profile_while_signed_out_is_rejected() {
        let identity = MockIdentity::default();
        let profiles = MockProfiles::default();
        let mut ctrl = SessionController::new(&identity, &profiles);
        assert!(matches!(
            ctrl.fetch_profile().await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn errors_clear_on_the_next_attempt() {
        let identity = MockIdentity { fail_sign_in: AtomicBool::new(true), ..Default::default() };
        let profiles = MockProfiles { credits: 1, ..Default::default() };
        let mut ctrl = SessionController::new(&identity, &profiles);

        assert!(ctrl.sign_in("u1@example.com", "secret").await.is_err());
        assert!(ctrl.last_error().is_some());

        identity.fail_sign_in.store(false, Ordering::SeqCst);
        ctrl.sign_in("u1@example.com", "secret").await.unwrap();
        assert!(ctrl.last_error().is_none());
    }

    // End-to-end over the real SQLite collaborators.

    fn sqlite_pair() -> (SqliteIdentity, SqliteProfiles) {
        let db = Arc::new(Mutex::new(crate::db::open_test_db()));
        (SqliteIdentity { db: db.clone() }, SqliteProfiles { db })
    }

    #[tokio::test]
    async fn sqlite_sign_up_then_sign_in_round_trip() {
        let (identity, profiles) = sqlite_pair();
        let mut ctrl = SessionController::new(identity.clone(), profiles.clone());

        let created = ctrl
            .sign_up("ada@example.com", "correct horse", Some("Ada"))
            .await
            .unwrap();
        assert_eq!(created.credits_remaining, SIGNUP_CREDITS);
        assert_eq!(created.plan_type, PlanType::Free);

        let mut fresh = SessionController::new(identity.clone(), profiles.clone());
        let profile = fresh.sign_in("ada@example.com", "correct horse").await.unwrap();
        assert_eq!(profile.id, created.id);
        assert_eq!(profile.display_name.as_deref(), Some("Ada"));

        let mut wrong = SessionController::new(identity, profiles);
        assert!(wrong.sign_in("ada@example.com", "wrong password").await.is_err());
        assert!(!wrong.is_signed_in());
    }

    #[tokio::test]
    async fn sqlite_duplicate_email_is_rejected() {
        let (identity, profiles) = sqlite_pair();
        let mut ctrl = SessionController::new(identity.clone(), profiles.clone());
        ctrl.sign_up("ada@example.com", "correct horse", None).await.unwrap();

        let mut again = SessionController::new(identity, profiles);
        assert!(again.sign_up("ada@example.com", "other secret", None).await.is_err());
        assert!(!again.is_signed_in());
    }

    #[tokio::test]
    async fn session_tokens_are_prefixed_hex() {
        let token = generate_session_token();
        assert!(token.starts_with("hum_"));
        assert_eq!(token.len(), 36);
        assert!(token["hum_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
