use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginForm, SignupRequest, TokenResponse, UserPublic},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo_types::NewUser,
    },
    error::AuthError,
    state::AppState,
    store::UserStore,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are compared and stored trimmed and lowercased.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Signup, login and token resolution over an injected user store.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.keys.clone())
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<UserPublic, AuthError> {
        let email = normalize_email(&req.email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::Validation("value is not a valid email address".into()));
        }
        if req.password.is_empty() {
            return Err(AuthError::Validation("password must not be empty".into()));
        }

        // Check-then-insert; the store's own unique constraint catches races.
        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::DuplicateUser);
        }

        let hashed_password = hash_password(&req.password)?;
        let user = self
            .users
            .insert(NewUser {
                email,
                hashed_password,
                full_name: req.full_name,
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.into())
    }

    pub async fn login(&self, form: LoginForm) -> Result<TokenResponse, AuthError> {
        if let Some(grant) = form.grant_type.as_deref() {
            if grant != "password" {
                return Err(AuthError::Validation(format!("unsupported grant_type {grant:?}")));
            }
        }

        let email = normalize_email(&form.username);
        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        match verify_password(&form.password, &user.hashed_password) {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id = %user.id, "login invalid password");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "stored hash unreadable");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let access_token = self.keys.sign(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(TokenResponse {
            access_token,
            token_type: "bearer".into(),
        })
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserPublic, AuthError> {
        match self.users.find_by_id(user_id).await? {
            Some(user) => Ok(user.into()),
            None => {
                warn!(user_id = %user_id, "token subject no longer exists");
                Err(AuthError::Unauthorized)
            }
        }
    }
}
