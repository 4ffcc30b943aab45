//! Authentication.
//!
//! [`AuthProvider`] is the seam the rest of the crate talks to. [`LocalAuth`]
//! is a local stand-in for a hosted identity service: it keeps accounts and
//! the signed-in session in a JSON file (or only in memory) and is not meant
//! to protect real credentials.
//!
//! Auth state changes are broadcast through an [`AuthEvents`] emitter owned by
//! the provider instance. It lives as long as the provider does; there is no
//! process-wide listener list.

use crate::error::{Result, TrackerError};
use crate::models::User;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const EMAIL_IN_USE: &str = "Email already in use.";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";

pub type AuthListener = Box<dyn Fn(Option<&User>)>;

/// Handle returned by `subscribe`; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription(u64);

/// Explicit observable for auth state.
///
/// Listeners must not subscribe or unsubscribe from inside a callback.
#[derive(Default)]
pub struct AuthEvents {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, AuthListener)>>,
}

impl AuthEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: AuthListener) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));
        Subscription(id)
    }

    /// Returns false if the subscription was already removed.
    pub fn unsubscribe(&self, sub: Subscription) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != sub.0);
        listeners.len() != before
    }

    pub fn emit(&self, user: Option<&User>) {
        for (_, listener) in self.listeners.borrow().iter() {
            listener(user);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

pub trait AuthProvider {
    fn sign_up(&self, email: &str, password: &str) -> Result<User>;
    fn sign_in(&self, email: &str, password: &str) -> Result<User>;
    fn sign_out(&self) -> Result<()>;
    fn current_user(&self) -> Option<User>;

    /// Call `listener` with the current user right away and again on every change.
    fn on_auth_state_changed(&self, listener: AuthListener) -> Subscription;
    fn unsubscribe(&self, sub: Subscription) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    id: String,
    email: String,
    password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthState {
    /// Keyed by email.
    users: BTreeMap<String, Account>,
    current: Option<User>,
}

pub struct LocalAuth {
    path: Option<PathBuf>,
    state: RefCell<AuthState>,
    events: AuthEvents,
}

impl LocalAuth {
    /// Provider that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RefCell::new(AuthState::default()),
            events: AuthEvents::new(),
        }
    }

    /// Provider persisted at `path` (created on first write).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let s = fs::read_to_string(&path)?;
            serde_json::from_str(&s)
                .map_err(|e| TrackerError::Auth(format!("corrupt auth file {}: {e}", path.display())))?
        } else {
            AuthState::default()
        };
        Ok(Self {
            path: Some(path),
            state: RefCell::new(state),
            events: AuthEvents::new(),
        })
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let s = serde_json::to_string_pretty(&*self.state.borrow())?;
        fs::write(path, s)?;
        Ok(())
    }

    fn set_current(&self, user: Option<User>) -> Result<()> {
        self.state.borrow_mut().current = user.clone();
        self.persist()?;
        self.events.emit(user.as_ref());
        Ok(())
    }
}

fn check_credentials(email: &str, password: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(TrackerError::validation("Email and password are required."));
    }
    Ok(email.to_string())
}

impl AuthProvider for LocalAuth {
    fn sign_up(&self, email: &str, password: &str) -> Result<User> {
        let email = check_credentials(email, password)?;
        let user = {
            let mut state = self.state.borrow_mut();
            if state.users.contains_key(&email) {
                return Err(TrackerError::Auth(EMAIL_IN_USE.to_string()));
            }
            let mut millis = Utc::now().timestamp_millis();
            while state.users.values().any(|a| a.id == format!("user_{millis}")) {
                millis += 1;
            }
            let user = User {
                id: format!("user_{millis}"),
                email: email.clone(),
            };
            state.users.insert(
                email,
                Account {
                    id: user.id.clone(),
                    email: user.email.clone(),
                    password: password.to_string(),
                },
            );
            user
        };
        log::info!("signed up {}", user.email);
        // signing up also signs in
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let email = check_credentials(email, password)?;
        let user = {
            let state = self.state.borrow();
            match state.users.get(&email) {
                Some(acct) if acct.password == password => User {
                    id: acct.id.clone(),
                    email: acct.email.clone(),
                },
                _ => return Err(TrackerError::Auth(INVALID_CREDENTIALS.to_string())),
            }
        };
        log::info!("signed in {}", user.email);
        self.set_current(Some(user.clone()))?;
        Ok(user)
    }

    fn sign_out(&self) -> Result<()> {
        self.set_current(None)
    }

    fn current_user(&self) -> Option<User> {
        self.state.borrow().current.clone()
    }

    fn on_auth_state_changed(&self, listener: AuthListener) -> Subscription {
        listener(self.current_user().as_ref());
        self.events.subscribe(listener)
    }

    fn unsubscribe(&self, sub: Subscription) -> bool {
        self.events.unsubscribe(sub)
    }
}
