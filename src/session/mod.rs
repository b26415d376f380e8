//! Session gate
//!
//! Holds the login form's outcome and the process-wide authenticated flag.
//! Credentials are checked locally first; only well-formed ones reach the
//! authentication service, one attempt at a time. Once a login succeeds the
//! gate stays open for the rest of the process.

use crate::backend::{AuthBackend, AuthReply, CallResult, LoginRequest};
use crate::dispatch::{Completion, Dispatcher, Notifier};
use crate::Result;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

/// Shown when either field is blank
pub const FIELDS_REQUIRED_ERROR: &str = "Please fill in all fields";

/// Shown when the identifier is not address-shaped
pub const INVALID_EMAIL_ERROR: &str = "Please enter a valid email";

/// Shown when no reply could be obtained from the server
pub const CONNECT_ERROR: &str = "Failed to connect to server";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern is valid"));

const LOGIN_KEY: &str = "login";

/// What the user typed into the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Local checks, in the order the form reports them
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.email.trim().is_empty() || self.password.trim().is_empty() {
            return Err(FIELDS_REQUIRED_ERROR);
        }
        if !EMAIL_PATTERN.is_match(&self.email) {
            return Err(INVALID_EMAIL_ERROR);
        }
        Ok(())
    }
}

/// Process-wide login flag; starts closed, opens once, never closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    authenticated: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Open the session. Returns false if it was already open.
    fn authenticate(&mut self) -> bool {
        !std::mem::replace(&mut self.authenticated, true)
    }
}

/// What `submit` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSubmit {
    /// Local validation failed; see `error()`
    Invalid,
    /// The login call is in flight
    Pending,
    /// A previous attempt is still in flight; nothing was sent
    AlreadyPending,
    /// Already logged in; nothing was sent
    AlreadyAuthenticated,
}

/// How an attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    Authenticated,
    /// See `error()` for the message
    Failed,
}

/// Login form state plus the session flag
pub struct SessionGate {
    backend: Arc<dyn AuthBackend>,
    session: SessionState,
    pending: bool,
    error: Option<String>,
    attempts: u64,
    dispatcher: Dispatcher<CallResult<AuthReply>>,
}

impl SessionGate {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            backend,
            session: SessionState::default(),
            pending: false,
            error: None,
            attempts: 0,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Wake the caller's event loop when the login call returns
    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.dispatcher.set_notifier(notifier);
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Message to show under the form, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validate and, if well-formed, send one login attempt
    pub fn submit(&mut self, credentials: Credentials) -> Result<GateSubmit> {
        if self.session.is_authenticated() {
            return Ok(GateSubmit::AlreadyAuthenticated);
        }
        if self.pending {
            debug!("Login already in flight, ignoring submit");
            return Ok(GateSubmit::AlreadyPending);
        }

        self.error = None;

        if let Err(message) = credentials.validate() {
            debug!("Login form rejected locally: {}", message);
            self.error = Some(message.to_string());
            return Ok(GateSubmit::Invalid);
        }

        self.attempts += 1;
        self.pending = true;
        info!("Sending login attempt #{}", self.attempts);

        let backend = Arc::clone(&self.backend);
        let request = LoginRequest {
            email: credentials.email,
            password: credentials.password,
        };

        if let Err(e) = self
            .dispatcher
            .spawn(LOGIN_KEY, self.attempts, move || backend.login(&request))
        {
            self.pending = false;
            self.error = Some(CONNECT_ERROR.to_string());
            return Err(e);
        }

        Ok(GateSubmit::Pending)
    }

    /// Apply a finished attempt if one has arrived
    pub fn poll(&mut self) -> Option<GateEvent> {
        let mut last = None;
        for completion in self.dispatcher.drain() {
            last = Some(self.apply(completion));
        }
        last
    }

    /// Wait for the attempt in flight to finish
    pub fn wait_outcome(&mut self, timeout: Duration) -> Option<GateEvent> {
        let completion = self.dispatcher.recv_timeout(timeout)?;
        Some(self.apply(completion))
    }

    fn apply(&mut self, completion: Completion<CallResult<AuthReply>>) -> GateEvent {
        self.pending = false;

        match completion.outcome {
            Ok(AuthReply::Accepted) => {
                if self.session.authenticate() {
                    info!("Login #{} accepted", completion.seq);
                }
                self.error = None;
                GateEvent::Authenticated
            }
            Ok(AuthReply::Rejected(message)) => {
                info!("Login #{} rejected: {}", completion.seq, message);
                self.error = Some(message);
                GateEvent::Failed
            }
            Err(e) => {
                warn!("Login #{} failed: {}", completion.seq, e);
                self.error = Some(CONNECT_ERROR.to_string());
                GateEvent::Failed
            }
        }
    }
}
