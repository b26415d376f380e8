//! Login form
//!
//! A two-field modal form fed one line at a time: the email, then the
//! password. Once both are in, the credentials are handed over for
//! validation and the form starts over for the next attempt.

use crate::session::Credentials;
use log::debug;

/// Where the form is after a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormStep {
    /// Waiting for the password
    NeedPassword,
    /// Both fields collected
    Complete(Credentials),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Email,
    Password,
}

/// Collects email and password
pub struct LoginForm {
    field: Field,
    email: String,
}

impl LoginForm {
    pub fn new() -> Self {
        Self {
            field: Field::Email,
            email: String::new(),
        }
    }

    /// Prompt for the field being filled
    pub fn prompt(&self) -> &'static str {
        match self.field {
            Field::Email => "Email: ",
            Field::Password => "Password: ",
        }
    }

    /// Should typing be hidden?
    pub fn is_secret(&self) -> bool {
        self.field == Field::Password
    }

    /// Feed the next line to the current field
    pub fn accept_line(&mut self, line: &str) -> FormStep {
        match self.field {
            Field::Email => {
                debug!("LoginForm: email entered");
                self.email = line.to_string();
                self.field = Field::Password;
                FormStep::NeedPassword
            }
            Field::Password => {
                debug!("LoginForm: password entered");
                let email = std::mem::take(&mut self.email);
                self.field = Field::Email;
                FormStep::Complete(Credentials::new(email, line))
            }
        }
    }

    /// Start over from the email field
    pub fn reset(&mut self) {
        self.field = Field::Email;
        self.email.clear();
    }
}

impl Default for LoginForm {
    fn default() -> Self {
        Self::new()
    }
}
