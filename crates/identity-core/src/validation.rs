//! Request validation rules and the accumulating validator

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

// Pattern recommended by the W3C HTML spec for email inputs.
static EMAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

/// Field failures keyed by field name. Keeps the first message reported
/// per field and iterates in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationFailures(BTreeMap<&'static str, String>);

impl ValidationFailures {
    /// Failure map holding a single field entry.
    pub fn single(field: &'static str, message: &str) -> Self {
        let mut failures = Self::default();
        failures.insert(field, message);
        failures
    }

    fn insert(&mut self, field: &'static str, message: &str) {
        self.0.entry(field).or_insert_with(|| message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

/// Accumulates failures across every rule so a rejected request reports
/// all offending fields at once.
#[derive(Debug, Default)]
pub struct Validator {
    failures: ValidationFailures,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure against `field` unless one is already present.
    pub fn add_error(&mut self, field: &'static str, message: &str) {
        self.failures.insert(field, message);
    }

    /// Record a failure when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &'static str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Consume the validator, returning the accumulated failures as an
    /// error when any rule failed.
    pub fn finish(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.failures))
        }
    }
}

/// Name and email rules for a registration submission.
pub fn validate_user(v: &mut Validator, name: &str, email: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(name.len() <= 500, "name", "must not be more than 500 bytes long");

    validate_email(v, email);
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(EMAIL_RX.is_match(email), "email", "must be a valid email address");
}

/// Plaintext passwords are limited to 72 bytes, the input ceiling of the
/// hash applied by the authentication service.
pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

/// Activation and authentication tokens are opaque 26-byte strings.
pub fn validate_token_plaintext(v: &mut Validator, token: &str) {
    v.check(!token.is_empty(), "token", "must be provided");
    v.check(token.len() == 26, "token", "must be 26 bytes long");
}
