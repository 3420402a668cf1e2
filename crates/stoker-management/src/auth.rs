//! Password verification for RCON sessions.

use stoker_rcon::PasswordVerifier;

/// Verifier backed by the single panel-wide password from the config
/// file.
pub struct StaticPasswordVerifier {
    password: String,
}

impl StaticPasswordVerifier {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl PasswordVerifier for StaticPasswordVerifier {
    fn verify(&self, password: &str) -> bool {
        !self.password.is_empty() && password == self.password
    }
}
