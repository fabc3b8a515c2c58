//! Password policy for new uploads
//!
//! Applied once, at the boundary where a new blob is about to be created.
//! Downloads never apply it: a file sealed under an older, weaker policy must
//! stay readable.

use secrecy::{ExposeSecret, SecretString};

use crate::config::PolicyConfig;
use crate::error::{CoffreError, CoffreResult};

/// Default minimum password length, in characters
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Minimum length in Unicode scalar values. An empty password is always
    /// rejected, even with `min_len = 0`.
    pub min_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_PASSWORD_LEN,
        }
    }
}

impl From<&PolicyConfig> for PasswordPolicy {
    fn from(cfg: &PolicyConfig) -> Self {
        Self {
            min_len: cfg.min_password_len,
        }
    }
}

impl PasswordPolicy {
    pub fn check(&self, password: &SecretString) -> CoffreResult<()> {
        let len = password.expose_secret().chars().count();
        if len == 0 {
            return Err(CoffreError::Policy(
                "a password is required; unencrypted uploads are not supported".into(),
            ));
        }
        if len < self.min_len {
            return Err(CoffreError::Policy(format!(
                "password must be at least {} characters",
                self.min_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accepts_six_chars() {
        let policy = PasswordPolicy::default();
        assert!(policy.check(&SecretString::from("abcdef")).is_ok());
        assert!(policy.check(&SecretString::from("abcde")).is_err());
    }

    #[test]
    fn test_empty_always_rejected() {
        let policy = PasswordPolicy { min_len: 0 };
        let err = policy.check(&SecretString::from("")).unwrap_err();
        assert!(err.to_string().contains("unencrypted uploads are not supported"));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let policy = PasswordPolicy { min_len: 4 };
        // 4 characters, 8 bytes
        assert!(policy.check(&SecretString::from("éééé")).is_ok());
        assert!(policy.check(&SecretString::from("ééé")).is_err());
    }

    #[test]
    fn test_error_does_not_echo_password() {
        let policy = PasswordPolicy { min_len: 32 };
        let err = policy.check(&SecretString::from("tooshort-secret")).unwrap_err();
        assert!(!err.to_string().contains("tooshort-secret"));
    }

    #[test]
    fn test_from_config() {
        let cfg = PolicyConfig { min_password_len: 10 };
        assert_eq!(PasswordPolicy::from(&cfg).min_len, 10);
    }
}
