//! Input rules checked before anything reaches the store.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;

/// Password strength rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_true")]
    pub require_lowercase: bool,
    #[serde(default = "default_true")]
    pub require_uppercase: bool,
    #[serde(default = "default_true")]
    pub require_digit: bool,
    #[serde(default = "default_true")]
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            require_lowercase: true,
            require_uppercase: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

fn default_min_length() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> CoreResult<()> {
        if password.chars().count() < self.min_length {
            return Err(CoreError::Validation(format!(
                "Password must be at least {} characters long",
                self.min_length
            )));
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(invalid("Password must contain a lowercase letter"));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(invalid("Password must contain an uppercase letter"));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(invalid("Password must contain a digit"));
        }
        if self.require_symbol
            && !password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
        {
            return Err(invalid("Password must contain a special character"));
        }
        Ok(())
    }
}

/// 3-30 ASCII characters from `[A-Za-z0-9_.-]`, starting with a letter.
pub fn check_username(username: &str) -> CoreResult<()> {
    let len = username.len();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(CoreError::Validation(format!(
            "Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }
    if !username.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(invalid("Username must start with a letter"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(invalid(
            "Username may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

/// Syntactic check only: one `@`, a non-empty local part and a dotted domain.
pub fn check_email(email: &str) -> CoreResult<()> {
    let email = email.trim();
    let valid = !email.chars().any(char::is_whitespace)
        && email.split('@').count() == 2
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains("..")
        });

    if valid {
        Ok(())
    } else {
        Err(invalid("Please provide a valid email address"))
    }
}

pub fn check_required(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn invalid(msg: &str) -> CoreError {
    CoreError::Validation(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_usernames() {
        for name in ["bob", "alice_99", "j.doe", "run-fast", "A23456789012345678901234567890"] {
            assert!(check_username(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_bad_usernames() {
        for name in ["", "ab", "9lives", "_under", "has space", "émile", "semi;colon"] {
            assert!(check_username(name).is_err(), "{name}");
        }
        assert!(check_username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn accepts_valid_emails() {
        for email in ["a@b.co", "first.last@sub.example.org", "  Mixed@Case.IO  "] {
            assert!(check_email(email).is_ok(), "{email}");
        }
    }

    #[test]
    fn rejects_invalid_emails() {
        for email in [
            "",
            "plain",
            "@example.com",
            "a@b",
            "a@.com",
            "a@com.",
            "a@b..com",
            "a@@b.com",
            "a b@c.com",
        ] {
            assert!(check_email(email).is_err(), "{email}");
        }
    }

    #[test]
    fn default_password_policy() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("Sup3r-secret").is_ok());

        let err = policy.check("Sh0rt!").unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 8 characters long");
        assert!(policy.check("alllower1!").is_err());
        assert!(policy.check("ALLUPPER1!").is_err());
        assert!(policy.check("NoDigits!!").is_err());
        assert!(policy.check("NoSymbol12").is_err());
    }

    #[test]
    fn relaxed_password_policy() {
        let policy = PasswordPolicy {
            min_length: 4,
            require_lowercase: false,
            require_uppercase: false,
            require_digit: false,
            require_symbol: false,
        };
        assert!(policy.check("abcd").is_ok());
        assert!(policy.check("abc").is_err());
    }

    #[test]
    fn required_field_rejects_blank() {
        let err = check_required("Full name", "   ").unwrap_err();
        assert_eq!(err.to_string(), "Full name is required");
        assert!(check_required("Full name", "Ada").is_ok());
    }
}
