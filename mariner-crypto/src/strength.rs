//! Password strength policy.
//!
//! Applied only when a *new* secret is chosen (initialize, change
//! password, recovery reset) - never when verifying an existing one.

use std::fmt;

/// Minimum password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// A policy rule a candidate password failed to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    MinLength,
    Lowercase,
    Uppercase,
    Digit,
    Symbol,
}

impl fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinLength => {
                write!(f, "must be at least {MIN_PASSWORD_LENGTH} characters long")
            }
            Self::Lowercase => write!(f, "must contain a lowercase letter"),
            Self::Uppercase => write!(f, "must contain an uppercase letter"),
            Self::Digit => write!(f, "must contain a digit"),
            Self::Symbol => write!(f, "must contain a symbol"),
        }
    }
}

/// Returns the rules `password` violates; empty means it passes.
pub fn validate_password_strength(password: &str) -> Vec<PasswordRule> {
    let mut violations = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        violations.push(PasswordRule::MinLength);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordRule::Digit);
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        violations.push(PasswordRule::Symbol);
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_passes() {
        assert!(validate_password_strength("Str0ng!Passw0rd123").is_empty());
    }

    #[test]
    fn short_password_flagged() {
        let violations = validate_password_strength("Ab1!x");
        assert!(violations.contains(&PasswordRule::MinLength));
    }

    #[test]
    fn missing_classes_flagged() {
        let violations = validate_password_strength("alllowercasepassword");
        assert!(violations.contains(&PasswordRule::Uppercase));
        assert!(violations.contains(&PasswordRule::Digit));
        assert!(violations.contains(&PasswordRule::Symbol));
        assert!(!violations.contains(&PasswordRule::Lowercase));
        assert!(!violations.contains(&PasswordRule::MinLength));
    }

    #[test]
    fn unicode_counts_toward_length() {
        // 12 chars, but all one class
        let violations = validate_password_strength("éééééééééééé");
        assert!(!violations.contains(&PasswordRule::MinLength));
        assert!(violations.contains(&PasswordRule::Digit));
    }
}
