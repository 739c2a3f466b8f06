//! Password strength meter and confirmation check used by sign-up and reset.

use serde::Serialize;

/// Number of rules a password can satisfy.
pub const MAX_SCORE: u8 = 5;

/// Score of a password against the five strength rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PasswordStrength(u8);

impl PasswordStrength {
    /// Count the satisfied rules: at least 8 characters, an ASCII uppercase
    /// letter, a lowercase letter, a digit, and anything outside `[A-Za-z0-9]`.
    pub fn score(password: &str) -> Self {
        let rules = [
            password.chars().count() >= 8,
            password.chars().any(|c| c.is_ascii_uppercase()),
            password.chars().any(|c| c.is_ascii_lowercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
        ];
        Self(rules.iter().filter(|&&ok| ok).count() as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            0 => "",
            1..=2 => "Weak",
            3..=4 => "Medium",
            _ => "Strong",
        }
    }

    /// Fill colour of the meter segments.
    pub fn color(&self) -> &'static str {
        match self.0 {
            0 => "bg-gray-200",
            1..=2 => "bg-red-500",
            3..=4 => "bg-yellow-500",
            _ => "bg-green-500",
        }
    }

    /// Weak passwords are refused for new accounts and resets.
    pub fn is_acceptable(&self) -> bool {
        self.0 > 2
    }
}

pub fn passwords_match(password: &str, confirmation: &str) -> bool {
    password == confirmation
}

/// Reasons a new password is refused before anything is sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("Passwords do not match")]
    Mismatch,
    #[error("Password is too weak. Please use a stronger password.")]
    TooWeak,
}

/// Check a new password and its confirmation. The match check comes first.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), PasswordError> {
    if !passwords_match(password, confirmation) {
        return Err(PasswordError::Mismatch);
    }
    if !PasswordStrength::score(password).is_acceptable() {
        return Err(PasswordError::TooWeak);
    }
    Ok(())
}

/// What the meter shows for the current pair of inputs.
#[derive(Debug, Clone, Serialize)]
pub struct StrengthReport {
    pub score: u8,
    pub max_score: u8,
    pub label: &'static str,
    pub color: &'static str,
    /// `None` until a confirmation has been typed.
    pub matches: Option<bool>,
}

impl StrengthReport {
    pub fn evaluate(password: &str, confirmation: Option<&str>) -> Self {
        let strength = PasswordStrength::score(password);
        Self {
            score: strength.value(),
            max_score: MAX_SCORE,
            label: strength.label(),
            color: strength.color(),
            matches: confirmation
                .filter(|c| !c.is_empty())
                .map(|c| passwords_match(password, c)),
        }
    }
}
