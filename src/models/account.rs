use serde::{Deserialize, Serialize};

/// Input for signing in with email and password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Input for creating an account. The password is checked against its
/// confirmation and the strength meter before anything is sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
}

/// Input for finishing a reset started from an emailed link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordInput {
    /// The `oobCode` parameter of the reset link.
    #[serde(rename = "oobCode")]
    pub oob_code: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Input for the live strength meter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrengthInput {
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}
