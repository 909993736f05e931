use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "passw0rd", "12345678", "123456789",
    "1234567890", "qwerty", "qwerty123", "qwertyuiop", "iloveyou", "sunshine",
    "princess", "football", "baseball", "welcome", "welcome1", "admin123",
    "letmein", "abcdefgh", "trustno1", "11111111", "00000000", "monkey123",
    "dragon123", "changeme",
];

lazy_static! {
    // Verified against when the login identifier is unknown, so both
    // failure paths cost one argon2 run.
    static ref DUMMY_HASH: Option<String> = hash_password("dummy-password-for-timing").ok();
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Burn the same work as a real verification and report failure.
pub fn verify_against_dummy(plain: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
    false
}

fn too_similar(password: &str, attribute: &str) -> bool {
    let attribute = attribute.trim().to_lowercase();
    if attribute.len() < 3 {
        return false;
    }
    password.contains(&attribute) || attribute.contains(password)
}

/// Check `password` against the strength policy. `attributes` are
/// `(label, value)` pairs of the account, e.g. `("username", "jdoe")`.
/// Returns every failed rule's message; empty means acceptable.
pub fn strength_problems(password: &str, attributes: &[(&str, &str)]) -> Vec<String> {
    let mut problems = Vec::new();
    let lowered = password.to_lowercase();

    for (label, value) in attributes {
        let local_part = value.split('@').next().unwrap_or_default();
        if too_similar(&lowered, value) || (value.contains('@') && too_similar(&lowered, local_part)) {
            problems.push(format!("The password is too similar to the {label}."));
            break;
        }
    }
    if password.chars().count() < MIN_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    problems
}
