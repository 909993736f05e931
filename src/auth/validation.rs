use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{ChangePasswordRequest, RegisterRequest};
use super::password;
use super::repo::UserStore;
use crate::error::{AppError, FieldErrors};

const REQUIRED: &str = "This field is required.";
pub const USERNAME_MAX_LEN: usize = 150;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    username.chars().count() <= USERNAME_MAX_LEN && USERNAME_RE.is_match(username)
}

fn require(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.is_empty() {
        errors.add(field, REQUIRED);
    }
}

/// Field checks first (presence, format, uniqueness); password agreement and
/// strength only once every field is individually valid.
pub async fn validate_registration(users: &dyn UserStore, req: &RegisterRequest) -> Result<(), AppError> {
    const FAILED: &str = "Registration failed";
    let mut errors = FieldErrors::default();

    for (field, value) in [
        ("username", &req.username),
        ("email", &req.email),
        ("first_name", &req.first_name),
        ("last_name", &req.last_name),
        ("password", &req.password),
        ("password_confirm", &req.password_confirm),
    ] {
        require(&mut errors, field, value);
    }

    if !req.username.is_empty() {
        if !is_valid_username(&req.username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        } else if users.find_by_username(&req.username).await?.is_some() {
            errors.add("username", "A user with this username already exists.");
        }
    }

    if !req.email.is_empty() {
        if !is_valid_email(&req.email) {
            errors.add("email", "Enter a valid email address.");
        } else if users.find_by_email(&req.email).await?.is_some() {
            errors.add("email", "A user with this email already exists.");
        }
    }

    if !req.password.is_empty() && req.password.chars().count() < password::MIN_LENGTH {
        errors.add("password", "Ensure this field has at least 8 characters.");
    }

    errors.into_result(FAILED)?;

    if req.password != req.password_confirm {
        return Err(AppError::validation(FAILED, "password_confirm", "Passwords do not match."));
    }

    let mut errors = FieldErrors::default();
    let attributes = [
        ("username", req.username.as_str()),
        ("email address", req.email.as_str()),
        ("first name", req.first_name.as_str()),
        ("last name", req.last_name.as_str()),
    ];
    for problem in password::strength_problems(&req.password, &attributes) {
        errors.add("password", problem);
    }
    errors.into_result(FAILED)
}

/// `old_password_ok` is the outcome of verifying `old_password` against the
/// stored hash; `attributes` feed the similarity rule.
pub fn validate_password_change(
    req: &ChangePasswordRequest,
    old_password_ok: bool,
    attributes: &[(&str, &str)],
) -> Result<(), AppError> {
    const FAILED: &str = "Password change failed";
    let mut errors = FieldErrors::default();

    require(&mut errors, "old_password", &req.old_password);
    require(&mut errors, "new_password", &req.new_password);
    require(&mut errors, "new_password_confirm", &req.new_password_confirm);

    if !req.old_password.is_empty() && !old_password_ok {
        errors.add("old_password", "Old password is incorrect.");
    }
    if !req.new_password.is_empty() && req.new_password.chars().count() < password::MIN_LENGTH {
        errors.add("new_password", "Ensure this field has at least 8 characters.");
    }
    errors.into_result(FAILED)?;

    if req.new_password != req.new_password_confirm {
        return Err(AppError::validation(
            FAILED,
            "new_password_confirm",
            "New passwords do not match.",
        ));
    }

    let mut errors = FieldErrors::default();
    for problem in password::strength_problems(&req.new_password, attributes) {
        errors.add("new_password", problem);
    }
    errors.into_result(FAILED)
}
