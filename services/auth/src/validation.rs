//! Input validation utilities
//!
//! Messages follow the "<Field> <problem>" shape clients already display.
//! Uniqueness is not checked here; the store rejects duplicates at write time.

use crate::models::UserParams;

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn require(label: &str, value: Option<&str>) -> Result<(), String> {
    if is_blank(value) {
        return Err(format!("{} can't be blank", label));
    }
    Ok(())
}

/// Validate username
pub fn validate_username(username: Option<&str>) -> Result<(), String> {
    require("Username", username)
}

/// Validate email
pub fn validate_email(email: Option<&str>) -> Result<(), String> {
    require("Email", email)
}

/// Validate mobile
pub fn validate_mobile(mobile: Option<&str>) -> Result<(), String> {
    require("Mobile", mobile)
}

/// Validate password; only required when a user is created
pub fn validate_password(password: Option<&str>) -> Result<(), String> {
    require("Password", password)
}

/// A supplied confirmation must equal the password
pub fn validate_password_confirmation(
    password: Option<&str>,
    confirmation: Option<&str>,
) -> Result<(), String> {
    match confirmation {
        Some(confirmation) if Some(confirmation) != password => {
            Err("Password confirmation doesn't match Password".to_string())
        }
        _ => Ok(()),
    }
}

/// Validate a new user; collects every failing field
pub fn validate_new_user(params: &UserParams) -> Result<(), Vec<String>> {
    let checks = [
        validate_username(params.username.as_deref()),
        validate_email(params.email.as_deref()),
        validate_mobile(params.mobile.as_deref()),
        validate_password(params.password.as_deref()),
        validate_password_confirmation(
            params.password.as_deref(),
            params.password_confirmation.as_deref(),
        ),
    ];

    collect(checks)
}

/// Validate a partial update whose blank fields were already dropped.
///
/// The confirmation is only checked when a new password is supplied.
pub fn validate_update(params: &UserParams) -> Result<(), Vec<String>> {
    let checks = [match params.password.as_deref() {
        Some(password) => {
            validate_password_confirmation(Some(password), params.password_confirmation.as_deref())
        }
        None => Ok(()),
    }];

    collect(checks)
}

fn collect<const N: usize>(checks: [Result<(), String>; N]) -> Result<(), Vec<String>> {
    let errors: Vec<String> = checks.into_iter().filter_map(Result::err).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(username: &str, email: &str, mobile: &str, password: &str) -> UserParams {
        UserParams {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            mobile: Some(mobile.to_string()),
            password: Some(password.to_string()),
            password_confirmation: None,
        }
    }

    #[test]
    fn accepts_complete_user() {
        assert!(validate_new_user(&params("alice", "alice@x.com", "1234567890", "password123")).is_ok());
    }

    #[test]
    fn reports_every_blank_field() {
        let errors = validate_new_user(&UserParams {
            email: Some(String::new()),
            ..Default::default()
        })
        .unwrap_err();

        assert_eq!(
            errors,
            vec![
                "Username can't be blank",
                "Email can't be blank",
                "Mobile can't be blank",
                "Password can't be blank",
            ]
        );
    }

    #[test]
    fn whitespace_counts_as_blank() {
        assert!(validate_username(Some("   ")).is_err());
        assert!(validate_username(Some(" bob ")).is_ok());
    }

    #[test]
    fn confirmation_must_match_when_given() {
        let mut user = params("alice", "alice@x.com", "1234567890", "password123");
        user.password_confirmation = Some("password124".to_string());
        assert_eq!(
            validate_new_user(&user).unwrap_err(),
            vec!["Password confirmation doesn't match Password"]
        );

        user.password_confirmation = Some("password123".to_string());
        assert!(validate_new_user(&user).is_ok());
    }

    #[test]
    fn update_without_password_skips_password_rules() {
        let update = UserParams {
            username: Some("UpdatedName".to_string()),
            ..Default::default()
        };
        assert!(validate_update(&update).is_ok());

        let mismatched = UserParams {
            password: Some("a".to_string()),
            password_confirmation: Some("b".to_string()),
            ..Default::default()
        };
        assert!(validate_update(&mismatched).is_err());
    }

    #[test]
    fn update_ignores_lone_confirmation() {
        let update = UserParams {
            username: Some("renamed".to_string()),
            password_confirmation: Some("x".to_string()),
            ..Default::default()
        };
        assert!(validate_update(&update).is_ok());
    }
}
