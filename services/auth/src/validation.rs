//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 30;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const ROLE_NAME_MIN_LENGTH: usize = 3;
pub const ROLE_NAME_MAX_LENGTH: usize = 80;
pub const EMAIL_MAX_LENGTH: usize = 255;
pub const DESCRIPTION_MAX_LENGTH: usize = 255;

/// Validate username: 3 to 30 characters out of `[a-zA-Z0-9_.-]`
pub fn valid_username(username: &str) -> bool {
    let length = username.chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length) {
        return false;
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("Failed to compile username regex"));

    regex.is_match(username)
}

/// Validate email
///
/// Loose on purpose: any `local@domain` substring with at least three
/// characters after the `@` is accepted, so intranet hosts such as
/// `ops@intranet` pass. Only the column width is enforced strictly.
pub fn valid_email(email: &str) -> bool {
    if email.chars().count() > EMAIL_MAX_LENGTH {
        return false;
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX
        .get_or_init(|| Regex::new(r"[\w.-]+@[\w.-]+.\w+").expect("Failed to compile email regex"));

    regex.is_match(email)
}

/// Validate password strength
pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= PASSWORD_MIN_LENGTH
}

/// Validate role name: 3 to 80 characters
pub fn valid_role_name(name: &str) -> bool {
    (ROLE_NAME_MIN_LENGTH..=ROLE_NAME_MAX_LENGTH).contains(&name.chars().count())
}

/// Validate an optional role description against the column width
pub fn valid_description(description: Option<&str>) -> bool {
    description.is_none_or(|text| text.chars().count() <= DESCRIPTION_MAX_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(valid_username("Darth_Vader"));
        assert!(valid_username("a.b-c"));
        assert!(valid_username("abc"));
        assert!(valid_username(&"x".repeat(30)));
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(!valid_username(""));
        assert!(!valid_username("ab"));
        assert!(!valid_username("test@user"));
        assert!(!valid_username("Darth Vader"));
        assert!(!valid_username(&"x".repeat(31)));
    }

    #[test]
    fn test_email_shape_is_permissive() {
        assert!(valid_email("mayforce@bewith.you"));
        assert!(valid_email("alice@x.com"));
        assert!(valid_email("Alice <alice@x.com>"));
        assert!(!valid_email("itsnotvalidemail"));
        assert!(valid_email("user@localhost"));
        assert!(valid_email("a@b-c"));
        assert!(valid_email("ops@intranet"));
        assert!(!valid_email("a@b"));
        assert!(!valid_email(""));
    }

    #[test]
    fn test_email_length_limit() {
        let local = "x".repeat(EMAIL_MAX_LENGTH - "@bewith.you".len());
        assert!(valid_email(&format!("{local}@bewith.you")));
        assert!(!valid_email(&format!("{local}x@bewith.you")));
    }

    #[test]
    fn test_password_length() {
        assert!(valid_password("12345678"));
        assert!(!valid_password("1234567"));
        assert!(!valid_password(""));
    }

    #[test]
    fn test_role_name_length() {
        assert!(valid_role_name("adm"));
        assert!(!valid_role_name("ad"));
        assert!(!valid_role_name(""));
        assert!(valid_role_name(&"r".repeat(80)));
        assert!(!valid_role_name(&"r".repeat(81)));
    }

    #[test]
    fn test_description_length() {
        assert!(valid_description(None));
        assert!(valid_description(Some("")));
        assert!(valid_description(Some(&"d".repeat(255))));
        assert!(!valid_description(Some(&"d".repeat(256))));
    }
}
