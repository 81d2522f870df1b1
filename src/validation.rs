use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::types::RoleCredential;

pub const MAX_USERNAME_LEN: usize = 32;
const MAX_DATABASE_NAME_LEN: usize = 64;
const MAX_HOSTNAME_LEN: usize = 253;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn validate_name(name: &str, entity: &str, max_len: usize) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{entity} cannot be empty"));
    }
    if name.len() > max_len {
        return Err(format!("{entity} cannot exceed {max_len} characters"));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(format!(
            "{entity} can only contain alphanumeric characters and underscores"
        ));
    }
    Ok(())
}

pub fn validate_username(name: &str) -> Result<(), String> {
    validate_name(name, "username", MAX_USERNAME_LEN)
}

pub fn validate_database_name(name: &str) -> Result<(), String> {
    validate_name(name, "database name", MAX_DATABASE_NAME_LEN)
}

/// Accepts a simple name, a dotted name, or an IPv4 address.
pub fn validate_hostname(host: &str) -> Result<(), String> {
    if host.is_empty() {
        return Err("hostname cannot be empty".to_string());
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(format!("hostname cannot exceed {MAX_HOSTNAME_LEN} characters"));
    }

    let labels: Vec<&str> = host.split('.').collect();
    let numeric = labels.iter().all(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_digit()));
    if numeric {
        if labels.len() == 4 && labels.iter().all(|l| l.parse::<u8>().is_ok()) {
            return Ok(());
        }
        return Err(format!("hostname {host} is not a valid IPv4 address"));
    }

    let valid_label = |l: &&str| {
        !l.is_empty()
            && l.len() <= 63
            && !l.starts_with('-')
            && !l.ends_with('-')
            && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !labels.iter().all(valid_label) {
        return Err(format!("hostname {host} is invalid"));
    }
    Ok(())
}

pub fn validate_port(port: &str) -> Result<(), String> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("port {port:?} must be a number between 1 and 65535")),
        Ok(_) => Ok(()),
    }
}

const MIN_PASSWORD_LEN: usize = 8;

fn is_special(c: char) -> bool {
    c.is_ascii_punctuation() || !(c.is_alphanumeric() || c.is_whitespace() || c.is_control())
}

/// Requires a lowercase and an uppercase letter, a digit and a special
/// character, and more than eight of those in total. Whitespace and
/// uncased letters are allowed but do not count toward the length.
///
/// Passwords end up in a line-oriented artifact and in DDL literals, so
/// control characters are refused outright.
pub fn validate_password(password: &str) -> Result<(), Vec<String>> {
    if password.is_empty() {
        return Err(vec!["password cannot be empty".to_string()]);
    }
    if password.chars().any(char::is_control) {
        return Err(vec!["password cannot contain control characters".to_string()]);
    }

    let (mut lower, mut upper, mut digit, mut special) = (false, false, false, false);
    let mut counted = 0;
    for c in password.chars() {
        if c.is_numeric() {
            digit = true;
        } else if c.is_uppercase() {
            upper = true;
        } else if c.is_lowercase() {
            lower = true;
        } else if is_special(c) {
            special = true;
        } else {
            continue;
        }
        counted += 1;
    }

    let reasons: Vec<String> = [
        (lower, "lowercase letter missing".to_string()),
        (upper, "uppercase letter missing".to_string()),
        (digit, "at least one numeric character required".to_string()),
        (special, "at least one special character required".to_string()),
        (
            counted > MIN_PASSWORD_LEN,
            format!("password must be longer than {MIN_PASSWORD_LEN} characters"),
        ),
    ]
    .into_iter()
    .filter_map(|(ok, reason)| (!ok).then_some(reason))
    .collect();

    if reasons.is_empty() { Ok(()) } else { Err(reasons) }
}

/// Checks every field of one credential, returning all problems found.
#[must_use]
pub fn check_credential(label: &str, credential: &RoleCredential) -> Vec<ValidationError> {
    let checks = [
        ("hostname", validate_hostname(&credential.host).map_err(|r| vec![r])),
        ("port", validate_port(&credential.port).map_err(|r| vec![r])),
        ("username", validate_username(&credential.username).map_err(|r| vec![r])),
        ("password", validate_password(&credential.password)),
    ];

    checks
        .into_iter()
        .flat_map(|(field, result)| {
            result
                .err()
                .unwrap_or_default()
                .into_iter()
                .map(move |reason| ValidationError::InvalidField {
                    field: format!("{label} {field}"),
                    reason,
                })
        })
        .collect()
}

/// Host part of a server account: a hostname, an address, or a `%`/`_`
/// wildcard pattern.
pub fn validate_account_host(host: &str) -> Result<(), String> {
    if host.is_empty() {
        return Err("account host cannot be empty".to_string());
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(format!("account host cannot exceed {MAX_HOSTNAME_LEN} characters"));
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '%'))
    {
        return Err(format!("account host {host:?} contains unsupported characters"));
    }
    Ok(())
}

fn occurrences<'a, I>(values: I) -> BTreeMap<&'a str, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

/// Reports every username and password that occurs more than once.
///
/// Runs to completion so all violations are returned together. Password
/// errors never include the password itself.
pub fn validate_unique<'a, U, P>(usernames: U, passwords: P) -> Result<(), Vec<ValidationError>>
where
    U: IntoIterator<Item = &'a str>,
    P: IntoIterator<Item = &'a str>,
{
    let mut errors: Vec<ValidationError> = occurrences(usernames)
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(name, count)| ValidationError::DuplicateUsername {
            name: name.to_string(),
            count,
        })
        .collect();

    errors.extend(
        occurrences(passwords)
            .into_values()
            .filter(|&count| count > 1)
            .map(|count| ValidationError::DuplicatePassword { count }),
    );

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_unique_all_distinct() {
        assert!(
            validate_unique(["root", "mig", "w", "r"], ["A", "B", "C", "D"]).is_ok()
        );
    }

    #[test]
    fn test_validate_unique_duplicate_username() {
        let errors = validate_unique(["root", "mig", "mig", "r"], ["A", "B", "C", "D"]).unwrap_err();
        assert_eq!(
            errors,
            [ValidationError::DuplicateUsername {
                name: "mig".to_string(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_validate_unique_duplicate_password() {
        let errors = validate_unique(["root", "mig", "w", "r"], ["A", "B", "B", "B"]).unwrap_err();
        assert_eq!(errors, [ValidationError::DuplicatePassword { count: 3 }]);
        assert!(!errors[0].to_string().contains('B'));
    }

    #[test]
    fn test_validate_unique_collects_everything() {
        let errors = validate_unique(["a", "a", "b", "b"], ["x", "x", "y", "z"]).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_validate_hostname() {
        assert!(validate_hostname("localhost").is_ok());
        assert!(validate_hostname("db1").is_ok());
        assert!(validate_hostname("db-1.internal.example.com").is_ok());
        assert!(validate_hostname("127.0.0.1").is_ok());
        assert!(validate_hostname("256.0.0.1").is_err());
        assert!(validate_hostname("10.0.1").is_err());
        assert!(validate_hostname("db#1").is_err());
        assert!(validate_hostname("db..internal").is_err());
        assert!(validate_hostname("").is_err());
    }

    #[test]
    fn test_validate_port() {
        assert!(validate_port("3306").is_ok());
        assert!(validate_port("0").is_err());
        assert!(validate_port("65536").is_err());
        assert!(validate_port("33a").is_err());
    }

    #[test]
    fn test_validate_username_and_database() {
        assert!(validate_username("holistic_w").is_ok());
        assert!(validate_username("bad-name").is_err());
        assert!(validate_username(&"u".repeat(33)).is_err());
        assert!(validate_database_name("holistic").is_ok());
        assert!(validate_database_name("drop table").is_err());
    }

    #[test]
    fn test_check_credential_reports_each_field() {
        let cred = RoleCredential {
            host: "db#1".to_string(),
            port: "x".to_string(),
            database: "holistic".to_string(),
            username: "ok".to_string(),
            password: "line\nbreak".to_string(),
            pool_index: None,
        };
        let errors = check_credential("write", &cred);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].to_string().starts_with("invalid write hostname"));
    }

    #[test]
    fn test_weak_password_reports_every_gap() {
        let cred = RoleCredential {
            host: "db1".to_string(),
            port: "3306".to_string(),
            database: "holistic".to_string(),
            username: "ok".to_string(),
            password: "short".to_string(),
            pool_index: None,
        };
        let errors = check_credential("read", &cred);
        // uppercase, digit, special, length
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(|e| e.to_string().starts_with("invalid read password")));
        assert!(errors.iter().all(|e| !e.to_string().contains("short")));
    }

    #[test]
    fn test_validate_password_classes() {
        assert!(validate_password("Str0ng#Pass").is_ok());
        assert!(validate_password("Üñï©0d€#Ab").is_ok());
        assert_eq!(
            validate_password("STR0NG#PASS").unwrap_err(),
            ["lowercase letter missing"]
        );
        assert_eq!(
            validate_password("str0ng#pass").unwrap_err(),
            ["uppercase letter missing"]
        );
        assert_eq!(
            validate_password("Strong#Pass").unwrap_err(),
            ["at least one numeric character required"]
        );
        assert_eq!(
            validate_password("Str0ngPass1").unwrap_err(),
            ["at least one special character required"]
        );
    }

    #[test]
    fn test_validate_password_length_boundary() {
        // eight counted characters is one too few
        assert_eq!(
            validate_password("Ab1#Ab1#").unwrap_err(),
            ["password must be longer than 8 characters"]
        );
        assert!(validate_password("Ab1#Ab1#c").is_ok());
        // spaces are allowed but not counted
        assert!(validate_password("Ab1# Ab1#").is_err());
        assert!(validate_password("Ab1# Ab1#c").is_ok());
    }

    #[test]
    fn test_validate_password_rejects_control_characters() {
        assert!(validate_password("").is_err());
        assert_eq!(
            validate_password("Str0ng#\nPass").unwrap_err(),
            ["password cannot contain control characters"]
        );
    }

    #[test]
    fn test_validate_account_host() {
        assert!(validate_account_host("%").is_ok());
        assert!(validate_account_host("10.0.%").is_ok());
        assert!(validate_account_host("db-1.internal").is_ok());
        assert!(validate_account_host("").is_err());
        assert!(validate_account_host("x' y").is_err());
        assert!(validate_account_host("db1`").is_err());
    }
}
