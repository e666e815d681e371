pub mod events;
pub mod registry;
pub mod sherlock;
pub mod supervisor;

use once_cell::sync::Lazy;
use regex::Regex;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]{1,64}$").expect("username pattern is valid"));

/// Validate a username before any process is spawned for it.
///
/// Accepts 1-64 characters drawn from letters, digits, `.`, `_` and `-`.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username cannot be empty.".to_string());
    }
    if username.len() > 64 {
        return Err("Username is too long (max 64 characters).".to_string());
    }
    if !USERNAME_RE.is_match(username) {
        return Err(
            "Username contains invalid characters. Only letters, numbers, '.', '_' and '-' are allowed."
                .to_string(),
        );
    }
    Ok(())
}
