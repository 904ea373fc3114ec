//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest player name accepted by the registry.
pub const MAX_PLAYER_NAME_CHARS: usize = 64;

/// Validates a player name: not blank, bounded, and free of control characters.
///
/// Names are identities, so surrounding whitespace is rejected instead of trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Ana María") // Ok
/// validate_player_name("  ")        // Err - blank
/// validate_player_name(" Ana")      // Err - surrounding whitespace
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be empty".into());
        return Err(err);
    }

    if name.trim() != name {
        let mut err = ValidationError::new("player_name_whitespace");
        err.message = Some("Player name must not start or end with whitespace".into());
        return Err(err);
    }

    let length = name.chars().count();
    if length > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_PLAYER_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some("Player name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}
