//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::config::TIMER_PRESETS;

/// Longest accepted player display name.
pub const MAX_PLAYER_NAME: usize = 24;
/// Longest accepted room display name.
pub const MAX_ROOM_NAME: usize = 40;
/// Longest accepted clue or custom word.
pub const MAX_WORD: usize = 32;
/// Most custom words a room may configure.
pub const MAX_CUSTOM_WORDS: usize = 200;
/// Longest accepted reaction emoji string.
pub const MAX_EMOJI: usize = 16;
/// Longest accepted chat message body.
pub const MAX_MESSAGE_BODY: usize = 500;

/// Validates that a room code is 2 to 12 alphanumeric ASCII characters.
///
/// Codes are case-normalized elsewhere; both `t1` and `T1` refer to the same
/// room, so case is accepted here.
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let trimmed = code.trim();
    if !(2..=12).contains(&trimmed.len()) {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be 2 to 12 characters (got {})",
                trimmed.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a player display name: non-blank, at most [`MAX_PLAYER_NAME`]
/// characters after trimming.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    bounded_text(name, MAX_PLAYER_NAME, "player_name")
}

/// Validates a room display name: non-blank, at most [`MAX_ROOM_NAME`]
/// characters after trimming.
pub fn validate_room_name(name: &str) -> Result<(), ValidationError> {
    bounded_text(name, MAX_ROOM_NAME, "room_name")
}

/// Validates a clue word: one token, no whitespace, at most [`MAX_WORD`]
/// characters.
pub fn validate_clue_word(word: &str) -> Result<(), ValidationError> {
    let trimmed = word.trim();
    bounded_text(trimmed, MAX_WORD, "clue_word")?;

    if trimmed.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("clue_word_whitespace");
        err.message = Some("Clue must be a single word".into());
        return Err(err);
    }

    Ok(())
}

/// Validates the custom word list: at most [`MAX_CUSTOM_WORDS`] entries, each
/// non-blank and at most [`MAX_WORD`] characters.
pub fn validate_custom_words(words: &[String]) -> Result<(), ValidationError> {
    if words.len() > MAX_CUSTOM_WORDS {
        let mut err = ValidationError::new("custom_words_count");
        err.message = Some(
            format!(
                "At most {MAX_CUSTOM_WORDS} custom words allowed (got {})",
                words.len()
            )
            .into(),
        );
        return Err(err);
    }

    for word in words {
        bounded_text(word, MAX_WORD, "custom_word")?;
    }

    Ok(())
}

/// Validates a reaction emoji: non-blank, at most [`MAX_EMOJI`] characters.
pub fn validate_emoji(emoji: &str) -> Result<(), ValidationError> {
    bounded_text(emoji, MAX_EMOJI, "emoji")
}

/// Validates a chat message body: non-blank, at most [`MAX_MESSAGE_BODY`]
/// characters.
pub fn validate_message_body(body: &str) -> Result<(), ValidationError> {
    bounded_text(body, MAX_MESSAGE_BODY, "message_body")
}

/// Validates that a timer value is one of the supported presets.
pub fn validate_timer_preset(secs: u32) -> Result<(), ValidationError> {
    if TIMER_PRESETS.contains(&secs) {
        return Ok(());
    }

    let mut err = ValidationError::new("timer_preset");
    err.message = Some(format!("Timer must be one of {TIMER_PRESETS:?} seconds").into());
    Err(err)
}

fn bounded_text(value: &str, max: usize, code: &'static str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new(code);
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }

    if trimmed.chars().count() > max {
        let mut err = ValidationError::new(code);
        err.message = Some(format!("Value must be at most {max} characters").into());
        return Err(err);
    }

    Ok(())
}
