// Shape and range checks applied before a request reaches the monitor core.

use serde::de::DeserializeOwned;

use crate::api::error::ApiError;
use crate::monitors::schedule::try_parse_schedule;

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_MESSAGE_CHARS: usize = 500;
pub const MAX_REASON_CHARS: usize = 500;
pub const MAX_DURATION_MS: i64 = 86_400_000;
pub const MIN_GRACE_MINUTES: i32 = 1;
pub const MAX_GRACE_MINUTES: i32 = 1440;

fn invalid(msg: impl Into<String>) -> ApiError {
    ApiError::Validation(msg.into())
}

/// Parses an optional JSON body; an empty body yields `T::default()`.
pub fn optional_json_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| invalid(format!("invalid JSON body: {e}")))
}

pub fn required_json_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(invalid("request body is required"));
    }
    serde_json::from_slice(bytes).map_err(|e| invalid(format!("invalid JSON body: {e}")))
}

pub fn name(value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(invalid("name is required"));
    }
    if v.chars().count() > MAX_NAME_CHARS {
        return Err(invalid(format!("name must be at most {MAX_NAME_CHARS} characters")));
    }
    Ok(v.to_string())
}

pub fn schedule(value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(invalid("schedule is required"));
    }
    if try_parse_schedule(v).is_none() {
        return Err(invalid(
            "schedule not recognised; use e.g. \"every 5 minutes\", \"every hour\", \"daily\", \"weekly\"",
        ));
    }
    Ok(v.to_string())
}

pub fn grace_minutes(value: i32) -> Result<i32, ApiError> {
    if !(MIN_GRACE_MINUTES..=MAX_GRACE_MINUTES).contains(&value) {
        return Err(invalid(format!(
            "grace_minutes must be between {MIN_GRACE_MINUTES} and {MAX_GRACE_MINUTES}"
        )));
    }
    Ok(value)
}

pub fn duration_ms(value: Option<i64>) -> Result<Option<i64>, ApiError> {
    match value {
        Some(d) if !(0..=MAX_DURATION_MS).contains(&d) => Err(invalid(format!(
            "duration must be between 0 and {MAX_DURATION_MS} ms"
        ))),
        other => Ok(other),
    }
}

pub fn message(value: Option<String>) -> Result<Option<String>, ApiError> {
    match value {
        Some(m) if m.chars().count() > MAX_MESSAGE_CHARS => Err(invalid(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        ))),
        other => Ok(other),
    }
}

pub fn pause_reason(value: Option<String>) -> Result<Option<String>, ApiError> {
    match value {
        Some(r) if r.chars().count() > MAX_REASON_CHARS => Err(invalid(format!(
            "reason must be at most {MAX_REASON_CHARS} characters"
        ))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unrecognised_schedule() {
        assert!(schedule("every 5 minutes").is_ok());
        assert!(schedule("  ").is_err());
        assert!(schedule("at noon-ish").is_err());
    }

    #[test]
    fn ranges() {
        assert!(grace_minutes(0).is_err());
        assert!(grace_minutes(15).is_ok());
        assert!(grace_minutes(1441).is_err());

        assert!(duration_ms(Some(-1)).is_err());
        assert_eq!(duration_ms(Some(MAX_DURATION_MS)).unwrap(), Some(MAX_DURATION_MS));
        assert!(duration_ms(Some(MAX_DURATION_MS + 1)).is_err());

        assert!(message(Some("x".repeat(500))).is_ok());
        assert!(message(Some("x".repeat(501))).is_err());
    }

    #[test]
    fn pause_reason_is_kept_verbatim() {
        assert_eq!(
            pause_reason(Some("  db migration \n".into())).unwrap().as_deref(),
            Some("  db migration \n")
        );
        assert_eq!(pause_reason(Some(String::new())).unwrap().as_deref(), Some(""));
        assert!(pause_reason(None).unwrap().is_none());
        assert!(pause_reason(Some("r".repeat(500))).is_ok());
        assert!(pause_reason(Some("r".repeat(501))).is_err());
    }

    #[test]
    fn empty_body_defaults_only_when_optional() {
        #[derive(Debug, Default, serde::Deserialize)]
        struct Body {
            success: Option<bool>,
        }

        let b: Body = optional_json_body(b"").unwrap();
        assert!(b.success.is_none());
        assert!(required_json_body::<Body>(b" ").is_err());
        assert!(optional_json_body::<Body>(b"{not json").is_err());
    }
}
