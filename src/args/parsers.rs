use crate::config::parse_duration_value;
use crate::error::{ConfigError, ValidationError};

pub(super) fn parse_positive_u64(s: &str) -> Result<u64, ValidationError> {
    let value: u64 = s
        .trim()
        .parse()
        .map_err(|err| ValidationError::InvalidNumber { source: err })?;
    if value == 0 {
        return Err(ValidationError::ValueTooSmall { min: 1 });
    }
    Ok(value)
}

/// Validates a duration override but keeps it as written so it can be
/// reported verbatim.
pub(super) fn parse_duration_arg(s: &str) -> Result<String, ConfigError> {
    parse_duration_value(s)?;
    Ok(s.trim().to_owned())
}
