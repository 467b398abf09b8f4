//! Input validation utilities

/// Longest accepted override reason
pub const MAX_REASON_LEN: usize = 500;

/// Upper bound for both generation window sides
pub const MAX_WINDOW_MONTHS: u32 = 24;

/// Longest accepted kiosk device identifier
pub const MAX_DEVICE_ID_LEN: usize = 128;

/// Validate a kiosk device identifier
///
/// Device ids are opaque to the server: any non-blank text up to
/// [`MAX_DEVICE_ID_LEN`] characters is accepted.
pub fn validate_device_id(device_id: &str) -> Result<(), String> {
    if device_id.trim().is_empty() {
        return Err("deviceId is required".to_string());
    }

    if device_id.chars().count() > MAX_DEVICE_ID_LEN {
        return Err(format!(
            "deviceId must be at most {} characters long",
            MAX_DEVICE_ID_LEN
        ));
    }

    Ok(())
}

/// Validate a supervisor override reason, returning it trimmed
pub fn validate_reason(reason: Option<&str>) -> Result<String, String> {
    let reason = reason.map(str::trim).unwrap_or_default();

    if reason.is_empty() {
        return Err("reason is required".to_string());
    }

    if reason.chars().count() > MAX_REASON_LEN {
        return Err(format!(
            "reason must be at most {} characters long",
            MAX_REASON_LEN
        ));
    }

    Ok(reason.to_string())
}

/// Validate one side of the period generation window
pub fn validate_window_months(field: &str, months: u32) -> Result<u32, String> {
    if months > MAX_WINDOW_MONTHS {
        return Err(format!(
            "{} must be between 0 and {}",
            field, MAX_WINDOW_MONTHS
        ));
    }

    Ok(months)
}
