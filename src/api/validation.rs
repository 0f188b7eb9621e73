use super::ApiError;

const MAX_PAGE_SIZE: u64 = 100;

pub fn validate_id(id: i32, what: &str) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid {what} ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

/// Returns `(page, page_size)` with page starting at 1.
pub fn validate_page(page: u64, page_size: u64) -> Result<(u64, u64), ApiError> {
    if page == 0 {
        return Err(ApiError::validation("Page numbers start at 1"));
    }

    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(ApiError::validation(format!(
            "Invalid page size: {page_size}. Page size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    Ok((page, page_size))
}

pub fn validate_language_code(code: &str) -> Result<&str, ApiError> {
    let trimmed = code.trim();
    if trimmed.is_empty() || trimmed.len() > 10 {
        return Err(ApiError::validation("Language code must be 1-10 characters"));
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ApiError::validation(
            "Language code can only contain letters, digits, hyphens, and underscores",
        ));
    }

    Ok(trimmed)
}

pub fn validate_required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}
