use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("`{field}` value `{value}` cannot be used as a path segment")]
    InvalidPathSegment { field: &'static str, value: String },
}

impl DomainError {
    pub fn invalid_segment(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidPathSegment {
            field,
            value: value.into(),
        }
    }
}

/// Split a mount path such as `/guides/api/` into validated path segments.
///
/// Segments may not be empty after trimming, may not be `.` or `..`, and may
/// not contain a backslash.
pub fn path_segments(field: &'static str, value: &str) -> Result<Vec<String>, DomainError> {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(DomainError::invalid_segment(field, value));
    }

    trimmed
        .split('/')
        .map(|segment| {
            let segment = segment.trim();
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\')
            {
                Err(DomainError::invalid_segment(field, value))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}

/// Validate a single path segment (no `/` allowed).
pub fn path_segment(field: &'static str, value: &str) -> Result<String, DomainError> {
    if value.contains('/') {
        return Err(DomainError::invalid_segment(field, value));
    }
    let mut segments = path_segments(field, value)?;
    segments
        .pop()
        .ok_or_else(|| DomainError::invalid_segment(field, value))
}
