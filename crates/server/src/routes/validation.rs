//! Identifier and required-field checks applied before any write.

use crate::error::ApiError;

/// A create request must not carry an id.
pub fn require_new(entity_name: &'static str, body_id: Option<i64>) -> Result<(), ApiError> {
    match body_id {
        Some(_) => Err(ApiError::bad_request(
            entity_name,
            "idexists",
            format!("A new {entity_name} cannot already have an ID"),
        )),
        None => Ok(()),
    }
}

/// PUT/PATCH: the body id must be present and equal to the path id.
/// Existence is checked separately, inside the write transaction.
pub fn require_matching_id(
    entity_name: &'static str,
    path_id: i64,
    body_id: Option<i64>,
) -> Result<(), ApiError> {
    match body_id {
        None => Err(ApiError::bad_request(entity_name, "idnull", "Invalid id")),
        Some(id) if id != path_id => Err(ApiError::bad_request(entity_name, "idinvalid", "Invalid ID")),
        Some(_) => Ok(()),
    }
}

pub fn require_existing(entity_name: &'static str, exists: bool) -> Result<(), ApiError> {
    if exists {
        Ok(())
    } else {
        Err(ApiError::bad_request(entity_name, "idnotfound", "Entity not found"))
    }
}

pub fn require_title(entity_name: &'static str, title: Option<&str>) -> Result<(), ApiError> {
    match title {
        Some(title) if !title.trim().is_empty() => Ok(()),
        _ => Err(ApiError::bad_request(
            entity_name,
            "titlerequired",
            "Title is required",
        )),
    }
}

/// A referenced entity that does not exist, named by its own entity name.
pub fn missing_reference(entity_name: &'static str, id: i64) -> ApiError {
    ApiError::bad_request(
        entity_name,
        "idnotfound",
        format!("Referenced {entity_name} {id} not found"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(result: Result<(), ApiError>) -> Option<&'static str> {
        match result {
            Err(ApiError::BadRequestAlert { error_key, .. }) => Some(error_key),
            _ => None,
        }
    }

    #[test]
    fn id_rules() {
        assert_eq!(key(require_new("conference", Some(1))), Some("idexists"));
        assert_eq!(key(require_new("conference", None)), None);
        assert_eq!(key(require_matching_id("session", 1, None)), Some("idnull"));
        assert_eq!(key(require_matching_id("session", 1, Some(2))), Some("idinvalid"));
        assert_eq!(key(require_matching_id("session", 1, Some(1))), None);
        assert_eq!(key(require_existing("session", false)), Some("idnotfound"));
    }

    #[test]
    fn blank_title_is_missing() {
        assert_eq!(key(require_title("session", Some("  "))), Some("titlerequired"));
        assert_eq!(key(require_title("session", None)), Some("titlerequired"));
        assert_eq!(key(require_title("session", Some("Intro"))), None);
    }
}
