//! Composite external identifiers.
//!
//! An identifier is an ordered list of field values joined by `/`, e.g.
//! `my-project/my-service/my-database`. Every call site decodes with the same
//! arity it encoded with. Field values containing `/` are not supported.

use crate::error::{CoreError, CoreResult};

pub const DELIMITER: char = '/';

/// Join ordered field values into one identifier.
pub fn build<S: AsRef<str>>(parts: &[S]) -> String {
    let mut id = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            id.push(DELIMITER);
        }
        id.push_str(part.as_ref());
    }
    id
}

/// The `a/b/c` template shown to users for an ordered field list.
pub fn template<S: AsRef<str>>(fields: &[S]) -> String {
    build(fields)
}

/// Split an identifier into exactly `n` segments.
pub fn split(id: &str, n: usize) -> CoreResult<Vec<String>> {
    split_between(id, n, n)
}

/// Split an identifier whose arity may vary between `min` and `max`
/// segments (inclusive), for identifiers with optional trailing fields.
pub fn split_between(id: &str, min: usize, max: usize) -> CoreResult<Vec<String>> {
    let parts: Vec<String> = id.split(DELIMITER).map(str::to_string).collect();
    if parts.len() < min || parts.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min}-{max}")
        };
        return Err(CoreError::InvalidIdentifier {
            id: id.to_string(),
            expected,
            got: parts.len(),
        });
    }
    Ok(parts)
}

pub fn split2(id: &str) -> CoreResult<(String, String)> {
    let mut p = split(id, 2)?.into_iter();
    Ok((take(&mut p), take(&mut p)))
}

pub fn split3(id: &str) -> CoreResult<(String, String, String)> {
    let mut p = split(id, 3)?.into_iter();
    Ok((take(&mut p), take(&mut p), take(&mut p)))
}

pub fn split4(id: &str) -> CoreResult<(String, String, String, String)> {
    let mut p = split(id, 4)?.into_iter();
    Ok((take(&mut p), take(&mut p), take(&mut p), take(&mut p)))
}

fn take(parts: &mut std::vec::IntoIter<String>) -> String {
    parts.next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_split_round_trip() {
        let fields = ["project", "service", "database"];
        let id = build(&fields);
        assert_eq!(id, "project/service/database");
        assert_eq!(split(&id, 3).unwrap(), fields);
    }

    #[test]
    fn test_split_rejects_wrong_arity() {
        let err = split("p/s", 3).unwrap_err();
        assert!(err.to_string().contains("\"p/s\""));
        assert!(err.to_string().contains("expected 3 segments, got 2"));

        // Extra segments are not folded into the last one.
        assert!(split("a/b/c/d", 3).is_err());
    }

    #[test]
    fn test_split_between_accepts_optional_trailing_segment() {
        assert_eq!(split_between("a/b/c/d", 4, 5).unwrap().len(), 4);
        assert_eq!(split_between("a/b/c/d/e", 4, 5).unwrap().len(), 5);

        let err = split_between("a/b/c", 4, 5).unwrap_err();
        assert!(err.to_string().contains("expected 4-5 segments"));
    }

    #[test]
    fn test_split_tuples() {
        assert_eq!(split2("a/b").unwrap(), ("a".to_string(), "b".to_string()));
        let (a, b, c, d) = split4("a/b/c/d").unwrap();
        assert_eq!([a, b, c, d], ["a", "b", "c", "d"]);
        assert!(split3("a/b").is_err());
    }

    #[test]
    fn test_template() {
        assert_eq!(
            template(&["project", "service_name", "database_name"]),
            "project/service_name/database_name"
        );
    }
}
