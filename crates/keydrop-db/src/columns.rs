//! Serde helpers for SQLite column shapes.
//!
//! SQLite has no boolean type and stores embedded documents as TEXT, so
//! structs read through [`Row::deserialize`](crate::Row::deserialize) use
//! these with `#[serde(deserialize_with = "...")]`.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};

/// Read an INTEGER 0/1 column as `bool`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Int(i) => i != 0,
    })
}

/// Read a TEXT column holding a JSON document.
pub fn json<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = String::deserialize(deserializer)?;
    serde_json::from_str(&raw).map_err(D::Error::custom)
}

/// Read a nullable TEXT column holding a JSON document.
pub fn json_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(D::Error::custom),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Row, Value};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Doc {
        #[serde(deserialize_with = "super::flag")]
        used: bool,
        #[serde(deserialize_with = "super::json")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "super::json_option")]
        extra: Option<Vec<i64>>,
    }

    #[test]
    fn test_flag_and_json_columns() {
        let row = Row::new(
            vec!["used".into(), "tags".into(), "extra".into()],
            vec![
                Value::Integer(1),
                Value::from(r#"["a","b"]"#),
                Value::Null,
            ],
        );
        let doc: Doc = row.deserialize().unwrap();
        assert!(doc.used);
        assert_eq!(doc.tags, vec!["a", "b"]);
        assert!(doc.extra.is_none());
    }

    #[test]
    fn test_json_option_present() {
        let row = Row::new(
            vec!["used".into(), "tags".into(), "extra".into()],
            vec![Value::Integer(0), Value::from("[]"), Value::from("[1,2]")],
        );
        let doc: Doc = row.deserialize().unwrap();
        assert!(!doc.used);
        assert_eq!(doc.extra, Some(vec![1, 2]));
    }
}
