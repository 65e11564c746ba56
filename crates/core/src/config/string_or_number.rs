//! Deserializers for string settings that may arrive as numbers.
//!
//! Figment parses environment values, so `AVPACKAGER_ARCHIVESSPACE__REPOSITORY=2`
//! reaches serde as an integer rather than the string `"2"`.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Unsigned(n) => n.to_string(),
            Self::Signed(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarOrList {
    List(Vec<Scalar>),
    One(Scalar),
}

/// A string, or any scalar rendered as one.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(Scalar::into_string)
}

/// A list of strings. A single string is split on commas.
pub fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ScalarOrList::deserialize(deserializer)? {
        ScalarOrList::List(items) => items.into_iter().map(Scalar::into_string).collect(),
        ScalarOrList::One(Scalar::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        ScalarOrList::One(other) => vec![other.into_string()],
    })
}
