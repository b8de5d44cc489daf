//! Wire shapes of the course catalog API.
//!
//! The upstream service is loose about types: ids arrive as numbers or strings,
//! names and links may be null. Everything here deserializes leniently and
//! leaves filtering to `crate::extract`.

use crate::model::BatchSummary;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `GET course/{course}/{is_live}/{user}`
#[derive(Deserialize, Debug, Default)]
pub struct BatchListResponse {
    #[serde(default)]
    pub data: Option<Vec<BatchSummary>>,
}

/// `GET getCourseDataByTopic-v2/{batch}/{user}`
#[derive(Deserialize, Debug, Default)]
pub struct BatchContentResponse {
    #[serde(default)]
    pub data: Option<BatchContent>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchContent {
    #[serde(default)]
    pub free_class: Option<Vec<ClassEntry>>,
    #[serde(default)]
    pub paid_class: Option<Vec<TopicGroup>>,
}

/// A paid topic grouping several classes.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct TopicGroup {
    #[serde(rename = "class", default)]
    pub classes: Option<Vec<ClassEntry>>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub link: Option<String>,
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

pub(crate) fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_ids_accept_numbers_and_strings() {
        let resp: BatchListResponse = serde_json::from_value(json!({
            "data": [
                {"id": 17, "title": "Physics"},
                {"id": "abc", "title": "Chemistry", "extra": true}
            ]
        }))
        .unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data[0].id, "17");
        assert_eq!(data[1].id, "abc");
        assert_eq!(data[1].title, "Chemistry");

        let untitled: BatchSummary = serde_json::from_value(json!({"id": 3, "title": null})).unwrap();
        assert_eq!(untitled.title, "");
    }

    #[test]
    fn missing_or_null_fields_are_tolerated() {
        let resp: BatchContentResponse = serde_json::from_value(json!({
            "data": {
                "free_class": [{"class_name": null, "link": null}, {"link": 5}],
                "paid_class": [{"topic": "x"}]
            }
        }))
        .unwrap();
        let content = resp.data.unwrap();
        let free = content.free_class.unwrap();
        assert_eq!(free[0], ClassEntry::default());
        assert_eq!(free[1].link.as_deref(), Some("5"));
        assert!(content.paid_class.unwrap()[0].classes.is_none());

        let empty: BatchListResponse = serde_json::from_value(json!({"status": false})).unwrap();
        assert!(empty.data.is_none());
    }
}
