//! Test records as listed by the monitoring API.

use serde::{Deserialize, Serialize};

/// Minimal view of a remote test; only what the import workflow needs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTest {
    #[serde(default, deserialize_with = "optional_id")]
    pub test_id: Option<String>,
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default, rename = "type")]
    pub test_type: Option<String>,
    #[serde(default)]
    pub live_share: bool,
    #[serde(default)]
    pub saved_event: bool,
}

impl RemoteTest {
    pub fn new(test_id: &str, test_name: &str, test_type: &str) -> Self {
        Self {
            test_id: Some(test_id.to_string()),
            test_name: Some(test_name.to_string()),
            test_type: Some(test_type.to_string()),
            live_share: false,
            saved_event: false,
        }
    }

    /// Shared from another account or a saved event snapshot: not ours to manage.
    pub fn is_foreign(&self) -> bool {
        self.live_share || self.saved_event
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected test id, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_api_shape() {
        let test: RemoteTest = serde_json::from_str(
            r#"{"testId": 7486301, "testName": "AHC Testing", "type": "http-server", "liveShare": false}"#,
        )
        .unwrap();
        assert_eq!(test.test_id.as_deref(), Some("7486301"));
        assert_eq!(test.test_type.as_deref(), Some("http-server"));
        assert!(!test.is_foreign());
    }

    #[test]
    fn missing_fields_default() {
        let test: RemoteTest = serde_json::from_str(r#"{"savedEvent": true}"#).unwrap();
        assert_eq!(test.test_id, None);
        assert!(test.is_foreign());
    }
}
