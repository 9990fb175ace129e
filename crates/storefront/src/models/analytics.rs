//! Analytics events forwarded by the browser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted event name.
pub const MAX_NAME_LENGTH: usize = 100;

/// Longest accepted page path.
pub const MAX_PATH_LENGTH: usize = 2048;

/// Event as posted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsPayload {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// A stored analytics event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub name: String,
    pub path: Option<String>,
    pub properties: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl AnalyticsPayload {
    /// Check the payload and stamp it.
    ///
    /// # Errors
    ///
    /// Returns a message if the name is blank or a field is too long, or if
    /// `properties` is neither absent nor an object.
    pub fn into_event(self, received_at: DateTime<Utc>) -> Result<AnalyticsEvent, &'static str> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("event name is required");
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err("event name is too long");
        }
        if self.path.as_ref().is_some_and(|p| p.len() > MAX_PATH_LENGTH) {
            return Err("path is too long");
        }
        let properties = match self.properties {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            props @ serde_json::Value::Object(_) => props,
            _ => return Err("properties must be an object"),
        };

        Ok(AnalyticsEvent {
            name: name.to_owned(),
            path: self.path,
            properties,
            received_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(json: &str) -> AnalyticsPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_payload() {
        let event = payload(r#"{"name":" page_view ","path":"/evenimente"}"#)
            .into_event(Utc::now())
            .unwrap();
        assert_eq!(event.name, "page_view");
        assert!(event.properties.is_object());
    }

    #[test]
    fn test_rejects_blank_name_and_scalar_properties() {
        assert!(payload(r#"{"name":"  "}"#).into_event(Utc::now()).is_err());
        assert!(
            payload(r#"{"name":"x","properties":3}"#)
                .into_event(Utc::now())
                .is_err()
        );
    }
}
