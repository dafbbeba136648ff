use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Image names known to the server, in the order it reported them.
///
/// The server sends `images` either as a JSON array or as one comma-delimited
/// string. Both shapes are folded into this type at the API boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageList(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum ImagesField {
    List(Vec<String>),
    Delimited(String),
}

impl ImageList {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value::<ImagesField>(value.clone()) {
            Ok(ImagesField::List(names)) => Self(names),
            Ok(ImagesField::Delimited(text)) => Self::from_delimited(&text),
            Err(_) if value.is_null() => Self::default(),
            Err(_) => {
                // Mixed arrays and scalars: stringify and split like a delimited list
                let text = match value {
                    Value::Array(items) => items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect::<Vec<_>>()
                        .join(","),
                    other => other.to_string(),
                };
                Self::from_delimited(&text)
            }
        }
    }

    fn from_delimited(text: &str) -> Self {
        Self(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Body of restore-image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub image: String,
    pub clients_to_wait: u32,
    /// Seconds
    pub max_time_to_wait: u32,
}

/// Body of save-image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveRequest {
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_images_from_array() {
        let list = ImageList::from_value(&json!(["win11-lab", "ubuntu-24"]));
        assert_eq!(list.into_vec(), vec!["win11-lab", "ubuntu-24"]);
    }

    #[test]
    fn test_images_from_delimited_string() {
        let list = ImageList::from_value(&json!(" win11-lab, ubuntu-24 ,,"));
        assert_eq!(list.len(), 2);
        assert!(list.contains("win11-lab"));
        assert!(list.contains("ubuntu-24"));
        assert!(!list.contains(""));
    }

    #[test]
    fn test_images_from_empty_string_and_null() {
        assert!(ImageList::from_value(&json!("")).is_empty());
        assert!(ImageList::from_value(&Value::Null).is_empty());
    }

    #[test]
    fn test_images_from_mixed_array() {
        let list = ImageList::from_value(&json!(["lab-a", 42]));
        assert_eq!(list.into_vec(), vec!["lab-a", "42"]);
    }

    #[test]
    fn test_restore_request_wire_names() {
        let body = serde_json::to_value(RestoreRequest {
            image: "lab-a".to_string(),
            clients_to_wait: 2,
            max_time_to_wait: 60,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"image": "lab-a", "clientsToWait": 2, "maxTimeToWait": 60})
        );
    }
}
