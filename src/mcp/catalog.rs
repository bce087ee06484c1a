//! Searchable catalog of robot resources behind the `search` and `fetch` tools

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::joint::{JointAngles, JointIndex, JointLimits, JOINT_COUNT};

use super::client::RobotApiClient;
use super::error::ToolError;

/// Tools that move or halt the arm, advertised by the `movements` entry
pub const MOVEMENT_TOOLS: [&str; 6] = [
    "move_joint",
    "move_all_joints",
    "home_position",
    "jog_joint",
    "stop_robot",
    "wait_for_completion",
];

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<JointLimits>,
    #[serde(skip)]
    joint: Option<JointIndex>,
}

impl CatalogEntry {
    fn new(id: &str, kind: &'static str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            name: None,
            description: description.to_string(),
            limits: None,
            joint: None,
        }
    }

    fn joint(index: JointIndex, description: &str) -> Self {
        let limits = index.limits();
        Self {
            id: format!("joint_{index}"),
            kind: "joint",
            name: Some(format!("{} Joint", index.name())),
            description: format!(
                "{description} (Joint {index}). Limits {} to +{} degrees",
                limits.min, limits.max
            ),
            limits: Some(limits),
            joint: Some(index),
        }
    }

    pub fn title(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            let mut title = self.id.replace('_', " ");
            if let Some(first) = title.get_mut(..1) {
                first.make_ascii_uppercase();
            }
            title
        })
    }

    fn searchable(&self) -> String {
        let mut text = format!("{} {} {}", self.id, self.kind, self.description);
        if let Some(name) = &self.name {
            text.push(' ');
            text.push_str(name);
        }
        text.to_lowercase()
    }

    /// Whole query as a substring, or every whitespace-separated keyword present
    pub fn matches(&self, query: &str) -> bool {
        let text = self.searchable();
        let query = query.trim().to_lowercase();
        text.contains(&query) || query.split_whitespace().all(|word| text.contains(word))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total_matches: usize,
    pub available_resources: Vec<String>,
}

pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        const JOINT_DESCRIPTIONS: [&str; JOINT_COUNT] = [
            "Base rotation joint",
            "Shoulder joint",
            "Elbow joint",
            "First wrist rotation joint",
            "Second wrist rotation joint",
            "Third wrist rotation joint",
        ];

        let mut entries = vec![CatalogEntry::new(
            "robot_status",
            "status",
            "Current robot status including joint angles and movement state",
        )];
        entries.extend(
            JointIndex::all()
                .zip(JOINT_DESCRIPTIONS)
                .map(|(index, description)| CatalogEntry::joint(index, description)),
        );
        entries.push(CatalogEntry::new(
            "movements",
            "capability",
            "Available robot movement capabilities and control methods",
        ));
        entries.push(CatalogEntry::new(
            "home_position",
            "position",
            "Robot home position (all joints at 0 degrees)",
        ));
        Self { entries }
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn search(&self, query: &str) -> SearchResults {
        let results: Vec<SearchHit> = self
            .entries
            .iter()
            .filter(|e| e.matches(query))
            .map(|e| SearchHit {
                id: e.id.clone(),
                title: e.title(),
                snippet: e.description.clone(),
            })
            .collect();
        SearchResults {
            query: query.to_string(),
            total_matches: results.len(),
            results,
            available_resources: self.ids(),
        }
    }

    /// Full entry, enriched with live data where the resource has any.
    ///
    /// Live lookups that fail are reported in an `error` field; only an
    /// unknown id is an error.
    pub async fn fetch(&self, id: &str, api: &RobotApiClient) -> Result<Value, ToolError> {
        let entry = self
            .get(id)
            .ok_or_else(|| ToolError::NotFound(format!("Resource not found: {id}")))?;
        let mut doc = match serde_json::to_value(entry) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        match (entry.id.as_str(), entry.joint) {
            ("robot_status", _) => match api.status().await {
                Ok(status) => {
                    doc.insert("current_data".into(), json!(status));
                    doc.insert("timestamp".into(), json!("real-time"));
                }
                Err(e) => {
                    doc.insert("error".into(), json!(format!("Could not fetch real-time status: {e}")));
                }
            },
            (_, Some(joint)) => match api.joint_angle(i64::from(joint.get())).await {
                Ok(reading) => {
                    doc.insert("current_angle".into(), json!(reading.angle));
                    doc.insert("timestamp".into(), json!("real-time"));
                }
                Err(e) => {
                    doc.insert("error".into(), json!(format!("Could not fetch real-time angle: {e}")));
                }
            },
            ("movements", _) => {
                doc.insert("available_tools".into(), json!(MOVEMENT_TOOLS));
                doc.insert(
                    "capabilities".into(),
                    json!({
                        "individual_joint_control": true,
                        "simultaneous_movement": true,
                        "position_feedback": true,
                        "emergency_stop": true,
                        "speed_control": true,
                    }),
                );
            }
            ("home_position", _) => {
                doc.insert("target_angles".into(), json!(JointAngles::HOME.as_slice()));
            }
            _ => {}
        }
        Ok(Value::Object(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::ApiClientConfig;
    use std::time::Duration;

    fn offline_api() -> RobotApiClient {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        RobotApiClient::new(ApiClientConfig {
            read_attempts: 1,
            timeout: Duration::from_secs(1),
            ..ApiClientConfig::new("127.0.0.1", port)
        })
        .unwrap()
    }

    #[test]
    fn joint_limits_query_finds_every_joint() {
        let results = Catalog::new().search("joint limits");
        assert_eq!(results.total_matches, 6);
        assert!(results.results.iter().all(|hit| hit.id.starts_with("joint_")));
        assert_eq!(results.results[0].title, "Base Joint");
        assert_eq!(results.available_resources.len(), 9);
    }

    #[test]
    fn search_is_case_insensitive_and_keyword_based() {
        let catalog = Catalog::new();
        let ids = |q: &str| -> Vec<String> {
            catalog.search(q).results.into_iter().map(|h| h.id).collect()
        };
        assert_eq!(ids("HOME"), vec!["home_position"]);
        assert_eq!(ids("wrist third"), vec!["joint_6"]);
        assert!(ids("gripper").is_empty());
        assert_eq!(Catalog::new().search("status").results[0].title, "Robot status");
    }

    #[test]
    fn joint_six_advertises_wider_limits() {
        let entry = Catalog::new().get("joint_6").cloned().unwrap();
        assert_eq!(entry.limits, Some(JointLimits::symmetric(175.0)));
        assert!(entry.description.contains("-175 to +175"));
    }

    #[tokio::test]
    async fn fetch_unknown_id_fails() {
        let err = Catalog::new().fetch("joint_9", &offline_api()).await.unwrap_err();
        assert_eq!(err.to_string(), "Resource not found: joint_9");
    }

    #[tokio::test]
    async fn fetch_reports_enrichment_failure_inside_payload() {
        let doc = Catalog::new().fetch("joint_2", &offline_api()).await.unwrap();
        assert_eq!(doc["id"], "joint_2");
        assert_eq!(doc["limits"]["max"], 165.0);
        assert!(doc["error"].as_str().unwrap().starts_with("Could not fetch real-time angle"));
        assert!(doc.get("current_angle").is_none());
    }

    #[tokio::test]
    async fn fetch_static_entries() {
        let api = offline_api();
        let movements = Catalog::new().fetch("movements", &api).await.unwrap();
        assert_eq!(movements["available_tools"].as_array().unwrap().len(), 6);
        assert_eq!(movements["type"], "capability");

        let home = Catalog::new().fetch("home_position", &api).await.unwrap();
        assert_eq!(home["target_angles"], json!([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
    }
}
