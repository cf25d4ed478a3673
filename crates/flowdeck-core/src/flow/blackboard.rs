//! Read-only mirror of the remote flow's shared blackboard.
//!
//! The backend owns this data; the client holds an eventually-consistent
//! copy that is replaced wholesale on every successful poll. No field is
//! ever patched incrementally, so consumers must re-read derived values
//! after each poll instead of assuming deltas.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The project being worked on by the remote flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// The request made by the user, in natural language.
    #[serde(default)]
    pub user_request: String,
    /// Namespaces recorded directly on the project.
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// The first, high-level plan of the project.
    #[serde(default)]
    pub basic_plan: Option<String>,
    /// The refined plan of the project.
    #[serde(default)]
    pub advanced_plan: Option<String>,
}

/// General information about the target cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralInfo {
    /// Namespaces of the cluster.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

/// One completed task as recorded by a remote agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Agent which completed the task.
    #[serde(default)]
    pub agent: String,
    /// Name of the task completed.
    #[serde(default)]
    pub task_name: String,
    /// Description of the completed task, including anything useful for
    /// later steps or debugging.
    #[serde(default)]
    pub task_description: String,
}

/// A loosely-typed event emitted by the remote flow.
///
/// The backend sends free-form payloads here; the mirror does not try to
/// interpret them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

/// Severity ranking for issues found by the remote flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
}

impl Default for IssueSeverity {
    fn default() -> Self {
        IssueSeverity::Low
    }
}

impl IssueSeverity {
    fn rank(self) -> u8 {
        match self {
            IssueSeverity::High => 0,
            IssueSeverity::Medium => 1,
            IssueSeverity::Low => 2,
        }
    }
}

/// A problem reported against the current configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Brief, illustrative title of the issue.
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub severity: IssueSeverity,
    /// Complete description of the issue, with context.
    #[serde(default)]
    pub problem_description: String,
    /// Path to the manifest file that might be the cause of the issue.
    #[serde(default)]
    pub possible_manifest_file_path: String,
    /// Any additional observations or comments.
    #[serde(default)]
    pub observations: String,
}

/// A manifest file tracked by the remote flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Path of the file.
    #[serde(default)]
    pub file_path: String,
    /// Last known-good version of the file.
    #[serde(default)]
    pub last_working_index_version: Option<String>,
    /// Namespace of the manifest.
    #[serde(default)]
    pub namespace: String,
    /// General description of the manifest.
    #[serde(default)]
    pub description: String,
}

/// A container image resolved by the remote flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Tag of the image version ready for production.
    #[serde(default)]
    pub tag: String,
    /// Repository of the image.
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub image_name: String,
    #[serde(default)]
    pub version: String,
    /// Manifest digest, to get image details.
    #[serde(default)]
    pub manifest_digest: String,
    /// Pullable digest of the image.
    #[serde(default)]
    pub pullable_digest: String,
    /// Ports exposed by the image.
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub environment_variables: Vec<String>,
    /// General description of the image.
    #[serde(default)]
    pub description: String,
}

fn default_phase() -> String {
    "Waiting for kickoff".to_string()
}

/// Snapshot of the remote flow's shared state.
///
/// Tracks the progress and results of the configuration process. Replaced
/// wholesale on each successful poll; a staleness window of one poll
/// interval is expected and acceptable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blackboard {
    #[serde(default)]
    pub project: Project,
    #[serde(default)]
    pub general_info: GeneralInfo,
    #[serde(default)]
    pub manifests: Vec<Manifest>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub events: Vec<FlowEvent>,
    #[serde(default)]
    pub iterations: u64,
    #[serde(default = "default_phase")]
    pub phase: String,
}

impl Default for Blackboard {
    fn default() -> Self {
        Self {
            project: Project::default(),
            general_info: GeneralInfo::default(),
            manifests: Vec::new(),
            images: Vec::new(),
            issues: Vec::new(),
            records: Vec::new(),
            events: Vec::new(),
            iterations: 0,
            phase: default_phase(),
        }
    }
}

impl Blackboard {
    /// Resets the mirror to its initial state, as done before a new run.
    pub fn reset(&mut self) {
        *self = Blackboard::default();
    }

    /// Issues ordered most severe first.
    pub fn issues_by_severity(&self) -> Vec<&Issue> {
        let mut issues: Vec<&Issue> = self.issues.iter().collect();
        issues.sort_by_key(|i| i.severity.rank());
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase() {
        let board = Blackboard::default();
        assert_eq!(board.phase, "Waiting for kickoff");
        assert_eq!(board.iterations, 0);
    }

    #[test]
    fn test_deserialize_sparse_payload() {
        let board: Blackboard =
            serde_json::from_str("{\"phase\": \"Testing\", \"iterations\": 3}").unwrap();
        assert_eq!(board.phase, "Testing");
        assert_eq!(board.iterations, 3);
        assert!(board.records.is_empty());
    }

    #[test]
    fn test_severity_wire_format_is_uppercase() {
        let issue: Issue = serde_json::from_str(
            "{\"issue\": \"bad probe\", \"severity\": \"HIGH\"}",
        )
        .unwrap();
        assert_eq!(issue.severity, IssueSeverity::High);
    }

    #[test]
    fn test_issues_by_severity_orders_high_first() {
        let mut board = Blackboard::default();
        board.issues = vec![
            Issue {
                issue: "low".to_string(),
                severity: IssueSeverity::Low,
                ..Issue::default()
            },
            Issue {
                issue: "high".to_string(),
                severity: IssueSeverity::High,
                ..Issue::default()
            },
            Issue {
                issue: "medium".to_string(),
                severity: IssueSeverity::Medium,
                ..Issue::default()
            },
        ];
        let ordered = board.issues_by_severity();
        assert_eq!(ordered[0].issue, "high");
        assert_eq!(ordered[1].issue, "medium");
        assert_eq!(ordered[2].issue, "low");
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut board = Blackboard::default();
        board.phase = "Deploying".to_string();
        board.iterations = 7;
        board.records.push(Record::default());
        board.reset();
        assert_eq!(board, Blackboard::default());
    }
}
