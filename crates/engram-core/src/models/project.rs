//! Project model - the scoping unit for buffers, memories, and graphs.

use serde::{Deserialize, Serialize};

/// A project groups captured memories. Deleting a project cascades to its
/// memories and its graph edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    /// Unique identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

impl Project {
    /// Create a new project.
    pub fn new(name: impl Into<String>) -> Self {
        use engram_storage::time_utils;

        Self {
            id: format!("proj-{}", uuid::Uuid::new_v4()),
            name: name.into(),
            description: None,
            created_at: time_utils::now_ms(),
        }
    }

    /// Create a project with a specific ID (for deserialization/testing)
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_new() {
        let project = Project::new("Research");

        assert!(project.id.starts_with("proj-"));
        assert_eq!(project.name, "Research");
        assert!(project.description.is_none());
        assert!(project.created_at > 0);
    }

    #[test]
    fn test_project_roundtrip() {
        let project = Project::new("Research")
            .with_id("proj-test")
            .with_description("notes on retrieval");

        let json = serde_json::to_string(&project).unwrap();
        let parsed: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, project);
    }
}
