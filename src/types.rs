// src/types.rs

//! Small shared vocabulary types: node/edge kinds, change kinds, propagation
//! strategies and regeneration priorities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical node identifier type used throughout the crate.
pub type NodeId = String;

/// Open key/value mapping attached to nodes, edges, events and tasks.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Kind of artifact a graph node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Character,
    Location,
    Prop,
    Scene,
    Frame,
    Shot,
    Beat,
    Episode,
    Season,
    Concept,
    Event,
    Pipeline,
    Pitch,
    WorldConfig,
    Script,
    VisualScript,
    TagReference,
    StoryboardPrompt,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Character => "character",
            NodeType::Location => "location",
            NodeType::Prop => "prop",
            NodeType::Scene => "scene",
            NodeType::Frame => "frame",
            NodeType::Shot => "shot",
            NodeType::Beat => "beat",
            NodeType::Episode => "episode",
            NodeType::Season => "season",
            NodeType::Concept => "concept",
            NodeType::Event => "event",
            NodeType::Pipeline => "pipeline",
            NodeType::Pitch => "pitch",
            NodeType::WorldConfig => "world_config",
            NodeType::Script => "script",
            NodeType::VisualScript => "visual_script",
            NodeType::TagReference => "tag_reference",
            NodeType::StoryboardPrompt => "storyboard_prompt",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship carried by a directed edge. `source -> target` always means
/// "target is downstream of source".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Contains,
    References,
    #[default]
    DependsOn,
    AppearsIn,
    LocatedAt,
    RelatedTo,
    Precedes,
    DerivedFrom,
    Produces,
    Consumes,
    Transforms,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "contains",
            EdgeType::References => "references",
            EdgeType::DependsOn => "depends_on",
            EdgeType::AppearsIn => "appears_in",
            EdgeType::LocatedAt => "located_at",
            EdgeType::RelatedTo => "related_to",
            EdgeType::Precedes => "precedes",
            EdgeType::DerivedFrom => "derived_from",
            EdgeType::Produces => "produces",
            EdgeType::Consumes => "consumes",
            EdgeType::Transforms => "transforms",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of edit happened to an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    ContentEdit,
    TagChange,
    StructureChange,
    Deletion,
    Addition,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::ContentEdit => "content_edit",
            ChangeType::TagChange => "tag_change",
            ChangeType::StructureChange => "structure_change",
            ChangeType::Deletion => "deletion",
            ChangeType::Addition => "addition",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise(s).as_str() {
            "content_edit" => Ok(ChangeType::ContentEdit),
            "tag_change" => Ok(ChangeType::TagChange),
            "structure_change" => Ok(ChangeType::StructureChange),
            "deletion" => Ok(ChangeType::Deletion),
            "addition" => Ok(ChangeType::Addition),
            other => Err(format!(
                "invalid change type: {other} (expected content_edit, tag_change, structure_change, deletion or addition)"
            )),
        }
    }
}

/// How the propagation engine treats the nodes affected by a change.
///
/// - `Immediate` / `Queued`: act on every affected node. Whether "acting"
///   means doing the work right away or enqueuing it is up to the handler the
///   caller registered.
/// - `Manual`: skip everything; the caller acts later.
/// - `Selective`: act only on an explicit selection of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropagationStrategy {
    #[default]
    Immediate,
    Queued,
    Manual,
    Selective,
}

impl FromStr for PropagationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise(s).as_str() {
            "immediate" => Ok(PropagationStrategy::Immediate),
            "queued" => Ok(PropagationStrategy::Queued),
            "manual" => Ok(PropagationStrategy::Manual),
            "selective" => Ok(PropagationStrategy::Selective),
            other => Err(format!(
                "invalid propagation strategy: {other} (expected \"immediate\", \"queued\", \"manual\" or \"selective\")"
            )),
        }
    }
}

/// Regeneration urgency. Lower numeric value is more urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical = 1,
    High = 2,
    #[default]
    Normal = 3,
    Low = 4,
    Background = 5,
}

impl Priority {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// One band less urgent, capped at `Background`.
    pub fn demoted(self) -> Self {
        match self {
            Priority::Critical => Priority::High,
            Priority::High => Priority::Normal,
            Priority::Normal => Priority::Low,
            Priority::Low | Priority::Background => Priority::Background,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise(s).as_str() {
            "critical" | "1" => Ok(Priority::Critical),
            "high" | "2" => Ok(Priority::High),
            "normal" | "3" => Ok(Priority::Normal),
            "low" | "4" => Ok(Priority::Low),
            "background" | "5" => Ok(Priority::Background),
            other => Err(format!(
                "invalid priority: {other} (expected critical, high, normal, low, background or 1-5)"
            )),
        }
    }
}

/// Lifecycle of a regeneration task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

fn normalise(s: &str) -> String {
    s.trim().to_lowercase().replace('-', "_")
}
