//! The tool capability model: groups, actions, entities, and tool specs.
//!
//! A `ToolGroup` is the unit of capability narrowing — a named bundle of
//! tools sharing a primary entity. The engine exposes the smallest group set
//! it believes a command needs and escalates once if the model asks for more.

use serde::{Deserialize, Serialize};

use crate::provider::ToolDefinition;

/// A named bundle of tools sharing a primary entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolGroup {
    /// Cross-entity search/resolve tools, the escalation tool, and the
    /// per-entity read-only search tools. Always exposed.
    Core,
    Task,
    Table,
    Project,
    Timeline,
    Block,
    Doc,
    File,
    Client,
    Commerce,
}

impl ToolGroup {
    /// All non-core groups, in display order.
    pub const NON_CORE: [ToolGroup; 9] = [
        ToolGroup::Task,
        ToolGroup::Table,
        ToolGroup::Project,
        ToolGroup::Timeline,
        ToolGroup::Block,
        ToolGroup::Doc,
        ToolGroup::File,
        ToolGroup::Client,
        ToolGroup::Commerce,
    ];

    /// The entity this group's write tools primarily operate on.
    pub fn primary_entity(&self) -> Option<EntityKind> {
        match self {
            ToolGroup::Core => None,
            ToolGroup::Task => Some(EntityKind::Task),
            ToolGroup::Table => Some(EntityKind::Table),
            ToolGroup::Project => Some(EntityKind::Project),
            ToolGroup::Timeline => Some(EntityKind::Timeline),
            ToolGroup::Block => Some(EntityKind::Block),
            ToolGroup::Doc => Some(EntityKind::Doc),
            ToolGroup::File => Some(EntityKind::File),
            ToolGroup::Client => Some(EntityKind::Client),
            ToolGroup::Commerce => Some(EntityKind::Commerce),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolGroup::Core => "core",
            ToolGroup::Task => "task",
            ToolGroup::Table => "table",
            ToolGroup::Project => "project",
            ToolGroup::Timeline => "timeline",
            ToolGroup::Block => "block",
            ToolGroup::Doc => "doc",
            ToolGroup::File => "file",
            ToolGroup::Client => "client",
            ToolGroup::Commerce => "commerce",
        }
    }

    /// Parse a group from its keyword (as used in escalation requests).
    pub fn from_keyword(keyword: &str) -> Option<ToolGroup> {
        match keyword.trim().to_lowercase().as_str() {
            "core" => Some(ToolGroup::Core),
            "task" | "tasks" => Some(ToolGroup::Task),
            "table" | "tables" => Some(ToolGroup::Table),
            "project" | "projects" => Some(ToolGroup::Project),
            "timeline" | "timelines" => Some(ToolGroup::Timeline),
            "block" | "blocks" | "tab" | "tabs" => Some(ToolGroup::Block),
            "doc" | "docs" | "document" | "documents" => Some(ToolGroup::Doc),
            "file" | "files" => Some(ToolGroup::File),
            "client" | "clients" => Some(ToolGroup::Client),
            "commerce" | "catalog" => Some(ToolGroup::Commerce),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verb a write tool performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolAction {
    Search,
    Create,
    Update,
    Delete,
    Organize,
}

impl ToolAction {
    /// Whether this action mutates the data store.
    pub fn is_write(&self) -> bool {
        !matches!(self, ToolAction::Search)
    }
}

/// The entities the workspace data store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Project,
    Table,
    Timeline,
    Block,
    Tab,
    Doc,
    File,
    Client,
    Workspace,
    Commerce,
}

impl EntityKind {
    /// The keyword that names this entity in command text.
    pub fn keyword(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Project => "project",
            EntityKind::Table => "table",
            EntityKind::Timeline => "timeline",
            EntityKind::Block => "block",
            EntityKind::Tab => "tab",
            EntityKind::Doc => "doc",
            EntityKind::File => "file",
            EntityKind::Client => "client",
            EntityKind::Workspace => "workspace",
            EntityKind::Commerce => "catalog",
        }
    }

    /// The tool group that owns this entity's write tools, if any.
    pub fn group(&self) -> Option<ToolGroup> {
        match self {
            EntityKind::Task => Some(ToolGroup::Task),
            EntityKind::Project => Some(ToolGroup::Project),
            EntityKind::Table => Some(ToolGroup::Table),
            EntityKind::Timeline => Some(ToolGroup::Timeline),
            EntityKind::Block | EntityKind::Tab => Some(ToolGroup::Block),
            EntityKind::Doc => Some(ToolGroup::Doc),
            EntityKind::File => Some(ToolGroup::File),
            EntityKind::Client => Some(ToolGroup::Client),
            EntityKind::Commerce => Some(ToolGroup::Commerce),
            EntityKind::Workspace => None,
        }
    }
}

/// Whether a tool reads or mutates the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    ReadOnly,
    Write,
}

/// The static description of one tool: what the engine knows about a tool
/// without knowing how it is implemented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The tool name (e.g., "searchTasks", "createTable").
    pub name: String,

    /// Description sent to the LLM.
    pub description: String,

    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,

    /// The group this tool belongs to.
    pub group: ToolGroup,

    /// Read-only or write.
    pub kind: ToolKind,

    /// The action this tool performs, for (action, entity) narrowing.
    pub action: Option<ToolAction>,

    /// The entity this tool operates on.
    pub entity: Option<EntityKind>,
}

impl ToolSpec {
    /// Lower this spec to the provider-facing definition.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }

    pub fn is_write(&self) -> bool {
        self.kind == ToolKind::Write
    }
}
