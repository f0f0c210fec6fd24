//! The tool catalog — every tool the engine can expose, with registry
//! lookups by name, group, and (action, entity) pair.

use std::collections::HashMap;

use serde_json::json;
use worksmith_core::capability::{EntityKind, ToolAction, ToolGroup, ToolKind, ToolSpec};

use crate::ESCALATION_TOOL;
use crate::schema::{object, string, string_array};

/// The static registry of tool specs.
///
/// Built once and shared; lookups are read-only. The core set (cross-entity
/// search/resolve, the escalation tool, per-entity searches) is always
/// exposed to the model regardless of classification — it must always be
/// able to look things up and ask for more capabilities.
pub struct ToolCatalog {
    specs: Vec<ToolSpec>,
    by_name: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        let specs = build_specs();
        let by_name = specs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        Self { specs, by_name }
    }

    /// Look up a spec by tool name.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.by_name.get(name).map(|&i| &self.specs[i])
    }

    /// All specs in the core group, in declaration order.
    pub fn core_set(&self) -> Vec<&ToolSpec> {
        self.group(ToolGroup::Core)
    }

    /// All specs in one group, in declaration order.
    pub fn group(&self, group: ToolGroup) -> Vec<&ToolSpec> {
        self.specs.iter().filter(|s| s.group == group).collect()
    }

    /// Write tools in a group registered for the given (action, entity) pair.
    pub fn write_tools_for(
        &self,
        group: ToolGroup,
        action: ToolAction,
        entity: EntityKind,
    ) -> Vec<&ToolSpec> {
        self.specs
            .iter()
            .filter(|s| {
                s.group == group
                    && s.kind == ToolKind::Write
                    && s.action == Some(action)
                    && s.entity == Some(entity)
            })
            .collect()
    }

    /// Expand an ordered group set into a deduplicated spec list:
    /// core first, then each requested group's tools in declaration order.
    pub fn expand(&self, groups: impl IntoIterator<Item = ToolGroup>) -> Vec<&ToolSpec> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for spec in self.core_set() {
            if seen.insert(spec.name.as_str()) {
                out.push(spec);
            }
        }
        for group in groups {
            for spec in self.group(group) {
                if seen.insert(spec.name.as_str()) {
                    out.push(spec);
                }
            }
        }
        out
    }

    /// All tool names, in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// All specs, in declaration order.
    pub fn all(&self) -> &[ToolSpec] {
        &self.specs
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn spec(
    name: &str,
    description: &str,
    parameters: serde_json::Value,
    group: ToolGroup,
    kind: ToolKind,
    action: Option<ToolAction>,
    entity: Option<EntityKind>,
) -> ToolSpec {
    ToolSpec {
        name: name.into(),
        description: description.into(),
        parameters,
        group,
        kind,
        action,
        entity,
    }
}

fn search(name: &str, description: &str, entity: EntityKind) -> ToolSpec {
    spec(
        name,
        description,
        object(
            json!({
                "query": string("Search text; empty returns everything in scope"),
                "limit": { "type": "integer", "description": "Maximum results" },
            }),
            &[],
        ),
        ToolGroup::Core,
        ToolKind::ReadOnly,
        Some(ToolAction::Search),
        Some(entity),
    )
}

fn build_specs() -> Vec<ToolSpec> {
    let mut specs = Vec::new();

    // --- Core: cross-entity search/resolve and the escalation tool ---
    specs.push(spec(
        "searchWorkspace",
        "Search across every entity type in the workspace",
        object(json!({ "query": string("Search text") }), &["query"]),
        ToolGroup::Core,
        ToolKind::ReadOnly,
        Some(ToolAction::Search),
        Some(EntityKind::Workspace),
    ));
    specs.push(spec(
        "resolveEntity",
        "Resolve a name or partial reference to a concrete entity id",
        object(
            json!({
                "reference": string("The name or phrase to resolve"),
                "kind": string("Optional entity kind hint (task, table, project, ...)"),
            }),
            &["reference"],
        ),
        ToolGroup::Core,
        ToolKind::ReadOnly,
        Some(ToolAction::Search),
        None,
    ));
    specs.push(spec(
        ESCALATION_TOOL,
        "Request additional tool groups when a needed tool is unavailable",
        object(
            json!({
                "groups": string_array("Tool groups to enable (task, table, project, ...)"),
                "reason": string("Why these groups are needed"),
            }),
            &["groups"],
        ),
        ToolGroup::Core,
        ToolKind::ReadOnly,
        None,
        None,
    ));

    // --- Core: per-entity read-only searches ---
    specs.push(search("searchTasks", "Search tasks in the workspace", EntityKind::Task));
    specs.push(search("searchTables", "Search tables in the workspace", EntityKind::Table));
    specs.push(search("searchProjects", "Search projects in the workspace", EntityKind::Project));
    specs.push(search("searchTimelines", "Search timelines in the workspace", EntityKind::Timeline));
    specs.push(search("searchDocs", "Search documents in the workspace", EntityKind::Doc));
    specs.push(search("searchFiles", "Search files in the workspace", EntityKind::File));
    specs.push(search("searchClients", "Search clients in the workspace", EntityKind::Client));
    specs.push(search("searchCatalog", "Search the commerce catalog", EntityKind::Commerce));

    // --- Task group ---
    specs.push(spec(
        "createTask",
        "Create a task",
        object(
            json!({
                "title": string("Task title"),
                "projectId": string("Project to create the task in"),
                "status": string("Initial status"),
                "assigneeId": string("User to assign"),
            }),
            &["title"],
        ),
        ToolGroup::Task,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Task),
    ));
    specs.push(spec(
        "updateTask",
        "Update one task's fields",
        object(
            json!({
                "taskId": string("The task to update"),
                "fields": { "type": "object", "description": "Field name to new value" },
            }),
            &["taskId", "fields"],
        ),
        ToolGroup::Task,
        ToolKind::Write,
        Some(ToolAction::Update),
        Some(EntityKind::Task),
    ));
    specs.push(spec(
        "deleteTask",
        "Delete a task",
        object(json!({ "taskId": string("The task to delete") }), &["taskId"]),
        ToolGroup::Task,
        ToolKind::Write,
        Some(ToolAction::Delete),
        Some(EntityKind::Task),
    ));
    specs.push(spec(
        "bulkUpdateTasks",
        "Apply the same field changes to many tasks at once",
        object(
            json!({
                "taskIds": string_array("The tasks to update"),
                "fields": { "type": "object", "description": "Field name to new value" },
            }),
            &["taskIds", "fields"],
        ),
        ToolGroup::Task,
        ToolKind::Write,
        Some(ToolAction::Update),
        Some(EntityKind::Task),
    ));
    specs.push(spec(
        "createBoardFromTasks",
        "Create a board view from a set of tasks (e.g. the results of a prior search)",
        object(
            json!({
                "title": string("Board title"),
                "taskIds": string_array("Tasks to place on the board"),
                "groupBy": string("Field to group columns by"),
            }),
            &["title", "taskIds"],
        ),
        ToolGroup::Task,
        ToolKind::Write,
        Some(ToolAction::Organize),
        Some(EntityKind::Task),
    ));

    // --- Table group ---
    specs.push(spec(
        "createTable",
        "Create a table",
        object(
            json!({
                "title": string("Table title"),
                "tabId": string("Tab to place the table in"),
            }),
            &["title"],
        ),
        ToolGroup::Table,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Table),
    ));
    specs.push(spec(
        "updateTable",
        "Update a table's title or settings",
        object(
            json!({
                "tableId": string("The table to update"),
                "fields": { "type": "object", "description": "Field name to new value" },
            }),
            &["tableId", "fields"],
        ),
        ToolGroup::Table,
        ToolKind::Write,
        Some(ToolAction::Update),
        Some(EntityKind::Table),
    ));
    specs.push(spec(
        "deleteTable",
        "Delete a table",
        object(json!({ "tableId": string("The table to delete") }), &["tableId"]),
        ToolGroup::Table,
        ToolKind::Write,
        Some(ToolAction::Delete),
        Some(EntityKind::Table),
    ));
    specs.push(spec(
        "createField",
        "Add a single column to a table",
        object(
            json!({
                "tableId": string("The table to add the column to"),
                "name": string("Column name"),
                "fieldType": string("Column type (text, number, date, select, ...)"),
            }),
            &["tableId", "name"],
        ),
        ToolGroup::Table,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Table),
    ));
    specs.push(spec(
        "bulkCreateFields",
        "Add several columns to a table in one call",
        object(
            json!({
                "tableId": string("The table to add columns to"),
                "fields": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "fieldType": { "type": "string" },
                        },
                        "required": ["name"],
                    },
                    "description": "Columns to create, in order",
                },
            }),
            &["tableId", "fields"],
        ),
        ToolGroup::Table,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Table),
    ));
    specs.push(spec(
        "insertRows",
        "Insert rows into a table",
        object(
            json!({
                "tableId": string("The table to insert into"),
                "rows": {
                    "type": "array",
                    "items": { "type": "object" },
                    "description": "Row objects keyed by column name",
                },
            }),
            &["tableId", "rows"],
        ),
        ToolGroup::Table,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Table),
    ));

    // --- Project group ---
    specs.push(spec(
        "createProject",
        "Create a project",
        object(json!({ "name": string("Project name") }), &["name"]),
        ToolGroup::Project,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Project),
    ));
    specs.push(spec(
        "updateProject",
        "Update a project's fields",
        object(
            json!({
                "projectId": string("The project to update"),
                "fields": { "type": "object", "description": "Field name to new value" },
            }),
            &["projectId", "fields"],
        ),
        ToolGroup::Project,
        ToolKind::Write,
        Some(ToolAction::Update),
        Some(EntityKind::Project),
    ));
    specs.push(spec(
        "deleteProject",
        "Delete a project",
        object(json!({ "projectId": string("The project to delete") }), &["projectId"]),
        ToolGroup::Project,
        ToolKind::Write,
        Some(ToolAction::Delete),
        Some(EntityKind::Project),
    ));

    // --- Timeline group ---
    specs.push(spec(
        "createTimeline",
        "Create a timeline",
        object(
            json!({
                "title": string("Timeline title"),
                "projectId": string("Project the timeline belongs to"),
            }),
            &["title"],
        ),
        ToolGroup::Timeline,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Timeline),
    ));
    specs.push(spec(
        "addTimelineEntry",
        "Add an entry to a timeline",
        object(
            json!({
                "timelineId": string("The timeline to add to"),
                "title": string("Entry title"),
                "startDate": string("ISO start date"),
                "endDate": string("ISO end date"),
            }),
            &["timelineId", "title", "startDate"],
        ),
        ToolGroup::Timeline,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Timeline),
    ));

    // --- Block group ---
    specs.push(spec(
        "createBlock",
        "Create a content block in a tab",
        object(
            json!({
                "tabId": string("Tab to create the block in"),
                "blockType": string("Block type (text, table, board, embed, ...)"),
                "content": { "type": "object", "description": "Initial block content" },
            }),
            &["blockType"],
        ),
        ToolGroup::Block,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Block),
    ));
    specs.push(spec(
        "updateBlock",
        "Update a block's content",
        object(
            json!({
                "blockId": string("The block to update"),
                "content": { "type": "object", "description": "New block content" },
            }),
            &["blockId", "content"],
        ),
        ToolGroup::Block,
        ToolKind::Write,
        Some(ToolAction::Update),
        Some(EntityKind::Block),
    ));
    specs.push(spec(
        "moveBlock",
        "Move a block within or between tabs",
        object(
            json!({
                "blockId": string("The block to move"),
                "tabId": string("Destination tab"),
                "position": { "type": "integer", "description": "Target position" },
            }),
            &["blockId"],
        ),
        ToolGroup::Block,
        ToolKind::Write,
        Some(ToolAction::Organize),
        Some(EntityKind::Block),
    ));

    // --- Doc group ---
    specs.push(spec(
        "createDoc",
        "Create a document",
        object(
            json!({
                "title": string("Document title"),
                "projectId": string("Project the document belongs to"),
            }),
            &["title"],
        ),
        ToolGroup::Doc,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Doc),
    ));
    specs.push(spec(
        "updateDoc",
        "Update a document's content",
        object(
            json!({
                "docId": string("The document to update"),
                "content": string("New markdown content"),
            }),
            &["docId", "content"],
        ),
        ToolGroup::Doc,
        ToolKind::Write,
        Some(ToolAction::Update),
        Some(EntityKind::Doc),
    ));

    // --- File group ---
    specs.push(spec(
        "attachFile",
        "Attach an uploaded file to an entity",
        object(
            json!({
                "fileId": string("The uploaded file"),
                "targetId": string("Entity to attach to"),
            }),
            &["fileId", "targetId"],
        ),
        ToolGroup::File,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::File),
    ));
    specs.push(spec(
        "moveFile",
        "Move a file to a different folder or project",
        object(
            json!({
                "fileId": string("The file to move"),
                "destination": string("Destination folder or project id"),
            }),
            &["fileId", "destination"],
        ),
        ToolGroup::File,
        ToolKind::Write,
        Some(ToolAction::Organize),
        Some(EntityKind::File),
    ));

    // --- Client group ---
    specs.push(spec(
        "createClient",
        "Create a client record",
        object(
            json!({
                "name": string("Client name"),
                "email": string("Contact email"),
            }),
            &["name"],
        ),
        ToolGroup::Client,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Client),
    ));
    specs.push(spec(
        "updateClient",
        "Update a client record",
        object(
            json!({
                "clientId": string("The client to update"),
                "fields": { "type": "object", "description": "Field name to new value" },
            }),
            &["clientId", "fields"],
        ),
        ToolGroup::Client,
        ToolKind::Write,
        Some(ToolAction::Update),
        Some(EntityKind::Client),
    ));

    // --- Commerce group ---
    specs.push(spec(
        "createCatalogItem",
        "Create a commerce catalog item",
        object(
            json!({
                "name": string("Item name"),
                "price": { "type": "number", "description": "Unit price" },
            }),
            &["name"],
        ),
        ToolGroup::Commerce,
        ToolKind::Write,
        Some(ToolAction::Create),
        Some(EntityKind::Commerce),
    ));
    specs.push(spec(
        "updateCatalogItem",
        "Update a commerce catalog item",
        object(
            json!({
                "itemId": string("The item to update"),
                "fields": { "type": "object", "description": "Field name to new value" },
            }),
            &["itemId", "fields"],
        ),
        ToolGroup::Commerce,
        ToolKind::Write,
        Some(ToolAction::Update),
        Some(EntityKind::Commerce),
    ));

    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookup_by_name() {
        let catalog = ToolCatalog::new();
        assert!(catalog.get("createTable").is_some());
        assert!(catalog.get("searchTasks").is_some());
        assert!(catalog.get("nonexistent").is_none());
    }

    #[test]
    fn core_set_contains_searches_and_escalation() {
        let catalog = ToolCatalog::new();
        let core: Vec<_> = catalog.core_set().iter().map(|s| s.name.clone()).collect();
        assert!(core.contains(&"searchWorkspace".to_string()));
        assert!(core.contains(&"searchTasks".to_string()));
        assert!(core.contains(&ESCALATION_TOOL.to_string()));
        assert!(catalog.core_set().iter().all(|s| s.kind == ToolKind::ReadOnly));
    }

    #[test]
    fn write_tools_registered_by_action_entity() {
        let catalog = ToolCatalog::new();
        let creates = catalog.write_tools_for(ToolGroup::Table, ToolAction::Create, EntityKind::Table);
        let names: Vec<_> = creates.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"createTable"));
        assert!(names.contains(&"bulkCreateFields"));
        assert!(!names.contains(&"deleteTable"));

        let deletes = catalog.write_tools_for(ToolGroup::Task, ToolAction::Delete, EntityKind::Task);
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].name, "deleteTask");
    }

    #[test]
    fn expand_is_ordered_and_deduplicated() {
        let catalog = ToolCatalog::new();
        let expanded = catalog.expand([ToolGroup::Table, ToolGroup::Core, ToolGroup::Table]);
        let names: Vec<_> = expanded.iter().map(|s| s.name.as_str()).collect();

        // Core first, then the table group, no duplicates.
        assert_eq!(names[0], "searchWorkspace");
        assert!(names.contains(&"createTable"));
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn every_spec_has_object_parameters() {
        let catalog = ToolCatalog::new();
        for spec in catalog.all() {
            assert_eq!(spec.parameters["type"], "object", "{} schema", spec.name);
        }
    }
}
