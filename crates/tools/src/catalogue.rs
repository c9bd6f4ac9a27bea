//! Administrative Operation Catalogue
//!
//! Typed operation descriptors generated at startup from the entity
//! schemas: `query_<entity>`, `insert_<entity>`, `update_<entity>`,
//! `delete_<entity>`. The admin planner can only reference names present
//! here, and every parameter it binds is checked against the descriptor.
//!
//! Tenant columns are never parameters. The office comes from the tool
//! context, so no plan can address another office's rows.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use counsel_core::permissions::{RECORDS_READ, RECORDS_WRITE};
use counsel_llm::types::{ParameterSchema, ToolDefinition};

/// Record identifier parameter shared by update/delete/query.
pub const ID_PARAM: &str = "id";
/// Result cap accepted by query operations.
pub const LIMIT_PARAM: &str = "limit";
/// Pseudo-parameter reported when an update names no field to change.
pub const UPDATE_FIELDS_PARAM: &str = "fields_to_change";

/// Keys that identify a tenant. Stripped from any planned step.
pub const TENANT_KEYS: &[&str] = &["office_id", "tenant_id", "lawyer_id"];

// ============================================================================
// Entity schemas
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Client,
    Case,
    Hearing,
    Task,
}

impl EntityKind {
    pub fn all() -> [EntityKind; 4] {
        [
            EntityKind::Client,
            EntityKind::Case,
            EntityKind::Hearing,
            EntityKind::Task,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Client => "client",
            EntityKind::Case => "case",
            EntityKind::Hearing => "hearing",
            EntityKind::Task => "task",
        }
    }

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Client => "clients",
            EntityKind::Case => "cases",
            EntityKind::Hearing => "hearings",
            EntityKind::Task => "tasks",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    /// ISO-8601 date (`YYYY-MM-DD`) or date-time, stored as text.
    Date,
}

impl FieldType {
    fn schema(&self, description: &str) -> ParameterSchema {
        match self {
            FieldType::Integer => ParameterSchema::integer(Some(description)),
            FieldType::Text => ParameterSchema::string(Some(description)),
            FieldType::Date => {
                ParameterSchema::string(Some(&format!("{} (YYYY-MM-DD)", description)))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    /// Entity this field points at, checked within the same office.
    pub references: Option<EntityKind>,
    pub description: &'static str,
}

impl FieldSpec {
    fn text(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Text,
            required: false,
            references: None,
            description,
        }
    }

    fn date(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Date,
            required: false,
            references: None,
            description,
        }
    }

    fn reference(name: &'static str, target: EntityKind, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Integer,
            required: false,
            references: Some(target),
            description,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySchema {
    pub entity: EntityKind,
    pub fields: Vec<FieldSpec>,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}

/// The office record schemas the assistant manages.
pub fn builtin_schemas() -> Vec<EntitySchema> {
    vec![
        EntitySchema {
            entity: EntityKind::Client,
            fields: vec![
                FieldSpec::text("full_name", "Client full name").required(),
                FieldSpec::text("phone", "Phone number"),
                FieldSpec::text("email", "Email address"),
                FieldSpec::text("national_id", "National identity number"),
                FieldSpec::text("address", "Postal address"),
                FieldSpec::text("notes", "Free-form notes"),
            ],
        },
        EntitySchema {
            entity: EntityKind::Case,
            fields: vec![
                FieldSpec::reference("client_id", EntityKind::Client, "Id of the client").required(),
                FieldSpec::text("title", "Short case title").required(),
                FieldSpec::text("case_number", "Court case number"),
                FieldSpec::text("court", "Court handling the case"),
                FieldSpec::text("case_type", "Case type, e.g. civil, commercial, labor"),
                FieldSpec::text("status", "open, pending, or closed"),
                FieldSpec::date("opened_on", "Date the case was opened"),
                FieldSpec::text("notes", "Free-form notes"),
            ],
        },
        EntitySchema {
            entity: EntityKind::Hearing,
            fields: vec![
                FieldSpec::reference("case_id", EntityKind::Case, "Id of the case").required(),
                FieldSpec::date("hearing_date", "Date of the hearing").required(),
                FieldSpec::text("court", "Court or chamber"),
                FieldSpec::text("purpose", "What the hearing is for"),
                FieldSpec::text("outcome", "Result of the hearing"),
                FieldSpec::text("notes", "Free-form notes"),
            ],
        },
        EntitySchema {
            entity: EntityKind::Task,
            fields: vec![
                FieldSpec::text("title", "What needs to be done").required(),
                FieldSpec::reference("case_id", EntityKind::Case, "Related case id"),
                FieldSpec::date("due_date", "Due date"),
                FieldSpec::text("status", "todo, in_progress, or done"),
                FieldSpec::text("priority", "low, normal, or high"),
                FieldSpec::text("notes", "Free-form notes"),
            ],
        },
    ]
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, OperationKind::Query)
    }

    pub fn is_destructive(&self) -> bool {
        matches!(self, OperationKind::Delete)
    }

    /// Permission an operation of this kind needs.
    pub fn permission(&self) -> &'static str {
        if self.is_write() {
            RECORDS_WRITE
        } else {
            RECORDS_READ
        }
    }
}

/// One generated operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub kind: OperationKind,
    pub entity: EntityKind,
    pub description: String,
    pub input_schema: ParameterSchema,
    /// Parameters that must be present and non-blank.
    pub required: Vec<String>,
    /// Every parameter the operation accepts.
    pub accepted: Vec<String>,
}

impl OperationDescriptor {
    fn generate(kind: OperationKind, schema: &EntitySchema) -> Self {
        let entity = schema.entity;
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        let id_schema = ParameterSchema::integer(Some(&format!("Id of the {}", entity)));
        match kind {
            OperationKind::Query => {
                properties.insert(ID_PARAM.to_string(), id_schema);
                for field in &schema.fields {
                    properties.insert(
                        field.name.to_string(),
                        field.field_type.schema(&format!("Filter: {}", field.description)),
                    );
                }
                properties.insert(
                    LIMIT_PARAM.to_string(),
                    ParameterSchema::integer(Some("Maximum rows to return")),
                );
            }
            OperationKind::Insert => {
                for field in &schema.fields {
                    properties.insert(
                        field.name.to_string(),
                        field.field_type.schema(field.description),
                    );
                    if field.required {
                        required.push(field.name.to_string());
                    }
                }
            }
            OperationKind::Update => {
                properties.insert(ID_PARAM.to_string(), id_schema);
                required.push(ID_PARAM.to_string());
                for field in &schema.fields {
                    properties.insert(
                        field.name.to_string(),
                        field.field_type.schema(&format!("New value: {}", field.description)),
                    );
                }
            }
            OperationKind::Delete => {
                properties.insert(ID_PARAM.to_string(), id_schema);
                required.push(ID_PARAM.to_string());
            }
        }

        let description = match kind {
            OperationKind::Query => format!(
                "Find {} records in the office. Text filters match partially; omit all filters to list.",
                entity
            ),
            OperationKind::Insert => format!("Create a new {} record.", entity),
            OperationKind::Update => format!(
                "Change fields of an existing {} identified by id. Only the given fields change.",
                entity
            ),
            OperationKind::Delete => format!(
                "Permanently delete the {} with the given id. Destructive.",
                entity
            ),
        };

        let accepted: Vec<String> = properties.keys().cloned().collect();
        let input_schema = ParameterSchema::object(None, properties, required.clone());

        Self {
            name: format!("{}_{}", kind.as_str(), entity),
            kind,
            entity,
            description,
            input_schema,
            required,
            accepted,
        }
    }

    /// Required parameters that are absent, null, or blank.
    ///
    /// An update with nothing to change reports [`UPDATE_FIELDS_PARAM`].
    pub fn missing_params(&self, params: &Map<String, Value>) -> Vec<String> {
        let mut missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| params.get(name.as_str()).map(is_blank).unwrap_or(true))
            .cloned()
            .collect();

        if self.kind == OperationKind::Update {
            let changes = params
                .iter()
                .filter(|(k, v)| k.as_str() != ID_PARAM && !is_blank(v))
                .count();
            if changes == 0 {
                missing.push(UPDATE_FIELDS_PARAM.to_string());
            }
        }
        missing
    }

    /// Parameters the operation does not accept.
    pub fn unknown_params(&self, params: &Map<String, Value>) -> Vec<String> {
        params
            .keys()
            .filter(|k| !self.accepted.iter().any(|a| a == *k))
            .cloned()
            .collect()
    }

    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Whether a bound value counts as not supplied.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// ============================================================================
// AdminCatalogue
// ============================================================================

/// Every operation the admin branch can plan, generated from the schemas.
#[derive(Debug, Clone)]
pub struct AdminCatalogue {
    schemas: Vec<EntitySchema>,
    descriptors: Vec<OperationDescriptor>,
    index: HashMap<String, usize>,
}

impl AdminCatalogue {
    pub fn generate(schemas: Vec<EntitySchema>) -> Self {
        let kinds = [
            OperationKind::Query,
            OperationKind::Insert,
            OperationKind::Update,
            OperationKind::Delete,
        ];
        let descriptors: Vec<OperationDescriptor> = schemas
            .iter()
            .flat_map(|schema| {
                kinds
                    .iter()
                    .map(move |kind| OperationDescriptor::generate(*kind, schema))
            })
            .collect();
        let index = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Self {
            schemas,
            descriptors,
            index,
        }
    }

    /// Catalogue over [`builtin_schemas`].
    pub fn builtin() -> Self {
        Self::generate(builtin_schemas())
    }

    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.index.get(name).map(|i| &self.descriptors[*i])
    }

    pub fn schema(&self, entity: EntityKind) -> Option<&EntitySchema> {
        self.schemas.iter().find(|s| s.entity == entity)
    }

    pub fn descriptors(&self) -> &[OperationDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors
            .iter()
            .map(OperationDescriptor::tool_definition)
            .collect()
    }
}
