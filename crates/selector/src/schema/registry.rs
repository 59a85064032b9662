//! Template and field registry.
//!
//! The registry maps field names to their storage tables and field types,
//! and holds per-template access settings. It is shared behind an
//! `Arc<RwLock<_>>`; every change bumps [`SchemaRegistry::generation`] and is
//! announced on a broadcast channel so caches keyed on the schema can drop
//! stale entries.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::SchemaError;
use crate::fieldtypes::{Fieldtype, fieldtype_by_name};
use crate::types::{PageId, RoleId, TemplateId};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Checks that a table or column name can be written into SQL unquoted.
pub fn validate_identifier(identifier: &str) -> Result<(), SchemaError> {
    if IDENTIFIER.is_match(identifier) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Notification of a schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaUpdate {
    /// A template was registered.
    TemplateAdded(String),
    /// A template's access settings changed.
    TemplateChanged(String),
    /// A field was registered.
    FieldAdded(String),
    /// A field was removed.
    FieldRemoved(String),
}

/// A template and its access settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Template id, as stored in `pages.templates_id`.
    pub id: TemplateId,
    /// Template name.
    pub name: String,
    /// Whether the template defines access itself. Pages of templates that
    /// don't inherit access from the nearest ancestor that does.
    #[serde(default)]
    pub use_roles: bool,
    /// Roles allowed to view pages of this template.
    #[serde(default)]
    pub view_roles: Vec<RoleId>,
    /// Pages appear in results even for roles that cannot view them.
    #[serde(default)]
    pub guest_searchable: bool,
}

impl TemplateDefinition {
    /// A template without access control.
    pub fn new(id: TemplateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            use_roles: false,
            view_roles: Vec::new(),
            guest_searchable: false,
        }
    }

    /// Restricts viewing to the given roles.
    pub fn with_view_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.use_roles = true;
        self.view_roles = roles.into_iter().collect();
        self
    }

    /// Marks the template as searchable regardless of view access.
    pub fn guest_searchable(mut self) -> Self {
        self.guest_searchable = true;
        self
    }

    /// Returns true if an identity holding `roles` may find pages of this template.
    pub fn allows(&self, roles: &[RoleId]) -> bool {
        !self.use_roles
            || self.guest_searchable
            || self.view_roles.iter().any(|r| roles.contains(r))
    }
}

/// Which pages a relation field may reference.
///
/// Used to narrow sub-selectors that don't name a template or parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationScope {
    /// Allowed templates of referenced pages.
    #[serde(default)]
    pub template_ids: Vec<TemplateId>,
    /// Required parent of referenced pages.
    #[serde(default)]
    pub parent_id: Option<PageId>,
}

impl RelationScope {
    /// Returns true if the scope imposes nothing.
    pub fn is_empty(&self) -> bool {
        self.template_ids.is_empty() && self.parent_id.is_none()
    }
}

/// A custom field and its storage.
#[derive(Clone)]
pub struct FieldDefinition {
    /// Field name used in selectors.
    pub name: String,
    /// Storage table.
    pub table: String,
    /// Storage provider.
    pub fieldtype: Arc<dyn Fieldtype>,
    /// Reference scope, for relation fields.
    pub scope: RelationScope,
}

impl FieldDefinition {
    /// Defines a field stored in `field_<name>`.
    pub fn new(name: impl Into<String>, fieldtype: Arc<dyn Fieldtype>) -> Result<Self, SchemaError> {
        let name = name.into();
        validate_identifier(&name)?;
        let table = format!("field_{}", name);
        Ok(Self {
            name,
            table,
            fieldtype,
            scope: RelationScope::default(),
        })
    }

    /// Sets the reference scope.
    pub fn with_scope(mut self, scope: RelationScope) -> Self {
        self.scope = scope;
        self
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("fieldtype", &self.fieldtype.name())
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    templates: Vec<TemplateDefinition>,
    #[serde(default)]
    fields: Vec<FieldDocument>,
}

#[derive(Debug, Deserialize)]
struct FieldDocument {
    name: String,
    #[serde(rename = "type")]
    fieldtype: String,
    #[serde(default)]
    scope: RelationScope,
}

/// In-memory registry of templates and fields.
pub struct SchemaRegistry {
    templates_by_name: HashMap<String, Arc<TemplateDefinition>>,
    templates_by_id: HashMap<TemplateId, Arc<TemplateDefinition>>,
    fields: HashMap<String, Arc<FieldDefinition>>,
    generation: u64,
    update_tx: broadcast::Sender<SchemaUpdate>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(64);
        Self {
            templates_by_name: HashMap::new(),
            templates_by_id: HashMap::new(),
            fields: HashMap::new(),
            generation: 0,
            update_tx,
        }
    }

    /// Builds a registry from a JSON schema document:
    ///
    /// ```json
    /// {
    ///   "templates": [{"id": 1, "name": "home"}],
    ///   "fields": [{"name": "title", "type": "text"}]
    /// }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument =
            serde_json::from_str(json).map_err(|e| SchemaError::InvalidDocument {
                message: e.to_string(),
            })?;

        let mut registry = Self::new();
        for template in document.templates {
            registry.register_template(template)?;
        }
        for field in document.fields {
            let fieldtype =
                fieldtype_by_name(&field.fieldtype).ok_or_else(|| SchemaError::UnknownFieldtype {
                    name: field.fieldtype.clone(),
                })?;
            registry.register_field(FieldDefinition::new(field.name, fieldtype)?.with_scope(field.scope))?;
        }
        Ok(registry)
    }

    /// Registers a template. Names and ids must be unique.
    pub fn register_template(&mut self, template: TemplateDefinition) -> Result<(), SchemaError> {
        if self.templates_by_name.contains_key(&template.name)
            || self.templates_by_id.contains_key(&template.id)
        {
            return Err(SchemaError::DuplicateTemplate {
                name: template.name,
            });
        }

        let name = template.name.clone();
        self.insert_template(template);
        self.notify(SchemaUpdate::TemplateAdded(name));
        Ok(())
    }

    /// Replaces the template with the same id.
    pub fn update_template(&mut self, template: TemplateDefinition) -> Result<(), SchemaError> {
        let previous = self
            .templates_by_id
            .remove(&template.id)
            .ok_or(SchemaError::MissingTemplate { id: template.id })?;
        self.templates_by_name.remove(&previous.name);

        let name = template.name.clone();
        self.insert_template(template);
        self.notify(SchemaUpdate::TemplateChanged(name));
        Ok(())
    }

    fn insert_template(&mut self, template: TemplateDefinition) {
        let template = Arc::new(template);
        self.templates_by_name
            .insert(template.name.clone(), Arc::clone(&template));
        self.templates_by_id.insert(template.id, template);
    }

    /// Registers a field.
    pub fn register_field(&mut self, field: FieldDefinition) -> Result<(), SchemaError> {
        if self.fields.contains_key(&field.name) {
            return Err(SchemaError::DuplicateField { name: field.name });
        }
        validate_identifier(&field.table)?;
        for column in field.fieldtype.columns() {
            validate_identifier(column.name)?;
        }

        let name = field.name.clone();
        self.fields.insert(name.clone(), Arc::new(field));
        self.notify(SchemaUpdate::FieldAdded(name));
        Ok(())
    }

    /// Removes a field, returning its definition.
    pub fn remove_field(&mut self, name: &str) -> Option<Arc<FieldDefinition>> {
        let removed = self.fields.remove(name)?;
        self.notify(SchemaUpdate::FieldRemoved(name.to_string()));
        Some(removed)
    }

    /// Looks up a template by name.
    pub fn template(&self, name: &str) -> Option<Arc<TemplateDefinition>> {
        self.templates_by_name.get(name).cloned()
    }

    /// Looks up a template by id.
    pub fn template_by_id(&self, id: TemplateId) -> Option<Arc<TemplateDefinition>> {
        self.templates_by_id.get(&id).cloned()
    }

    /// All templates, in no particular order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<TemplateDefinition>> {
        self.templates_by_id.values()
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<Arc<FieldDefinition>> {
        self.fields.get(name).cloned()
    }

    /// All fields, in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = &Arc<FieldDefinition>> {
        self.fields.values()
    }

    /// Counter bumped on every change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Subscribes to schema change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SchemaUpdate> {
        self.update_tx.subscribe()
    }

    fn notify(&mut self, update: SchemaUpdate) {
        self.generation += 1;
        // no receivers is fine
        let _ = self.update_tx.send(update);
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("templates", &self.templates_by_id.len())
            .field("fields", &self.fields.len())
            .field("generation", &self.generation)
            .finish()
    }
}
