//! Schema knowledge: native columns, templates and registered fields.

mod native;
mod registry;

pub use native::{
    Classification, ColumnKind, Directive, NativeColumn, VirtualAttribute, classify, split_path,
};
pub use registry::{
    FieldDefinition, RelationScope, SchemaRegistry, SchemaUpdate, TemplateDefinition,
    validate_identifier,
};
