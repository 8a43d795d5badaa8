//! Schema Registry - entity definitions, relations, indices and named scopes

pub mod entity;
pub mod index;
pub mod registry;
pub mod relation;

pub use entity::{EntityDefinition, EntityDefinitionBuilder, FieldDefinition, FieldType};
pub use index::IndexDescriptor;
pub use registry::{global, install_global, SchemaRegistry};
pub use relation::{Cardinality, RelationDefinition, RelationshipType};
