//! SeaORM entity models
//!
//! Database entities for DocVault

mod document;
mod document_image;

pub use document::{
    Entity as DocumentEntity,
    Model as Document,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
    DocumentStatus,
    EnrichmentStatus,
    SensitivityLevel,
    StringList,
    RoleList,
    Embedding,
    NewDocument,
    DEFAULT_RETENTION_DAYS,
};

pub use document_image::{
    Entity as DocumentImageEntity,
    Model as DocumentImage,
    ActiveModel as DocumentImageActiveModel,
    Column as DocumentImageColumn,
};
