// descriptor/model.rs - typed model for database bootstrap descriptors

use mongodb::bson::Document;
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use serde::Deserialize;
use std::path::PathBuf;

/// Everything the applier needs to bring one database up: an optional
/// application user and an ordered list of collections.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseDescriptor {
    pub name: String,
    pub user: Option<ApplicationUser>,
    #[serde(default)]
    pub collections: Vec<CollectionDescriptor>,
}

/// Created once if absent; an existing user is never modified.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationUser {
    pub username: String,
    pub password: String,
    pub roles: Vec<RoleGrant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDescriptor {
    pub name: String,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// JSON array of documents, resolved relative to the manifest file.
    pub seed_file: Option<PathBuf>,
    // Populated by the loader, never deserialized from the manifest.
    #[serde(skip)]
    pub seeds: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<IndexKey>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexKey {
    pub field: String,
    #[serde(default = "ascending")]
    pub direction: i32,
}

fn ascending() -> i32 {
    1
}

impl IndexSpec {
    /// Ordered field/direction pairs. Together with the uniqueness flag this
    /// is the structural identity of the index.
    pub fn signature(&self) -> Vec<(String, i32)> {
        self.keys
            .iter()
            .map(|key| (key.field.clone(), key.direction))
            .collect()
    }

    pub fn to_model(&self) -> IndexModel {
        let mut keys = Document::new();
        for key in &self.keys {
            keys.insert(key.field.as_str(), key.direction);
        }

        let options = IndexOptions::builder().unique(self.unique).build();

        IndexModel::builder().keys(keys).options(options).build()
    }

    /// Rendering used in log and error messages.
    pub fn describe(&self) -> String {
        let keys = self
            .keys
            .iter()
            .map(|key| format!("{}:{}", key.field, key.direction))
            .collect::<Vec<_>>()
            .join(", ");

        if self.unique {
            format!("{{{keys}}} (unique)")
        } else {
            format!("{{{keys}}}")
        }
    }
}
