// descriptor/load.rs - read descriptors from disk: a TOML manifest plus JSON seed files

use super::model::DatabaseDescriptor;
use crate::error::BootstrapError;
use mongodb::bson::Document;
use std::fs;
use std::path::Path;

pub fn load_descriptor(path: &Path) -> Result<DatabaseDescriptor, BootstrapError> {
    let manifest = fs::read_to_string(path).map_err(|source| BootstrapError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut descriptor: DatabaseDescriptor =
        toml::from_str(&manifest).map_err(|e| BootstrapError::Descriptor {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    // Seed files are named relative to the manifest that references them.
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for collection in &mut descriptor.collections {
        if let Some(seed_file) = &collection.seed_file {
            collection.seeds = load_seeds(&base.join(seed_file))?;
        }
    }

    Ok(descriptor)
}

// Seed files hold a JSON array of documents. Extended JSON values such as
// {"$date": "..."} deserialize to their BSON counterparts.
fn load_seeds(path: &Path) -> Result<Vec<Document>, BootstrapError> {
    let contents = fs::read_to_string(path).map_err(|source| BootstrapError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|e| BootstrapError::Descriptor {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;
    use std::fs;

    const MANIFEST: &str = r#"
name = "islandhop_trips"

[user]
username = "tripplanner"
password = "tripplanner123"
roles = [{ role = "readWrite", db = "islandhop_trips" }]

[[collections]]
name = "trips"
seed_file = "seeds/trips.json"

[[collections.indexes]]
keys = [{ field = "tripId" }, { field = "userId" }]
unique = true

[[collections]]
name = "user_preferences"

[[collections.indexes]]
keys = [{ field = "userId" }]
unique = true
"#;

    const SEEDS: &str = r#"[
        {
            "tripId": "sample_trip_001",
            "userId": "user@example.com",
            "startDate": { "$date": "2025-08-01T00:00:00Z" },
            "places": [{ "placeId": "place_001", "rating": 4.3 }]
        }
    ]"#;

    #[test]
    fn loads_manifest_and_resolves_seed_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("seeds")).unwrap();
        fs::write(dir.path().join("bootstrap.toml"), MANIFEST).unwrap();
        fs::write(dir.path().join("seeds/trips.json"), SEEDS).unwrap();

        let descriptor = load_descriptor(&dir.path().join("bootstrap.toml")).unwrap();

        assert_eq!(descriptor.name, "islandhop_trips");
        let user = descriptor.user.unwrap();
        assert_eq!(user.username, "tripplanner");
        assert_eq!(user.roles.len(), 1);
        assert_eq!(user.roles[0].role, "readWrite");

        assert_eq!(descriptor.collections.len(), 2);
        let trips = &descriptor.collections[0];
        assert_eq!(trips.name, "trips");
        assert!(trips.indexes[0].unique);
        assert_eq!(trips.seeds.len(), 1);
        assert_eq!(
            trips.seeds[0].get_str("tripId").unwrap(),
            "sample_trip_001"
        );
        // Extended JSON dates become real BSON datetimes.
        assert!(matches!(
            trips.seeds[0].get("startDate"),
            Some(Bson::DateTime(_))
        ));

        let prefs = &descriptor.collections[1];
        assert!(prefs.seed_file.is_none());
        assert!(prefs.seeds.is_empty());
    }

    #[test]
    fn missing_seed_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bootstrap.toml"),
            "name = \"pooling\"\n\n[[collections]]\nname = \"tripPools\"\nseed_file = \"missing.json\"\n",
        )
        .unwrap();

        let err = load_descriptor(&dir.path().join("bootstrap.toml")).unwrap_err();
        assert!(matches!(err, BootstrapError::Io { .. }));
    }

    #[test]
    fn malformed_manifest_is_a_descriptor_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bootstrap.toml"), "collections = 3\n").unwrap();

        let err = load_descriptor(&dir.path().join("bootstrap.toml")).unwrap_err();
        assert!(matches!(err, BootstrapError::Descriptor { .. }));
    }
}
