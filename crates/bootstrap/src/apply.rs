// apply.rs - idempotent application of a descriptor against a live target

use crate::descriptor::model::{
    ApplicationUser, CollectionDescriptor, DatabaseDescriptor, IndexSpec,
};
use crate::error::BootstrapError;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{Error, ErrorKind, WriteFailure};
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::info;

const DUPLICATE_KEY: i32 = 11000;

// Linear apply sequence: user, collections, indexes, seed data. No retries
// and no rollback; the first error halts the run and anything already
// applied stays in place.
pub async fn apply_descriptor(
    client: &Client,
    descriptor: &DatabaseDescriptor,
) -> Result<(), BootstrapError> {
    let db = client.database(&descriptor.name);

    // Selecting a database never touches the server, so ping first to fail
    // on an unreachable target before any step runs.
    db.run_command(doc! { "ping": 1 }, None)
        .await
        .map_err(|source| BootstrapError::Connection { source })?;

    if let Some(user) = &descriptor.user {
        ensure_user(&db, user).await?;
    }

    let existing = db
        .list_collection_names(None)
        .await
        .map_err(driver_error)?;

    for collection in &descriptor.collections {
        ensure_collection(&db, collection, &existing).await?;
        ensure_indexes(&db, collection).await?;
        seed_collection(&db, collection).await?;
    }

    info!("Database initialized: {}", descriptor.name);
    Ok(())
}

async fn ensure_user(db: &Database, user: &ApplicationUser) -> Result<(), BootstrapError> {
    let response = db
        .run_command(doc! { "usersInfo": &user.username }, None)
        .await
        .map_err(driver_error)?;

    // An existing user is left untouched; credentials are never rotated here.
    let exists = response
        .get_array("users")
        .map(|users| !users.is_empty())
        .unwrap_or(false);
    if exists {
        info!("User already exists, leaving untouched: {}", user.username);
        return Ok(());
    }

    let roles: Vec<Bson> = user
        .roles
        .iter()
        .map(|grant| Bson::from(doc! { "role": &grant.role, "db": &grant.db }))
        .collect();

    db.run_command(
        doc! { "createUser": &user.username, "pwd": &user.password, "roles": roles },
        None,
    )
    .await
    .map_err(driver_error)?;

    info!("Created application user: {}", user.username);
    Ok(())
}

async fn ensure_collection(
    db: &Database,
    collection: &CollectionDescriptor,
    existing: &[String],
) -> Result<(), BootstrapError> {
    if existing.iter().any(|name| name == &collection.name) {
        return Ok(());
    }

    db.create_collection(&collection.name, None)
        .await
        .map_err(driver_error)?;

    info!("Created collection: {}", collection.name);
    Ok(())
}

async fn ensure_indexes(
    db: &Database,
    collection: &CollectionDescriptor,
) -> Result<(), BootstrapError> {
    if collection.indexes.is_empty() {
        return Ok(());
    }

    let coll: Collection<Document> = db.collection(&collection.name);

    let mut existing: Vec<IndexModel> = Vec::new();
    let mut cursor = coll.list_indexes(None).await.map_err(driver_error)?;
    while let Some(index) = cursor.try_next().await.map_err(driver_error)? {
        existing.push(index);
    }

    for spec in &collection.indexes {
        match classify_index(spec, &existing) {
            IndexState::Present => {}
            IndexState::Conflicting { found } => {
                return Err(BootstrapError::Conflict {
                    collection: collection.name.clone(),
                    existing: found,
                    requested: spec.describe(),
                });
            }
            IndexState::Missing => {
                coll.create_index(spec.to_model(), None)
                    .await
                    .map_err(driver_error)?;
                info!("Created index on {}: {}", collection.name, spec.describe());
            }
        }
    }

    Ok(())
}

async fn seed_collection(
    db: &Database,
    collection: &CollectionDescriptor,
) -> Result<(), BootstrapError> {
    if collection.seeds.is_empty() {
        return Ok(());
    }

    let coll: Collection<Document> = db.collection(&collection.name);

    // Seed data goes in once; a collection that already holds documents is
    // never re-seeded.
    let count = coll
        .count_documents(None, None)
        .await
        .map_err(driver_error)?;
    if count > 0 {
        info!(
            "Collection {} already holds {} documents, skipping seed data",
            collection.name, count
        );
        return Ok(());
    }

    coll.insert_many(&collection.seeds, None)
        .await
        .map_err(|source| {
            if is_duplicate_key(&source) {
                BootstrapError::Validation {
                    collection: collection.name.clone(),
                    source,
                }
            } else {
                driver_error(source)
            }
        })?;

    info!(
        "Inserted {} seed documents into {}",
        collection.seeds.len(),
        collection.name
    );
    Ok(())
}

enum IndexState {
    Present,
    Conflicting { found: String },
    Missing,
}

// An index with the same ordered field names either matches the spec exactly
// (no-op) or conflicts on direction/uniqueness. The same fields in a
// different order are a distinct index and can coexist.
fn classify_index(spec: &IndexSpec, existing: &[IndexModel]) -> IndexState {
    let wanted = spec.signature();

    for index in existing {
        let found = signature_of(index);
        let same_fields = found.len() == wanted.len()
            && found.iter().zip(&wanted).all(|(a, b)| a.0 == b.0);
        if !same_fields {
            continue;
        }

        if found == wanted && is_unique(index) == spec.unique {
            return IndexState::Present;
        }
        return IndexState::Conflicting {
            found: describe_index(index),
        };
    }

    IndexState::Missing
}

fn signature_of(index: &IndexModel) -> Vec<(String, i32)> {
    index
        .keys
        .iter()
        .map(|(field, direction)| (field.clone(), direction_sign(direction)))
        .collect()
}

// The server echoes directions in whatever numeric type the creator sent
// (shell scripts produce doubles). Non-numeric kinds such as "text" or
// "hashed" never match a descriptor signature.
fn direction_sign(value: &Bson) -> i32 {
    match value {
        Bson::Int32(n) => n.signum(),
        Bson::Int64(n) => n.signum() as i32,
        Bson::Double(n) => {
            if *n < 0.0 {
                -1
            } else {
                1
            }
        }
        _ => 0,
    }
}

fn is_unique(index: &IndexModel) -> bool {
    index
        .options
        .as_ref()
        .and_then(|options| options.unique)
        .unwrap_or(false)
}

fn describe_index(index: &IndexModel) -> String {
    let keys = index
        .keys
        .iter()
        .map(|(field, direction)| format!("{}:{}", field, direction_sign(direction)))
        .collect::<Vec<_>>()
        .join(", ");

    if is_unique(index) {
        format!("{{{keys}}} (unique)")
    } else {
        format!("{{{keys}}}")
    }
}

fn driver_error(source: Error) -> BootstrapError {
    if is_connection(&source) {
        BootstrapError::Connection { source }
    } else {
        BootstrapError::Driver { source }
    }
}

fn is_connection(err: &Error) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::DnsResolve { .. }
    )
}

fn is_duplicate_key(err: &Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::BulkWrite(failure) => failure
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY))
            .unwrap_or(false),
        _ => false,
    }
}
