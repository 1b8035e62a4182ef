//! Document-store specifics: on-disk shape, corruption handling, and
//! user-scoped movie ids.

use movielog_core::{CatalogStorage, JsonStorage, MovieDraft, StorageError, UserDraft};
use std::path::PathBuf;
use tempfile::TempDir;

fn open_store() -> (TempDir, PathBuf, JsonStorage) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    let storage = JsonStorage::open(&path).unwrap();
    (dir, path, storage)
}

fn ann() -> UserDraft {
    UserDraft {
        name: "Ann".to_string(),
        username: "ann1".to_string(),
        email: None,
        password: "secret".to_string(),
    }
}

fn dune() -> MovieDraft {
    MovieDraft {
        title: "Dune".to_string(),
        year: "2021".to_string(),
        rating: Some(8.0),
        poster: None,
    }
}

#[test]
fn open_seeds_an_empty_document() {
    let (_dir, path, _storage) = open_store();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["version"], 1);
    assert!(value["users"].as_object().unwrap().is_empty());
}

#[test]
fn document_layout_nests_movies_under_string_id_keys() {
    let (_dir, path, storage) = open_store();
    let user = storage.create_user(&ann()).unwrap();
    storage.add_movie(user.id, &dune());

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let entry = &value["users"]["1"];
    assert_eq!(entry["id"], 1);
    assert_eq!(entry["username"], "ann1");
    assert_eq!(entry["movies"][0]["title"], "Dune");
    assert_eq!(entry["movies"][0]["owner_id"], 1);
    // Only the opaque hash is persisted, never the plaintext.
    assert!(entry["password_hash"].as_str().unwrap().len() > 20);
    assert!(!std::fs::read_to_string(&path).unwrap().contains("secret"));
}

#[test]
fn malformed_document_surfaces_persistence_error() {
    let (_dir, path, storage) = open_store();
    std::fs::write(&path, "{not json").unwrap();

    let err = storage.list_users().unwrap_err();
    assert!(matches!(err, StorageError::Persistence(_)));
    let err = storage.create_user(&ann()).unwrap_err();
    assert!(matches!(err, StorageError::Persistence(_)));

    // The file is not rewritten or repaired.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
}

#[test]
fn movie_ids_are_scoped_per_user() {
    let (_dir, _path, storage) = open_store();
    let ann = storage.create_user(&ann()).unwrap();
    let ben = storage
        .create_user(&UserDraft {
            name: "Ben".to_string(),
            username: "ben2".to_string(),
            email: None,
            password: "secret".to_string(),
        })
        .unwrap();

    let first = storage.add_movie(ann.id, &dune()).movie.unwrap();
    let second = storage.add_movie(ben.id, &dune()).movie.unwrap();

    // Each user's list starts counting at 1; the two ids coincide.
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 1);
    assert_eq!(second.owner_id, ben.id);
}

#[test]
fn deleting_a_middle_movie_does_not_recycle_its_slot_position() {
    let (_dir, _path, storage) = open_store();
    let user = storage.create_user(&ann()).unwrap();
    for title in ["Dune", "Arrival", "Solaris"] {
        storage.add_movie(
            user.id,
            &MovieDraft {
                title: title.to_string(),
                year: "2000".to_string(),
                rating: None,
                poster: None,
            },
        );
    }

    storage.delete_movie(user.id, 2).unwrap();
    let next = storage.add_movie(user.id, &dune()).movie.unwrap();
    assert_eq!(next.id, 4, "allocation is max+1, not first-free-slot");
}

#[test]
fn deleting_a_user_drops_its_nested_movies_from_the_file() {
    let (_dir, path, storage) = open_store();
    let user = storage.create_user(&ann()).unwrap();
    storage.add_movie(user.id, &dune());

    storage.delete_user(user.id, "secret").unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("Dune"), "nested movies must vanish with the user");
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value["users"].as_object().unwrap().is_empty());
}
