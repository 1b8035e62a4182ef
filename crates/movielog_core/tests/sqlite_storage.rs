//! Relational-store specifics: engine-enforced constraints, declarative
//! cascade delete, and the review extension absent from the other backends.

use movielog_core::{CatalogStorage, MovieDraft, SqliteStorage, StorageError, UserDraft};

fn draft(name: &str, username: &str) -> UserDraft {
    UserDraft {
        name: name.to_string(),
        username: username.to_string(),
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
fn deleting_the_highest_user_id_still_never_recycles_it() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.create_user(&draft("Ann", "ann1")).unwrap();
    let ben = storage.create_user(&draft("Ben", "ben2")).unwrap();

    storage.delete_user(ben.id, "secret").unwrap();

    let next = storage.create_user(&draft("Cam", "cam3")).unwrap();
    assert_eq!(next.id, 3, "AUTOINCREMENT must not hand out 2 again");
}

#[test]
fn duplicate_email_is_rejected_by_the_engine() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
        .create_user(&UserDraft {
            email: Some("ann@example.com".to_string()),
            ..draft("Ann", "ann1")
        })
        .unwrap();

    // No application-level pre-check exists for email; the UNIQUE
    // constraint surfaces as a persistence failure.
    let err = storage
        .create_user(&UserDraft {
            email: Some("ann@example.com".to_string()),
            ..draft("Ben", "ben2")
        })
        .unwrap_err();
    assert!(matches!(err, StorageError::Persistence(_)));
}

#[test]
fn reviews_attach_to_owned_movies_only() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let ann = storage.create_user(&draft("Ann", "ann1")).unwrap();
    let ben = storage.create_user(&draft("Ben", "ben2")).unwrap();
    let movie = storage.add_movie(ann.id, &dune()).movie.unwrap();

    let review = storage.add_review(ann.id, movie.id, "stunning sand").unwrap();
    assert_eq!(review.movie_id, movie.id);
    assert_eq!(review.user_id, ann.id);

    // Ben does not own the movie, so it resolves as absent for him.
    let err = storage.add_review(ben.id, movie.id, "mine too").unwrap_err();
    assert!(matches!(err, StorageError::MovieNotFound(id) if id == movie.id));

    let err = storage.add_review(ann.id, 999, "ghost").unwrap_err();
    assert!(matches!(err, StorageError::MovieNotFound(999)));
}

#[test]
fn list_reviews_is_ordered_by_id() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let ann = storage.create_user(&draft("Ann", "ann1")).unwrap();
    let movie = storage.add_movie(ann.id, &dune()).movie.unwrap();

    storage.add_review(ann.id, movie.id, "first").unwrap();
    storage.add_review(ann.id, movie.id, "second").unwrap();

    let reviews = storage.list_reviews().unwrap();
    assert_eq!(reviews.len(), 2);
    assert!(reviews[0].id < reviews[1].id);
    assert_eq!(reviews[0].text, "first");

    let for_movie = storage.movie_reviews(movie.id).unwrap();
    assert_eq!(for_movie.len(), 2);
}

#[test]
fn deleting_a_movie_cascades_its_reviews() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let ann = storage.create_user(&draft("Ann", "ann1")).unwrap();
    let movie = storage.add_movie(ann.id, &dune()).movie.unwrap();
    storage.add_review(ann.id, movie.id, "stunning sand").unwrap();

    storage.delete_movie(ann.id, movie.id).unwrap();

    assert!(storage.list_reviews().unwrap().is_empty());
}

#[test]
fn deleting_a_user_cascades_movies_and_reviews_transitively() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let ann = storage.create_user(&draft("Ann", "ann1")).unwrap();
    let ben = storage.create_user(&draft("Ben", "ben2")).unwrap();
    let anns_movie = storage.add_movie(ann.id, &dune()).movie.unwrap();
    let bens_movie = storage.add_movie(ben.id, &dune()).movie.unwrap();
    storage.add_review(ann.id, anns_movie.id, "gone soon").unwrap();
    storage.add_review(ben.id, bens_movie.id, "still here").unwrap();

    storage.delete_user(ann.id, "secret").unwrap();

    let reviews = storage.list_reviews().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].text, "still here");
    assert!(storage.get_movie(ben.id, bens_movie.id).unwrap().is_some());
}

#[test]
fn movie_ids_are_globally_unique_across_users() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let ann = storage.create_user(&draft("Ann", "ann1")).unwrap();
    let ben = storage.create_user(&draft("Ben", "ben2")).unwrap();

    let first = storage.add_movie(ann.id, &dune()).movie.unwrap();
    let second = storage.add_movie(ben.id, &dune()).movie.unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
}

#[test]
fn users_list_is_ordered_by_name() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.create_user(&draft("Zoe", "zoe1")).unwrap();
    storage.create_user(&draft("Ann", "ann1")).unwrap();

    let users = storage.list_users().unwrap();
    assert_eq!(users[0].name, "Ann");
    assert_eq!(users[1].name, "Zoe");
}
