//! Flat-file relational backend: two delimited files with id cross-references.
//!
//! # Responsibility
//! - Persist users and movies in separate CSV files, simulating a
//!   relational schema: the user row carries a comma-joined list of owned
//!   movie ids, the movie row carries an `owner_id` back-reference.
//! - Keep both files consistent through hand-cascaded mutations.
//!
//! # Invariants
//! - Multi-step mutations are two sequential whole-file rewrites; there is
//!   no cross-file transaction. The user-file rewrite alone is protected by
//!   a pre-mutation snapshot written back verbatim on failure.
//! - After `delete_user`, the movie file holds no row with that `owner_id`.
//! - Movie ids are global across the movie file, not per-user.

use crate::auth;
use crate::model::movie::{Movie, MovieDraft, MovieId, MovieUpdate};
use crate::model::user::{User, UserDraft, UserId, UserUpdate};
use crate::storage::{
    AddMovieOutcome, CatalogStorage, StorageError, StorageResult, UserSelector,
};
use log::info;
use std::path::{Path, PathBuf};

const USER_HEADER: [&str; 6] = ["id", "name", "username", "email", "password_hash", "movies"];
const MOVIE_HEADER: [&str; 6] = ["id", "title", "year", "rating", "poster", "owner_id"];

/// Handle on one users-file/movies-file pair.
#[derive(Debug)]
pub struct CsvStorage {
    user_path: PathBuf,
    movie_path: PathBuf,
}

/// One row of the users file: the user plus its movie-id foreign keys.
#[derive(Debug, Clone)]
struct UserRow {
    user: User,
    movie_ids: Vec<MovieId>,
}

impl CsvStorage {
    /// Opens the file pair, seeding header-only files when missing.
    pub fn open(
        user_path: impl Into<PathBuf>,
        movie_path: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let storage = Self {
            user_path: user_path.into(),
            movie_path: movie_path.into(),
        };
        if !storage.user_path.exists() {
            std::fs::write(&storage.user_path, encode_record(&USER_HEADER))?;
        }
        if !storage.movie_path.exists() {
            std::fs::write(&storage.movie_path, encode_record(&MOVIE_HEADER))?;
        }
        Ok(storage)
    }

    fn read_user_rows(&self) -> StorageResult<Vec<UserRow>> {
        let records = read_table(&self.user_path, &USER_HEADER)?;
        records
            .iter()
            .map(|record| parse_user_row(record, &self.user_path))
            .collect()
    }

    /// Rewrites the users file, restoring the pre-mutation snapshot on a
    /// failed write. The snapshot covers this file only; the movie file has
    /// no such protection.
    fn write_user_rows(&self, rows: &[UserRow]) -> StorageResult<()> {
        let snapshot = std::fs::read_to_string(&self.user_path).map_err(|err| {
            StorageError::Persistence(format!(
                "cannot snapshot users file `{}`: {err}",
                self.user_path.display()
            ))
        })?;

        let mut content = encode_record(&USER_HEADER);
        for row in rows {
            content.push_str(&encode_record(&user_row_fields(row)));
        }

        if let Err(err) = std::fs::write(&self.user_path, content) {
            let _ = std::fs::write(&self.user_path, snapshot);
            return Err(StorageError::Persistence(format!(
                "cannot rewrite users file `{}`: {err}",
                self.user_path.display()
            )));
        }
        Ok(())
    }

    fn read_movie_rows(&self) -> StorageResult<Vec<Movie>> {
        let records = read_table(&self.movie_path, &MOVIE_HEADER)?;
        records
            .iter()
            .map(|record| parse_movie_row(record, &self.movie_path))
            .collect()
    }

    fn write_movie_rows(&self, rows: &[Movie]) -> StorageResult<()> {
        let mut content = encode_record(&MOVIE_HEADER);
        for movie in rows {
            content.push_str(&encode_record(&movie_row_fields(movie)));
        }
        std::fs::write(&self.movie_path, content).map_err(|err| {
            StorageError::Persistence(format!(
                "cannot rewrite movies file `{}`: {err}",
                self.movie_path.display()
            ))
        })
    }

    fn next_user_id(rows: &[UserRow]) -> UserId {
        rows.iter().map(|row| row.user.id).max().unwrap_or(0) + 1
    }

    /// Global allocation across the movie file keeps the id scheme shared
    /// by all users, matching the physical layout.
    fn next_movie_id(movies: &[Movie]) -> MovieId {
        movies.iter().map(|movie| movie.id).max().unwrap_or(0) + 1
    }

    fn authenticate(row: &UserRow, password: &str) -> StorageResult<()> {
        if !auth::verify_password(&row.user.password_hash, password) {
            return Err(StorageError::InvalidCredential);
        }
        Ok(())
    }

    fn try_add_movie(&self, user_id: UserId, draft: &MovieDraft) -> StorageResult<Movie> {
        let mut user_rows = self.read_user_rows()?;
        let mut movies = self.read_movie_rows()?;
        let movie_id = Self::next_movie_id(&movies);

        let row = user_rows
            .iter_mut()
            .find(|row| row.user.id == user_id)
            .ok_or(StorageError::UserNotFound(user_id))?;
        row.movie_ids.push(movie_id);

        // First rewrite: the owner's foreign-key list. Second rewrite: the
        // movie row itself. A failure between the two leaves a dangling
        // reference; only single-writer deployments are supported.
        self.write_user_rows(&user_rows)?;
        let movie = draft.clone().into_movie(movie_id, user_id);
        movies.push(movie.clone());
        self.write_movie_rows(&movies)?;
        Ok(movie)
    }
}

impl CatalogStorage for CsvStorage {
    fn list_users(&self) -> StorageResult<Vec<User>> {
        Ok(self
            .read_user_rows()?
            .into_iter()
            .map(|row| row.user)
            .collect())
    }

    fn find_user(&self, selector: &UserSelector) -> StorageResult<Option<User>> {
        let rows = self.read_user_rows()?;
        let row = match selector {
            UserSelector::Id(user_id) => rows.into_iter().find(|row| row.user.id == *user_id),
            UserSelector::Username(username) => {
                rows.into_iter().find(|row| row.user.username == *username)
            }
        };
        Ok(row.map(|row| row.user))
    }

    fn check_password(&self, user_id: UserId, password: &str) -> StorageResult<bool> {
        let rows = self.read_user_rows()?;
        Ok(rows
            .iter()
            .find(|row| row.user.id == user_id)
            .map(|row| auth::verify_password(&row.user.password_hash, password))
            .unwrap_or(false))
    }

    fn create_user(&self, draft: &UserDraft) -> StorageResult<User> {
        draft.validate()?;
        let mut rows = self.read_user_rows()?;

        if rows.iter().any(|row| row.user.username == draft.username) {
            return Err(StorageError::DuplicateUsername(draft.username.clone()));
        }

        let user = User {
            id: Self::next_user_id(&rows),
            name: draft.name.clone(),
            username: draft.username.clone(),
            email: draft.email.clone(),
            password_hash: auth::hash_password(&draft.password)?,
        };
        rows.push(UserRow {
            user: user.clone(),
            movie_ids: Vec::new(),
        });
        self.write_user_rows(&rows)?;
        Ok(user)
    }

    fn update_user(
        &self,
        user_id: UserId,
        update: &UserUpdate,
        current_password: &str,
    ) -> StorageResult<()> {
        let mut rows = self.read_user_rows()?;
        {
            let row = rows
                .iter()
                .find(|row| row.user.id == user_id)
                .ok_or(StorageError::UserNotFound(user_id))?;
            Self::authenticate(row, current_password)?;
        }

        if rows
            .iter()
            .any(|other| other.user.id != user_id && other.user.username == update.username)
        {
            return Err(StorageError::DuplicateUsername(update.username.clone()));
        }

        let row = rows
            .iter_mut()
            .find(|row| row.user.id == user_id)
            .ok_or(StorageError::UserNotFound(user_id))?;
        row.user.name = update.name.clone();
        row.user.username = update.username.clone();
        row.user.email = update.email.clone();
        self.write_user_rows(&rows)
    }

    fn delete_user(&self, user_id: UserId, current_password: &str) -> StorageResult<()> {
        let mut rows = self.read_user_rows()?;
        {
            let row = rows
                .iter()
                .find(|row| row.user.id == user_id)
                .ok_or(StorageError::UserNotFound(user_id))?;
            Self::authenticate(row, current_password)?;
        }

        // Cascade by hand: purge the user's movie rows first, then drop the
        // user row itself.
        let movies = self.read_movie_rows()?;
        let survivors: Vec<Movie> = movies
            .into_iter()
            .filter(|movie| movie.owner_id != user_id)
            .collect();
        self.write_movie_rows(&survivors)?;

        let dropped = rows
            .iter()
            .find(|row| row.user.id == user_id)
            .map(|row| row.movie_ids.len())
            .unwrap_or(0);
        rows.retain(|row| row.user.id != user_id);
        self.write_user_rows(&rows)?;
        info!(
            "event=user_delete module=storage_csv status=ok user_id={} movies_dropped={}",
            user_id, dropped
        );
        Ok(())
    }

    fn list_movies(&self, user_id: UserId) -> StorageResult<Vec<Movie>> {
        let rows = self.read_user_rows()?;
        if !rows.iter().any(|row| row.user.id == user_id) {
            return Err(StorageError::UserNotFound(user_id));
        }
        Ok(self
            .read_movie_rows()?
            .into_iter()
            .filter(|movie| movie.owner_id == user_id)
            .collect())
    }

    fn add_movie(&self, user_id: UserId, draft: &MovieDraft) -> AddMovieOutcome {
        match self.try_add_movie(user_id, draft) {
            Ok(movie) => AddMovieOutcome::accepted(movie),
            Err(err) => AddMovieOutcome::rejected(err.to_string()),
        }
    }

    fn get_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<Option<Movie>> {
        Ok(self
            .read_movie_rows()?
            .into_iter()
            .find(|movie| movie.id == movie_id && movie.owner_id == user_id))
    }

    fn update_movie(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        update: &MovieUpdate,
    ) -> StorageResult<()> {
        let mut movies = self.read_movie_rows()?;
        let movie = movies
            .iter_mut()
            .find(|movie| movie.id == movie_id && movie.owner_id == user_id)
            .ok_or(StorageError::MovieNotFound(movie_id))?;

        movie.title = update.title.clone();
        movie.year = update.year.clone();
        movie.rating = update.rating;
        self.write_movie_rows(&movies)
    }

    fn delete_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<String> {
        let mut movies = self.read_movie_rows()?;
        let index = movies
            .iter()
            .position(|movie| movie.id == movie_id && movie.owner_id == user_id)
            .ok_or(StorageError::MovieNotFound(movie_id))?;
        let removed = movies.remove(index);

        // Movie row first, then the owner's foreign-key list.
        self.write_movie_rows(&movies)?;
        let mut rows = self.read_user_rows()?;
        if let Some(row) = rows.iter_mut().find(|row| row.user.id == user_id) {
            row.movie_ids.retain(|id| *id != movie_id);
        }
        self.write_user_rows(&rows)?;
        Ok(format!("{} deleted", removed.title))
    }
}

fn user_row_fields(row: &UserRow) -> [String; 6] {
    [
        row.user.id.to_string(),
        row.user.name.clone(),
        row.user.username.clone(),
        row.user.email.clone().unwrap_or_default(),
        row.user.password_hash.clone(),
        row.movie_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(","),
    ]
}

fn movie_row_fields(movie: &Movie) -> [String; 6] {
    [
        movie.id.to_string(),
        movie.title.clone(),
        movie.year.clone(),
        movie
            .rating
            .map(|rating| rating.to_string())
            .unwrap_or_default(),
        movie.poster.clone().unwrap_or_default(),
        movie.owner_id.to_string(),
    ]
}

fn parse_user_row(record: &[String], path: &Path) -> StorageResult<UserRow> {
    let movie_ids = if record[5].is_empty() {
        Vec::new()
    } else {
        record[5]
            .split(',')
            .map(|raw| parse_id(raw, "movies", path))
            .collect::<StorageResult<Vec<MovieId>>>()?
    };

    Ok(UserRow {
        user: User {
            id: parse_id(&record[0], "id", path)?,
            name: record[1].clone(),
            username: record[2].clone(),
            email: optional_field(&record[3]),
            password_hash: record[4].clone(),
        },
        movie_ids,
    })
}

fn parse_movie_row(record: &[String], path: &Path) -> StorageResult<Movie> {
    let rating = if record[3].is_empty() {
        None
    } else {
        Some(record[3].parse::<f64>().map_err(|_| {
            StorageError::Persistence(format!(
                "malformed rating `{}` in `{}`",
                record[3],
                path.display()
            ))
        })?)
    };

    Ok(Movie {
        id: parse_id(&record[0], "id", path)?,
        title: record[1].clone(),
        year: record[2].clone(),
        rating,
        poster: optional_field(&record[4]),
        owner_id: parse_id(&record[5], "owner_id", path)?,
    })
}

fn parse_id(raw: &str, column: &str, path: &Path) -> StorageResult<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        StorageError::Persistence(format!(
            "malformed {column} value `{raw}` in `{}`",
            path.display()
        ))
    })
}

fn optional_field(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn read_table(path: &Path, header: &[&str; 6]) -> StorageResult<Vec<Vec<String>>> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        StorageError::Persistence(format!("cannot read `{}`: {err}", path.display()))
    })?;
    let mut records = parse_table(&raw)
        .map_err(|err| StorageError::Persistence(format!("malformed `{}`: {err}", path.display())))?;

    if records.is_empty() {
        return Err(StorageError::Persistence(format!(
            "missing header row in `{}`",
            path.display()
        )));
    }
    let first = records.remove(0);
    if first != *header {
        return Err(StorageError::Persistence(format!(
            "unexpected header {first:?} in `{}`",
            path.display()
        )));
    }
    for record in &records {
        if record.len() != header.len() {
            return Err(StorageError::Persistence(format!(
                "row with {} fields, expected {}, in `{}`",
                record.len(),
                header.len(),
                path.display()
            )));
        }
    }
    Ok(records)
}

/// Encodes one record, quoting fields that contain the delimiter, quotes,
/// or line breaks (embedded quotes are doubled).
fn encode_record<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = String::new();
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            line.push(',');
        }
        let field = field.as_ref();
        if field.contains(['"', ',', '\n', '\r']) {
            line.push('"');
            line.push_str(&field.replace('"', "\"\""));
            line.push('"');
        } else {
            line.push_str(field);
        }
    }
    line.push('\n');
    line
}

/// Parses delimited records, honoring quoted fields with embedded
/// delimiters, doubled quotes, and line breaks.
fn parse_table(raw: &str) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                other => field.push(other),
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() => in_quotes = true,
            ',' => {
                record.push(std::mem::take(&mut field));
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            other => field.push(other),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::{encode_record, parse_table};

    #[test]
    fn encode_quotes_fields_with_delimiters() {
        let line = encode_record(&["1", "Dune, Part One", "said \"hi\""]);
        assert_eq!(line, "1,\"Dune, Part One\",\"said \"\"hi\"\"\"\n");
    }

    #[test]
    fn parse_roundtrips_quoted_fields() {
        let encoded = encode_record(&["1", "Dune, Part One", "line\nbreak"]);
        let records = parse_table(&encoded).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], vec!["1", "Dune, Part One", "line\nbreak"]);
    }

    #[test]
    fn parse_handles_empty_fields_and_crlf() {
        let records = parse_table("a,,c\r\nd,e,\r\n").unwrap();
        assert_eq!(records, vec![vec!["a", "", "c"], vec!["d", "e", ""]]);
    }

    #[test]
    fn parse_rejects_unterminated_quote() {
        assert!(parse_table("a,\"unclosed\n").is_err());
    }
}
