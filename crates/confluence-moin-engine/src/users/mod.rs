//! MoinMoin user accounts.
//!
//! A MoinMoin user is a file in the `user` directory, named by a numeric id
//! such as `1406058695.752081.1223`, with `key=value` lines. Pages record
//! their last editor by that id.

mod crowd;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::info;
use regex::Regex;

pub use crowd::{
    CrowdBackup, CrowdUser, Membership, MoinUserFile, add_default_user, convert_users,
};

use crate::element::ParseError;
use crate::timestamp::TimestampError;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("crowd backup is not well-formed: {0}")]
    Malformed(#[from] ParseError),

    #[error("no name= entry found in {0}")]
    MissingName(PathBuf),

    #[error("no default user ({0}) found")]
    MissingDefaultUser(String),

    #[error("crowd user has no {0}")]
    MissingField(&'static str),

    #[error("crowd user {user} has a bad creation date: {source}")]
    Timestamp {
        user: String,
        source: TimestampError,
    },

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl UserError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| UserError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn user_file_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[0-9.]+$").expect("Invalid user file regex"))
}

/// Whether `file_name` looks like a MoinMoin user id.
pub fn is_user_file_name(file_name: &str) -> bool {
    user_file_regex().is_match(file_name)
}

/// The value of the first `name=` line of a user file.
pub fn user_name_from_file(path: &Path) -> Result<String, UserError> {
    let content = fs::read_to_string(path).map_err(UserError::io(path))?;
    content
        .lines()
        .find_map(|line| line.strip_prefix("name="))
        .map(str::to_owned)
        .ok_or_else(|| UserError::MissingName(path.to_path_buf()))
}

/// User files in `dir` as `(file name, path)`, sorted by file name.
fn user_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, UserError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(UserError::io(dir))? {
        let entry = entry.map_err(UserError::io(dir))?;
        let path = entry.path();
        let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if path.is_file() && is_user_file_name(&file_name) {
            files.push((file_name, path));
        }
    }
    files.sort();
    Ok(files)
}

/// User name → user id lookup for the existing MoinMoin users.
#[derive(Debug, Clone)]
pub struct MoinUsers {
    ids: BTreeMap<String, String>,
    default_user: String,
}

impl MoinUsers {
    pub fn read_from_dir(dir: &Path, default_user: &str) -> Result<Self, UserError> {
        let mut ids = BTreeMap::new();
        for (file_name, path) in user_files(dir)? {
            ids.insert(user_name_from_file(&path)?, file_name);
        }
        info!("Read {} MoinMoin users from {}", ids.len(), dir.display());
        Self::from_ids(ids, default_user)
    }

    /// Build the lookup from `(name, id)` pairs. The default user must be
    /// among them.
    pub fn from_ids(
        ids: impl IntoIterator<Item = (String, String)>,
        default_user: &str,
    ) -> Result<Self, UserError> {
        let ids: BTreeMap<_, _> = ids.into_iter().collect();
        if !ids.contains_key(default_user) {
            return Err(UserError::MissingDefaultUser(default_user.to_owned()));
        }
        Ok(Self {
            ids,
            default_user: default_user.to_owned(),
        })
    }

    pub fn id(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(String::as_str)
    }

    /// The id for `name`, falling back to the default user.
    pub fn id_or_default(&self, name: Option<&str>) -> &str {
        name.and_then(|name| self.id(name))
            .or_else(|| self.id(&self.default_user))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Non-empty trimmed lines of a valid-users list.
pub fn read_valid_users(path: &Path) -> Result<Vec<String>, UserError> {
    let content = fs::read_to_string(path).map_err(UserError::io(path))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneSummary {
    pub kept: Vec<String>,
    pub moved: Vec<String>,
}

/// Move every user file in `dir` whose user is not in `valid` into
/// `move_to`.
pub fn prune_users(dir: &Path, valid: &[String], move_to: &Path) -> Result<PruneSummary, UserError> {
    for folder in [dir, move_to] {
        if !folder.is_dir() {
            return Err(UserError::NotADirectory(folder.to_path_buf()));
        }
    }

    let mut summary = PruneSummary::default();
    for (file_name, path) in user_files(dir)? {
        let name = user_name_from_file(&path)?;
        if valid.contains(&name) {
            info!("ok -> {name}");
            summary.kept.push(name);
        } else {
            info!("move -> {name}");
            let target = move_to.join(&file_name);
            fs::rename(&path, &target).map_err(UserError::io(&path))?;
            summary.moved.push(name);
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{create_test_dir, create_test_file};
    use rstest::rstest;

    #[rstest]
    #[case("1406058695.752081.1223", true)]
    #[case("12", true)]
    #[case("1406058695.752081.1223.trail", false)]
    #[case("README", false)]
    #[case("", false)]
    fn user_file_names(#[case] file_name: &str, #[case] expected: bool) {
        assert_eq!(is_user_file_name(file_name), expected);
    }

    #[test]
    fn reads_names_from_user_files() {
        // Given
        let dir = create_test_dir();
        create_test_file(dir.path(), "100.1", "aliasname=A\nname=alice\n");
        create_test_file(dir.path(), "100.2", "name=unknown\n");
        create_test_file(dir.path(), "notes.txt", "name=ignored\n");

        // When
        let users = MoinUsers::read_from_dir(dir.path(), "unknown").unwrap();

        // Then
        assert_eq!(users.len(), 2);
        assert_eq!(users.id("alice"), Some("100.1"));
        assert_eq!(users.id("ignored"), None);
        assert_eq!(users.id_or_default(Some("alice")), "100.1");
        assert_eq!(users.id_or_default(Some("bob")), "100.2");
        assert_eq!(users.id_or_default(None), "100.2");
    }

    #[test]
    fn default_user_must_exist() {
        let dir = create_test_dir();
        create_test_file(dir.path(), "100.1", "name=alice\n");

        let result = MoinUsers::read_from_dir(dir.path(), "unknown");

        assert!(matches!(result, Err(UserError::MissingDefaultUser(name)) if name == "unknown"));
    }

    #[test]
    fn user_file_without_name_is_an_error() {
        let dir = create_test_dir();
        let path = create_test_file(dir.path(), "100.1", "email=a@b\n");

        assert!(matches!(
            user_name_from_file(&path),
            Err(UserError::MissingName(_))
        ));
    }

    #[test]
    fn prunes_users_not_listed() {
        // Given
        let dir = create_test_dir();
        let disabled = dir.path().join("disabled");
        fs::create_dir(&disabled).unwrap();
        create_test_file(dir.path(), "1.1", "name=alice\n");
        create_test_file(dir.path(), "1.2", "name=spammer\n");
        let list = create_test_file(dir.path(), "valid_users", "alice\n\n  \n");

        // When
        let valid = read_valid_users(&list).unwrap();
        let summary = prune_users(dir.path(), &valid, &disabled).unwrap();

        // Then
        assert_eq!(valid, vec!["alice".to_owned()]);
        assert_eq!(summary.kept, vec!["alice".to_owned()]);
        assert_eq!(summary.moved, vec!["spammer".to_owned()]);
        assert!(dir.path().join("1.1").exists());
        assert!(disabled.join("1.2").exists());
        assert!(!dir.path().join("1.2").exists());
    }

    #[test]
    fn prune_requires_directories() {
        let dir = create_test_dir();

        let result = prune_users(dir.path(), &[], &dir.path().join("missing"));

        assert!(matches!(result, Err(UserError::NotADirectory(_))));
    }
}
