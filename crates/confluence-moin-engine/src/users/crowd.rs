//! Atlassian Crowd backups and their conversion to MoinMoin user files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::UserError;
use crate::element::{self, Attributes, ElementHandler, ElementStack};
use crate::timestamp::{Timestamp, crowd_date_to_seconds};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrowdUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub display_name: String,
    /// Unix seconds.
    pub created: Option<i64>,
    pub active: bool,
}

/// A `membership` entry: `child_name` belongs to group `parent_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub parent_name: String,
    pub child_name: String,
}

#[derive(Debug, Default)]
pub struct CrowdBackup {
    pub users: Vec<CrowdUser>,
    pub memberships: Vec<Membership>,
}

impl CrowdBackup {
    pub fn load_from_path(path: &Path) -> Result<Self, UserError> {
        let xml = fs::read_to_string(path).map_err(UserError::io(path))?;
        Self::from_xml(&xml)
    }

    pub fn from_xml(xml: &str) -> Result<Self, UserError> {
        let mut reader = CrowdReader::default();
        element::parse(xml, &mut reader)?;
        Ok(reader.backup)
    }

    pub fn active_users(&self) -> impl Iterator<Item = &CrowdUser> {
        self.users.iter().filter(|user| user.active)
    }

    /// Names of the direct members of `group`.
    pub fn group_members(&self, group: &str) -> Vec<&str> {
        self.memberships
            .iter()
            .filter(|membership| membership.parent_name == group)
            .map(|membership| membership.child_name.as_str())
            .collect()
    }
}

/// Collects the direct child fields of every `user` element and of
/// `memberships/membership` entries.
#[derive(Debug, Default)]
struct CrowdReader {
    backup: CrowdBackup,
    fields: HashMap<String, String>,
}

impl CrowdReader {
    fn take_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name).filter(|value| !value.is_empty())
    }

    fn finish_user(&mut self) -> Result<(), UserError> {
        let id = self.take_field("id").ok_or(UserError::MissingField("id"))?;
        let name = self.take_field("name").ok_or(UserError::MissingField("name"))?;
        let created = self
            .take_field("createdDate")
            .map(|date| crowd_date_to_seconds(&date))
            .transpose()
            .map_err(|source| UserError::Timestamp {
                user: name.clone(),
                source,
            })?;

        let user = CrowdUser {
            active: self.take_field("active").as_deref() == Some("true"),
            email: self.take_field("email").unwrap_or_default(),
            display_name: self.take_field("displayName").unwrap_or_default(),
            id,
            name,
            created,
        };
        self.backup.users.push(user);
        Ok(())
    }

    fn finish_membership(&mut self) {
        match (self.take_field("parentName"), self.take_field("childName")) {
            (Some(parent_name), Some(child_name)) => self.backup.memberships.push(Membership {
                parent_name,
                child_name,
            }),
            _ => debug!("skipping incomplete membership"),
        }
    }
}

impl ElementHandler for CrowdReader {
    type Error = UserError;

    fn open_element(&mut self, name: &str, _attributes: &Attributes) {
        if matches!(name, "user" | "membership") {
            self.fields.clear();
        }
    }

    fn handle_element(&mut self, stack: &mut ElementStack, text: String) -> Result<(), UserError> {
        let names: Vec<&str> = stack.path().collect();

        match names.as_slice() {
            [.., "user"] => self.finish_user()?,
            [_, "memberships", "membership"] => self.finish_membership(),
            [.., "user", field] | [_, "memberships", "membership", field] => {
                self.fields.insert((*field).to_owned(), text.trim().to_owned());
            }
            _ => {}
        }
        Ok(())
    }
}

/// The content of one MoinMoin user file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoinUserFile {
    /// Crowd id, or a fixed id for generated users.
    pub item_id: String,
    pub name: String,
    pub email: String,
    pub alias: String,
    pub created: Timestamp,
    pub converted_at: Timestamp,
}

impl MoinUserFile {
    pub fn from_crowd(user: &CrowdUser, converted_at: Timestamp) -> Self {
        Self {
            item_id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            alias: user.display_name.clone(),
            created: user.created.map_or(converted_at, Timestamp::from_seconds),
            converted_at,
        }
    }

    /// Conversion timestamp, a dot, the item id: `1406058695.752081.1223`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.converted_at, self.item_id)
    }

    pub fn render(&self) -> String {
        format!(
            "# converted user, date: {date}\n\
             account_creation_date={created}\n\
             account_creation_host=127.0.0.1\n\
             aliasname={alias}\n\
             email={email}\n\
             enc_password={{SSHA}}brokenforconversion/broken==\n\
             last_saved={saved}\n\
             name={name}\n",
            date = self.converted_at.format_utc(),
            created = self.created,
            alias = self.alias,
            email = self.email,
            saved = self.converted_at,
            name = self.name,
        )
    }

    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, UserError> {
        let path = dir.join(self.file_name());
        fs::write(&path, self.render()).map_err(UserError::io(&path))?;
        Ok(path)
    }
}

/// Item id of the generated default user.
pub const DEFAULT_USER_ITEM_ID: &str = "9999999";

/// Write a user file for every active Crowd user into `out_dir`.
pub fn convert_users(
    backup: &CrowdBackup,
    out_dir: &Path,
    converted_at: Timestamp,
) -> Result<Vec<PathBuf>, UserError> {
    let mut written = Vec::new();
    for user in backup.active_users() {
        let path = MoinUserFile::from_crowd(user, converted_at).write_to_dir(out_dir)?;
        info!("Converted: {}", user.name);
        written.push(path);
    }
    Ok(written)
}

/// Write the user that pages without a known editor are attributed to.
pub fn add_default_user(out_dir: &Path, name: &str, converted_at: Timestamp) -> Result<PathBuf, UserError> {
    let user = MoinUserFile {
        item_id: DEFAULT_USER_ITEM_ID.to_owned(),
        name: name.to_owned(),
        email: name.to_owned(),
        alias: format!("User {name}"),
        created: converted_at,
        converted_at,
    };
    let path = user.write_to_dir(out_dir)?;
    info!("Default user created.");
    Ok(path)
}
