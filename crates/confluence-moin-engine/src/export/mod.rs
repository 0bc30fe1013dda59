//! The Confluence XML export (`entities.xml`).
//!
//! Only the objects needed to write current pages are kept: spaces, pages,
//! their body contents and attachments. Everything is keyed by the
//! Confluence object id.

mod reader;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use log::info;

use crate::element::{self, ParseError};
use crate::timestamp::TimestampError;
use reader::ExportReader;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("export is not well-formed: {0}")]
    Malformed(#[from] ParseError),

    #[error("{class} {id} has no {property} property")]
    MissingProperty {
        class: String,
        id: String,
        property: String,
    },

    #[error("page {page} has no body content")]
    MissingBody { page: String },

    #[error("object {id} has a bad date: {source}")]
    Timestamp { id: String, source: TimestampError },

    #[error("no new key configured for space '{0}'")]
    UnmappedSpace(String),

    #[error("no space found for key '{0}'")]
    UnknownSpace(String),

    #[error("no space {space} found for page {page}")]
    MissingSpace { page: String, space: String },

    #[error("no parent page {parent} found for page {page}")]
    MissingParent { page: String, parent: String },

    #[error("parent chain of page {0} loops")]
    ParentCycle(String),

    #[error("no page found with id {0}")]
    UnknownPage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub id: String,
    pub name: Option<String>,
    /// Lowercased on read.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    pub space_id: String,
    /// `None` for the top page of a space.
    pub parent_id: Option<String>,
    pub title: String,
    pub content_id: String,
    pub last_modifier: Option<String>,
    /// Unix seconds.
    pub last_modification_date: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub file_name: String,
    pub page_id: Option<String>,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyContent {
    pub id: String,
    /// Storage-format XHTML, trimmed.
    pub body: String,
}

#[derive(Debug, Default)]
pub struct Export {
    spaces: BTreeMap<String, Space>,
    pages: BTreeMap<String, Page>,
    attachments: BTreeMap<String, Attachment>,
    bodies: BTreeMap<String, BodyContent>,
}

impl Export {
    /// Read an `entities.xml` file.
    pub fn load_from_path(path: &Path) -> Result<Self, ExportError> {
        let xml = std::fs::read_to_string(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let export = Self::from_xml(&xml)?;
        info!(
            "Read {} spaces, {} pages, {} attachments from {}",
            export.spaces.len(),
            export.pages.len(),
            export.attachments.len(),
            path.display()
        );
        Ok(export)
    }

    pub fn from_xml(xml: &str) -> Result<Self, ExportError> {
        let mut reader = ExportReader::default();
        element::parse(xml, &mut reader)?;
        Ok(reader.into_export())
    }

    pub fn spaces(&self) -> impl Iterator<Item = &Space> {
        self.spaces.values()
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn space(&self, id: &str) -> Option<&Space> {
        self.spaces.get(id)
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.get(id)
    }

    pub fn body(&self, id: &str) -> Option<&BodyContent> {
        self.bodies.get(id)
    }

    /// Give every space its new key. All spaces must be mapped; keys are
    /// matched case-insensitively.
    pub fn rename_spaces(&mut self, new_keys: &BTreeMap<String, String>) -> Result<(), ExportError> {
        let lookup: BTreeMap<String, &String> = new_keys
            .iter()
            .map(|(old, new)| (old.to_lowercase(), new))
            .collect();

        if let Some(space) = self.spaces.values().find(|s| !lookup.contains_key(&s.key)) {
            return Err(ExportError::UnmappedSpace(space.key.clone()));
        }
        for space in self.spaces.values_mut() {
            if let Some(new) = lookup.get(&space.key) {
                space.key = (*new).clone();
            }
        }
        Ok(())
    }

    /// Top pages titled `Home` are renamed after their space key, so a
    /// space's pages end up below a page named like the space.
    pub fn rename_home_pages(&mut self) -> Result<(), ExportError> {
        for page in self.pages.values_mut() {
            if page.parent_id.is_some() || page.title != "Home" {
                continue;
            }
            let space = self
                .spaces
                .get(&page.space_id)
                .ok_or_else(|| ExportError::MissingSpace {
                    page: page.id.clone(),
                    space: page.space_id.clone(),
                })?;
            page.title = space.key.clone();
        }
        Ok(())
    }

    pub fn space_by_key(&self, key: &str) -> Result<&Space, ExportError> {
        self.spaces
            .values()
            .find(|space| space.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| ExportError::UnknownSpace(key.to_owned()))
    }

    /// Titles from the top page down to `page`, joined with `/`.
    pub fn full_page_name(&self, page: &Page) -> Result<String, ExportError> {
        let mut titles = vec![page.title.as_str()];
        let mut seen = HashSet::from([page.id.as_str()]);
        let mut current = page;

        while let Some(parent_id) = &current.parent_id {
            let parent = self
                .pages
                .get(parent_id)
                .ok_or_else(|| ExportError::MissingParent {
                    page: current.id.clone(),
                    parent: parent_id.clone(),
                })?;
            if !seen.insert(parent.id.as_str()) {
                return Err(ExportError::ParentCycle(page.id.clone()));
            }
            titles.push(parent.title.as_str());
            current = parent;
        }

        titles.reverse();
        Ok(titles.join("/"))
    }

    /// Pages belonging to any of the spaces with the given keys.
    pub fn pages_in_spaces<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<&Page>, ExportError> {
        let space_ids = keys
            .into_iter()
            .map(|key| self.space_by_key(key).map(|space| space.id.as_str()))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(self
            .pages
            .values()
            .filter(|page| space_ids.contains(page.space_id.as_str()))
            .collect())
    }

    pub fn attachments_for<'a>(&'a self, page_id: &'a str) -> impl Iterator<Item = &'a Attachment> {
        self.attachments
            .values()
            .filter(move |attachment| attachment.page_id.as_deref() == Some(page_id))
    }
}
