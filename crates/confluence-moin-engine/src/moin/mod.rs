//! Writing pages into a MoinMoin 1.9 `data/pages` directory.
//!
//! Each page becomes a directory named by [`quote_wikiname_fs`] holding a
//! single revision:
//!
//! ```text
//! Space(2f)Page/
//!   current              "00000001"
//!   edit-log             one SAVENEW line
//!   revisions/00000001   prefix + translated markup
//!   attachments/         copied from the export
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{info, warn};
use regex::Regex;

use crate::export::{Export, ExportError, Page};
use crate::timestamp::Timestamp;
use crate::translate::{self, TranslateError};
use crate::users::MoinUsers;

pub const FIRST_REVISION: &str = "00000001";

/// Edit comments longer than this are dropped.
pub const MAX_COMMENT_LENGTH: usize = 201;

pub const DEFAULT_COMMENT: &str = "Converted from Confluence";

/// Notice put above every converted page. `{date}` is replaced by the
/// conversion time.
pub const DEFAULT_PAGE_PREFIX: &str = "{i} This page was converted from Confluence at {date}. \
The formatting may be broken. If you have reviewed this page and the formatting is ok, \
you can remove this information.\n----\n";

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("no body content {content} found for page {page}")]
    MissingBody { page: String, content: String },

    #[error("page {0} already exists in the output folder, will not overwrite anything")]
    PageExists(PathBuf),

    #[error("failed to translate page {page}: {source}")]
    Translate {
        page: String,
        source: TranslateError,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WriteError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn unsafe_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_]+").expect("Invalid unsafe-name regex"))
}

fn taint_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"[\x00-\x1f:/\\<>"*?%|]"#).expect("Invalid taint regex"))
}

/// File system name of a wiki page: every run of characters outside
/// `[A-Za-z0-9_]` becomes its UTF-8 bytes in hex, in parentheses.
///
/// `Main Page/Sub` → `Main(20)Page(2f)Sub`
pub fn quote_wikiname_fs(name: &str) -> String {
    unsafe_regex()
        .replace_all(name, |caps: &regex::Captures<'_>| {
            let hex: String = caps[0].bytes().map(|b| format!("{b:02x}")).collect();
            format!("({hex})")
        })
        .into_owned()
}

/// Make text safe for a single edit-log field.
pub fn clean_input(text: &str, max_len: usize) -> String {
    let length = text.chars().count();
    if length == 0 || length > max_len {
        return String::new();
    }
    text.chars()
        .filter_map(|c| match c {
            '\t' | '\r' | '\n' => Some(' '),
            '\x00'..='\x1f' => None,
            c => Some(c),
        })
        .collect()
}

/// Replace path separators and other unsafe characters in a file name.
pub fn taint_filename(name: &str) -> String {
    taint_regex().replace_all(name, "_").into_owned()
}

/// Pages written and pages skipped by a batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub failed: usize,
}

pub struct PageWriter {
    output_dir: PathBuf,
    export_dir: Option<PathBuf>,
    page_prefix: String,
    comment: String,
}

impl PageWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            export_dir: None,
            page_prefix: expand_prefix(DEFAULT_PAGE_PREFIX, Timestamp::now()),
            comment: DEFAULT_COMMENT.to_owned(),
        }
    }

    /// Directory of the unpacked export; attachments are copied from its
    /// `attachments` folder.
    pub fn with_export_dir(mut self, export_dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(export_dir.into());
        self
    }

    pub fn with_page_prefix(mut self, prefix: &str, converted_at: Timestamp) -> Self {
        self.page_prefix = expand_prefix(prefix, converted_at);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Write one page and its attachments. Returns the page directory.
    pub fn write_page(
        &self,
        export: &Export,
        page_id: &str,
        users: &MoinUsers,
    ) -> Result<PathBuf, WriteError> {
        let page = export
            .page(page_id)
            .ok_or_else(|| ExportError::UnknownPage(page_id.to_owned()))?;
        let content = export
            .body(&page.content_id)
            .ok_or_else(|| WriteError::MissingBody {
                page: page.id.clone(),
                content: page.content_id.clone(),
            })?;
        if export.space(&page.space_id).is_none() {
            return Err(ExportError::MissingSpace {
                page: page.id.clone(),
                space: page.space_id.clone(),
            }
            .into());
        }

        let page_name = quote_wikiname_fs(&export.full_page_name(page)?);
        let page_dir = self.output_dir.join(&page_name);
        if page_dir.exists() {
            return Err(WriteError::PageExists(page_dir));
        }

        let markup = translate::translate(&content.body).map_err(|source| WriteError::Translate {
            page: page_name.clone(),
            source,
        })?;

        let written = self.write_revision(export, page, &page_dir, &page_name, &markup, users);
        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_dir_all(&page_dir) {
                warn!("Could not remove partial page {}: {cleanup}", page_dir.display());
            }
            return Err(err);
        }

        info!("Wrote page {page_name}");
        Ok(page_dir)
    }

    /// Write every page of the given spaces. Pages that fail are logged and
    /// counted, the rest are still written.
    pub fn write_pages_for_spaces<'a>(
        &self,
        export: &Export,
        space_keys: impl IntoIterator<Item = &'a str>,
        users: &MoinUsers,
    ) -> Result<WriteSummary, WriteError> {
        let mut summary = WriteSummary::default();
        for page in export.pages_in_spaces(space_keys)? {
            match self.write_page(export, &page.id, users) {
                Ok(_) => summary.written += 1,
                Err(err) => {
                    warn!("Skipping page {} ({}): {err}", page.id, page.title);
                    summary.failed += 1;
                }
            }
        }
        info!(
            "Wrote {} pages, {} failed",
            summary.written, summary.failed
        );
        Ok(summary)
    }

    fn write_revision(
        &self,
        export: &Export,
        page: &Page,
        page_dir: &Path,
        page_name: &str,
        markup: &str,
        users: &MoinUsers,
    ) -> Result<(), WriteError> {
        let revisions = page_dir.join("revisions");
        fs::create_dir_all(&revisions).map_err(WriteError::io(&revisions))?;
        write_file(&page_dir.join("current"), FIRST_REVISION)?;
        write_file(
            &page_dir.join("edit-log"),
            &self.edit_log_line(page, page_name, users),
        )?;
        write_file(
            &revisions.join(FIRST_REVISION),
            &format!("{}{markup}", self.page_prefix),
        )?;
        self.copy_attachments(export, page, page_dir)
    }

    fn edit_log_line(&self, page: &Page, page_name: &str, users: &MoinUsers) -> String {
        let fields = [
            (page.last_modification_date * 1_000_000).to_string(),
            FIRST_REVISION.to_owned(),
            "SAVENEW".to_owned(),
            page_name.to_owned(),
            "127.0.0.1".to_owned(),
            "127.0.0.1".to_owned(),
            users.id_or_default(page.last_modifier.as_deref()).to_owned(),
            String::new(),
            clean_input(&self.comment, MAX_COMMENT_LENGTH),
        ];
        format!("{}\n", fields.join("\t"))
    }

    fn copy_attachments(&self, export: &Export, page: &Page, page_dir: &Path) -> Result<(), WriteError> {
        let Some(export_dir) = &self.export_dir else {
            return Ok(());
        };
        let target_dir = page_dir.join("attachments");

        for attachment in export.attachments_for(&page.id) {
            let source = export_dir
                .join("attachments")
                .join(&page.id)
                .join(&attachment.id)
                .join(attachment.version.to_string());
            if !source.is_file() {
                warn!(
                    "Attachment {} of page {} not found at {}",
                    attachment.file_name,
                    page.id,
                    source.display()
                );
                continue;
            }
            fs::create_dir_all(&target_dir).map_err(WriteError::io(&target_dir))?;
            let target = target_dir.join(taint_filename(&attachment.file_name));
            fs::copy(&source, &target).map_err(WriteError::io(&target))?;
        }
        Ok(())
    }
}

fn expand_prefix(prefix: &str, converted_at: Timestamp) -> String {
    prefix.replace("{date}", &converted_at.format_utc())
}

fn write_file(path: &Path, content: &str) -> Result<(), WriteError> {
    fs::write(path, content).map_err(WriteError::io(path))
}
