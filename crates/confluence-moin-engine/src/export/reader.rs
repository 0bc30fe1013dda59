use std::collections::HashMap;

use log::debug;

use super::{Attachment, BodyContent, Export, ExportError, Page, Space};
use crate::element::{Attributes, ElementHandler, ElementStack};
use crate::timestamp::confluence_date_to_seconds;

#[derive(Debug, Default)]
struct Property {
    text: String,
    reference: Option<String>,
}

/// One `<object>` element being read.
#[derive(Debug, Default)]
struct ObjectBuilder {
    class: String,
    id: Option<String>,
    properties: HashMap<String, Property>,
    body_contents: Vec<String>,
}

impl ObjectBuilder {
    fn text(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .map(|p| p.text.trim())
            .filter(|text| !text.is_empty())
    }

    fn reference(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|p| p.reference.as_deref())
    }

    fn require_text(&self, id: &str, name: &str) -> Result<&str, ExportError> {
        self.text(name).ok_or_else(|| self.missing(id, name))
    }

    fn missing(&self, id: &str, property: &str) -> ExportError {
        ExportError::MissingProperty {
            class: self.class.clone(),
            id: id.to_owned(),
            property: property.to_owned(),
        }
    }
}

/// Builds an [`Export`] from the `object` elements of `entities.xml`.
#[derive(Debug, Default)]
pub(super) struct ExportReader {
    export: Export,
    current: Option<ObjectBuilder>,
}

impl ExportReader {
    pub(super) fn into_export(self) -> Export {
        self.export
    }

    fn finish_object(&mut self) -> Result<(), ExportError> {
        let Some(object) = self.current.take() else {
            return Ok(());
        };
        let Some(id) = object.id.clone() else {
            debug!("skipping {} object without id", object.class);
            return Ok(());
        };

        match object.class.as_str() {
            "Space" => {
                let key = object.require_text(&id, "key")?.to_lowercase();
                let space = Space {
                    id: id.clone(),
                    name: object.text("name").map(str::to_owned),
                    key,
                };
                self.export.spaces.insert(id, space);
            }
            "Page" => {
                if let Some(page) = read_page(&object, &id)? {
                    self.export.pages.insert(id, page);
                }
            }
            "Attachment" => {
                let attachment = Attachment {
                    id: id.clone(),
                    file_name: object.require_text(&id, "fileName")?.to_owned(),
                    page_id: object
                        .reference("content")
                        .or_else(|| object.reference("containerContent"))
                        .map(str::to_owned),
                    version: object
                        .text("attachmentVersion")
                        .or_else(|| object.text("version"))
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(1),
                };
                self.export.attachments.insert(id, attachment);
            }
            "BodyContent" => {
                let body = BodyContent {
                    id: id.clone(),
                    body: object.text("body").unwrap_or_default().to_owned(),
                };
                self.export.bodies.insert(id, body);
            }
            _ => {}
        }
        Ok(())
    }
}

fn read_page(object: &ObjectBuilder, id: &str) -> Result<Option<Page>, ExportError> {
    let Some(space_id) = object.reference("space") else {
        debug!("skipping page {id} without space, an old revision");
        return Ok(None);
    };
    if object.text("contentStatus") != Some("current") {
        debug!("skipping page {id} that is not current");
        return Ok(None);
    }

    let content_id = object
        .body_contents
        .first()
        .cloned()
        .ok_or_else(|| ExportError::MissingBody { page: id.to_owned() })?;
    let date = object.require_text(id, "lastModificationDate")?;
    let last_modification_date =
        confluence_date_to_seconds(date).map_err(|source| ExportError::Timestamp {
            id: id.to_owned(),
            source,
        })?;

    Ok(Some(Page {
        id: id.to_owned(),
        space_id: space_id.to_owned(),
        parent_id: object.reference("parent").map(str::to_owned),
        title: object.require_text(id, "title")?.to_owned(),
        content_id,
        last_modifier: object.text("lastModifierName").map(str::to_owned),
        last_modification_date,
    }))
}

impl ElementHandler for ExportReader {
    type Error = ExportError;

    fn open_element(&mut self, name: &str, attributes: &Attributes) {
        if name == "object" {
            self.current = Some(ObjectBuilder {
                class: attributes.get("class").unwrap_or_default().to_owned(),
                ..ObjectBuilder::default()
            });
        }
    }

    fn handle_element(&mut self, stack: &mut ElementStack, text: String) -> Result<(), ExportError> {
        let names: Vec<&str> = stack.path().collect();

        if let [.., "object"] = names.as_slice() {
            return self.finish_object();
        }
        let Some(object) = self.current.as_mut() else {
            return Ok(());
        };
        let attribute = |generations: usize, name: &str| {
            stack
                .ancestor(generations)
                .and_then(|frame| frame.attributes().get(name))
        };

        match names.as_slice() {
            [.., "object", "id"] => {
                object.id = Some(text.trim().to_owned());
            }
            [.., "object", "property"] => {
                if let Some(name) = attribute(0, "name") {
                    object.properties.entry(name.to_owned()).or_default().text = text;
                }
            }
            [.., "object", "property", "id"] => {
                if let Some(name) = attribute(1, "name") {
                    object.properties.entry(name.to_owned()).or_default().reference =
                        Some(text.trim().to_owned());
                }
            }
            [.., "object", "collection", "element", "id"] => {
                if attribute(2, "name") == Some("bodyContents")
                    && attribute(1, "class") == Some("BodyContent")
                {
                    object.body_contents.push(text.trim().to_owned());
                }
            }
            _ => {}
        }
        Ok(())
    }
}
