//! Qualified Dublin Core style metadata with dirty tracking

use serde::{Deserialize, Serialize};
use std::fmt;

/// `schema.element[.qualifier]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataField {
    pub schema: String,
    pub element: String,
    pub qualifier: Option<String>,
}

impl MetadataField {
    pub fn new(schema: &str, element: &str, qualifier: Option<&str>) -> Self {
        Self {
            schema: schema.to_string(),
            element: element.to_string(),
            qualifier: qualifier.map(str::to_string),
        }
    }

    pub fn dc(element: &str, qualifier: Option<&str>) -> Self {
        Self::new("dc", element, qualifier)
    }

    pub fn title() -> Self {
        Self::dc("title", None)
    }

    pub fn provenance() -> Self {
        Self::dc("description", Some("provenance"))
    }

    pub fn license() -> Self {
        Self::dc("rights", Some("license"))
    }

    /// Map the short field names used by container forms onto real fields
    pub fn from_legacy(name: &str) -> Option<Self> {
        let field = match name {
            "name" => Self::title(),
            "introductory_text" => Self::dc("description", None),
            "short_description" => Self::dc("description", Some("abstract")),
            "side_bar_text" => Self::dc("description", Some("tableofcontents")),
            "copyright_text" => Self::dc("rights", None),
            "provenance_description" => Self::dc("provenance", None),
            "license" => Self::license(),
            _ => return None,
        };
        Some(field)
    }

    /// Accepts either a legacy short name or a dotted `schema.element[.qualifier]`
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(field) = Self::from_legacy(raw) {
            return Some(field);
        }
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return None;
        }
        match parts.as_slice() {
            [schema, element] => Some(Self::new(schema, element, None)),
            [schema, element, qualifier] => Some(Self::new(schema, element, Some(qualifier))),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}.{}", self.schema, self.element, q),
            None => write!(f, "{}.{}", self.schema, self.element),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub field: MetadataField,
    pub language: Option<String>,
    pub value: String,
    /// Position among the values of the same field
    pub place: u32,
}

/// Ordered metadata values plus the change details reported on update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    values: Vec<MetadataValue>,
    modified: bool,
    details: Vec<String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_value(&self, field: &MetadataField) -> Option<&str> {
        self.values
            .iter()
            .find(|v| &v.field == field)
            .map(|v| v.value.as_str())
    }

    pub fn values(&self, field: &MetadataField) -> Vec<&MetadataValue> {
        self.values.iter().filter(|v| &v.field == field).collect()
    }

    pub fn all(&self) -> &[MetadataValue] {
        &self.values
    }

    /// Append a value after any existing ones for the field
    pub fn add(&mut self, field: &MetadataField, language: Option<&str>, value: &str) {
        let place = self.values.iter().filter(|v| &v.field == field).count() as u32;
        self.values.push(MetadataValue {
            field: field.clone(),
            language: language.map(str::to_string),
            value: value.to_string(),
            place,
        });
        self.touch(field);
    }

    /// Replace every value of the field with a single one
    pub fn set_single(&mut self, field: &MetadataField, language: Option<&str>, value: &str) {
        self.values.retain(|v| &v.field != field);
        self.add(field, language, value);
    }

    /// Remove all values of the field, returning how many were dropped
    pub fn clear(&mut self, field: &MetadataField) -> usize {
        let before = self.values.len();
        self.values.retain(|v| &v.field != field);
        let removed = before - self.values.len();
        if removed > 0 {
            self.touch(field);
        }
        removed
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Comma separated list of the fields changed since the last update
    pub fn details(&self) -> Option<String> {
        if self.details.is_empty() {
            None
        } else {
            Some(self.details.join(","))
        }
    }

    pub fn clear_modified(&mut self) {
        self.modified = false;
        self.details.clear();
    }

    fn touch(&mut self, field: &MetadataField) {
        self.modified = true;
        let name = field.to_string();
        if !self.details.contains(&name) {
            self.details.push(name);
        }
    }
}
