use crate::core::error::{Error, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Free-form attributes carried alongside each chunk and vector record
pub type Attributes = Map<String, Value>;

/// Paragraphs at or below this many characters are dropped
const MIN_PARAGRAPH_CHARS: usize = 10;

/// A unit of extracted text plus its structured attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Always contains `source` and `type`
    pub attributes: Attributes,
}

/// How a file is interpreted, chosen from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Json,
    Text,
}

impl FileKind {
    /// Anything that is not `.csv` or `.json` is read as plain text
    pub fn from_name(file_name: &str) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match ext.as_deref() {
            Some("csv") => FileKind::Csv,
            Some("json") => FileKind::Json,
            _ => FileKind::Text,
        }
    }

    /// Value stored in the `type` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Csv => "csv",
            FileKind::Json => "json",
            FileKind::Text => "text",
        }
    }
}

/// Parse raw file bytes into chunks.
///
/// Fails with `UnsupportedOrEmptyContent` when nothing survives extraction, and
/// with `Csv` or `Json` when the file is malformed.
pub fn extract(bytes: &[u8], file_name: &str) -> Result<Vec<Chunk>> {
    let decoded = String::from_utf8_lossy(bytes);
    let content = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);

    let kind = FileKind::from_name(file_name);
    let chunks = match kind {
        FileKind::Csv => extract_csv(content, file_name)?,
        FileKind::Json => extract_json(content, file_name)?,
        FileKind::Text => extract_text(content, file_name),
    };

    debug!(file = file_name, kind = kind.as_str(), chunks = chunks.len(), "extracted chunks");

    if chunks.is_empty() {
        return Err(Error::UnsupportedOrEmptyContent(file_name.to_string()));
    }

    Ok(chunks)
}

/// One chunk per row, fields named by the header row
fn extract_csv(content: &str, file_name: &str) -> Result<Vec<Chunk>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let mut chunks = Vec::new();

    for record in reader.records() {
        let record = record?;

        let mut attributes = Attributes::new();
        for (field, value) in headers.iter().zip(record.iter()) {
            attributes.insert(field.to_string(), Value::String(value.to_string()));
        }

        // Built from the map so a repeated header keeps its last value once
        let text = attributes
            .iter()
            .map(|(field, value)| format!("{}: {}", field, value.as_str().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(", ");

        chunks.push(Chunk {
            text,
            attributes: tag(attributes, file_name, FileKind::Csv),
        });
    }

    Ok(chunks)
}

fn extract_json(content: &str, file_name: &str) -> Result<Vec<Chunk>> {
    let data: Value = serde_json::from_str(content)?;

    let entries = match menu_categories(&data) {
        Some(categories) => walk_menu(categories),
        None => flat_entries(data),
    };

    Ok(entries
        .into_iter()
        .filter(|(text, _)| !text.trim().is_empty())
        .map(|(text, attributes)| Chunk {
            text,
            attributes: tag(attributes, file_name, FileKind::Json),
        })
        .collect())
}

/// `{"restaurant_menu": {"categories": [...]}}`
fn menu_categories(data: &Value) -> Option<&Vec<Value>> {
    data.get("restaurant_menu")?.get("categories")?.as_array()
}

/// Depth-first: a category's own items, then each subcategory's items
fn walk_menu(categories: &[Value]) -> Vec<(String, Attributes)> {
    let mut entries = Vec::new();

    for category in categories {
        let category_name = category.get("category_name");

        if let Some(items) = category.get("items").and_then(Value::as_array) {
            for item in items {
                entries.push(menu_item(item, category_name, None));
            }
        }

        if let Some(subcategories) = category.get("subcategories").and_then(Value::as_array) {
            for sub in subcategories {
                let sub_name = sub.get("subcategory_name");
                if let Some(items) = sub.get("items").and_then(Value::as_array) {
                    for item in items {
                        entries.push(menu_item(item, category_name, Some(sub_name)));
                    }
                }
            }
        }
    }

    entries
}

fn menu_item(
    item: &Value,
    category: Option<&Value>,
    subcategory: Option<Option<&Value>>,
) -> (String, Attributes) {
    let mut path = display_value(category);
    if let Some(sub) = subcategory {
        path.push_str(" > ");
        path.push_str(&display_value(sub));
    }

    let text = format!(
        "{} - {} - {} - {}",
        display_value(item.get("name")),
        path,
        display_value(item.get("description")),
        display_value(item.get("price")),
    );

    let mut attributes = item.as_object().cloned().unwrap_or_default();
    if let Some(category) = category {
        attributes.insert("category".to_string(), category.clone());
    }
    if let Some(Some(sub)) = subcategory {
        attributes.insert("subcategory".to_string(), sub.clone());
    }

    (text, attributes)
}

/// Each element of a top-level array (or the lone top-level value)
fn flat_entries(data: Value) -> Vec<(String, Attributes)> {
    let elements = match data {
        Value::Array(elements) => elements,
        other => vec![other],
    };

    elements
        .into_iter()
        .map(|element| match element {
            Value::String(text) => (text, Attributes::new()),
            Value::Object(fields) => {
                let text = fields
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect::<Vec<_>>()
                    .join(", ");
                (text, fields)
            }
            other => (other.to_string(), Attributes::new()),
        })
        .collect()
}

/// Paragraphs separated by blank lines
fn extract_text(content: &str, file_name: &str) -> Vec<Chunk> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|para| para.chars().count() > MIN_PARAGRAPH_CHARS)
        .map(|para| Chunk {
            text: para.to_string(),
            attributes: tag(Attributes::new(), file_name, FileKind::Text),
        })
        .collect()
}

fn tag(mut attributes: Attributes, file_name: &str, kind: FileKind) -> Attributes {
    attributes.insert("source".to_string(), Value::String(file_name.to_string()));
    attributes.insert("type".to_string(), Value::String(kind.as_str().to_string()));
    attributes
}

/// Render a JSON value for inline text; strings lose their quotes, absent values are empty
fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
