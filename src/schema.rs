//! Typed view of a template's form schema.
//!
//! The archive keeps `schema.json` as raw JSON so a draft save writes it back
//! untouched. Editors and the CLI read it through [`TemplateSchema`]:
//!
//! ```text
//! { "formSchema": { "sections": [ { "id", "title", "fields": [ ... ] } ] } }
//! ```
//!
//! Each field's `type` selects a [`FieldKind`]. Types this crate does not know
//! parse as [`FieldKind::Unknown`] and are edited as plain text, so a newer
//! template still opens.
//!
//! ## Widget dispatch
//!
//! | Field type | Widget | Edit mode |
//! |------------|--------|-----------|
//! | `text`, unknown | `Text` | immediate |
//! | `textarea` | `TextArea` | immediate |
//! | `number` (percentage, min+max) | `Slider` | debounced (slider) |
//! | `number` | `Number` | immediate |
//! | `slider` | `Slider` | debounced (slider) |
//! | `color` | `Color` | debounced (color) |
//! | `select` | `Select` | immediate |
//! | `switch`, `boolean` | `Toggle` | immediate |
//! | `image` | `Image` | immediate |
//! | `array` | `Array` | immediate |

use crate::config::EditorConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Rows shown for a textarea that does not declare any.
pub const DEFAULT_TEXTAREA_ROWS: u32 = 3;

const PERCENT_ID_HINTS: [&str; 4] = ["opacity", "percent", "alpha", "transparency"];
const PERCENT_LABEL_HINTS: [&str; 6] = [
    "opacity",
    "percent",
    "transparency",
    "透明度",
    "不透明度",
    "割合",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSchema {
    pub form_schema: FormSchema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Key into the template configuration.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// Type tag of a field plus its type-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<u32>,
    },
    Number(NumericRange),
    Color,
    Select {
        #[serde(default)]
        options: Vec<SelectOption>,
    },
    Switch,
    Boolean,
    Slider(NumericRange),
    Image,
    Array {
        /// Prototype of one array entry; its keys are the sub-fields.
        #[serde(
            default,
            rename = "itemTemplate",
            skip_serializing_if = "Option::is_none"
        )]
        item_template: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

impl FieldKind {
    /// The `type` tag as written in the schema.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Textarea { .. } => "textarea",
            FieldKind::Number(_) => "number",
            FieldKind::Color => "color",
            FieldKind::Select { .. } => "select",
            FieldKind::Switch => "switch",
            FieldKind::Boolean => "boolean",
            FieldKind::Slider(_) => "slider",
            FieldKind::Image => "image",
            FieldKind::Array { .. } => "array",
            FieldKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl NumericRange {
    fn is_bounded(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Input control used to edit a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    Text,
    TextArea { rows: u32 },
    Number,
    Slider,
    Color,
    Select,
    Toggle,
    Image,
    Array,
}

/// How edits from a widget reach the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Every change is applied at once.
    Immediate,
    /// Changes are held in an overlay until the input is quiet for this long.
    Debounced(Duration),
}

impl Widget {
    pub fn edit_mode(self, editor: &EditorConfig) -> EditMode {
        match self {
            Widget::Slider => EditMode::Debounced(editor.slider_debounce()),
            Widget::Color => EditMode::Debounced(editor.color_debounce()),
            _ => EditMode::Immediate,
        }
    }
}

impl Field {
    /// Whether a numeric field reads as a percentage (opacity, ratio, ...).
    pub fn is_percentage(&self) -> bool {
        let id = self.id.to_lowercase();
        if PERCENT_ID_HINTS.iter().any(|hint| id.contains(hint)) {
            return true;
        }
        if let Some(label) = &self.label {
            let label = label.to_lowercase();
            if PERCENT_LABEL_HINTS.iter().any(|hint| label.contains(hint)) {
                return true;
            }
        }
        match &self.kind {
            FieldKind::Number(range) | FieldKind::Slider(range) => {
                range.is_bounded() && range.max.is_some_and(|max| max <= 100.0)
            }
            _ => false,
        }
    }

    pub fn widget(&self) -> Widget {
        match &self.kind {
            FieldKind::Text | FieldKind::Unknown => Widget::Text,
            FieldKind::Textarea { rows } => Widget::TextArea {
                rows: rows.unwrap_or(DEFAULT_TEXTAREA_ROWS),
            },
            FieldKind::Number(range) if range.is_bounded() && self.is_percentage() => {
                Widget::Slider
            }
            FieldKind::Number(_) => Widget::Number,
            FieldKind::Slider(_) => Widget::Slider,
            FieldKind::Color => Widget::Color,
            FieldKind::Select { .. } => Widget::Select,
            FieldKind::Switch | FieldKind::Boolean => Widget::Toggle,
            FieldKind::Image => Widget::Image,
            FieldKind::Array { .. } => Widget::Array,
        }
    }

    /// A fresh entry for an array field: a copy of `itemTemplate`, or `{}`.
    pub fn new_item(&self) -> Value {
        match &self.kind {
            FieldKind::Array {
                item_template: Some(template),
            } => template.clone(),
            _ => Value::Object(Default::default()),
        }
    }

    /// Label shown to users, falling back to the id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

impl TemplateSchema {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn sections(&self) -> &[Section] {
        &self.form_schema.sections
    }

    /// All fields, in section order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.form_schema
            .sections
            .iter()
            .flat_map(|section| section.fields.iter())
    }

    /// Look a field up by id across every section.
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields().find(|field| field.id == id)
    }
}
