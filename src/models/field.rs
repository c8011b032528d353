use serde::{Deserialize, Serialize};

/// One node of a user-defined request schema. `object` and `array` nest
/// further specs to arbitrary depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nested_fields: Vec<FieldSpec>,
    #[serde(default)]
    pub array_item_type: Option<FieldType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Image,
    Video,
    Audio,
    File,
}

impl FieldType {
    /// File-like fields hold an uploaded blob reference rather than a value.
    pub fn is_file_like(self) -> bool {
        matches!(
            self,
            FieldType::Image | FieldType::Video | FieldType::Audio | FieldType::File
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Image => "image",
            FieldType::Video => "video",
            FieldType::Audio => "audio",
            FieldType::File => "file",
        }
    }
}
