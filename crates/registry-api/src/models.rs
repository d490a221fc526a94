//! Wire models for the registry backend
//!
//! Field names are camelCase on the wire. Optional fields are omitted from
//! request bodies when unset.

use bytes::Bytes;
use registry_client::{ApiRequest, FilePart};
use serde::{Deserialize, Serialize};

/// Multipart field the backend reads uploaded photos from.
pub const PHOTO_FIELD: &str = "photo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    /// Tutors linked to this pet, when the backend embeds them
    #[serde(default)]
    pub tutors: Vec<Tutor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tutor {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// National identity document number
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub pets: Vec<Pet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub page_count: u32,
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
}

/// Listing parameters. Pages are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub size: u32,
    /// Name filter
    pub name: Option<String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: 10,
            name: None,
        }
    }
}

impl PageQuery {
    pub(crate) fn apply(&self, request: ApiRequest) -> ApiRequest {
        let request = request.query("page", self.page).query("size", self.size);
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => request.query("name", name),
            _ => request,
        }
    }
}

/// Build the multipart part for a photo upload.
///
/// The content type is inferred from the file extension.
pub fn photo_part(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> FilePart {
    let file_name = file_name.into();
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let content_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    };
    FilePart {
        field: PHOTO_FIELD.to_string(),
        file_name,
        content_type: content_type.to_string(),
        bytes: bytes.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_decodes_camel_case() {
        let page: Page<Pet> = serde_json::from_value(json!({
            "page": 1,
            "size": 2,
            "total": 3,
            "pageCount": 2,
            "content": [{"id": 3, "name": "Rex", "photos": [{"id": 9, "contentType": "image/png"}]}]
        }))
        .unwrap();

        assert_eq!(page.page_count, 2);
        assert_eq!(page.content[0].name, "Rex");
        assert_eq!(page.content[0].photos[0].content_type.as_deref(), Some("image/png"));
        assert!(page.content[0].tutors.is_empty());
    }

    #[test]
    fn input_omits_unset_fields() {
        let input = TutorInput {
            name: "Ana".into(),
            phone: Some("65999990000".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"name": "Ana", "phone": "65999990000"})
        );
    }

    #[test]
    fn photo_part_infers_content_type() {
        assert_eq!(photo_part("dog.PNG", vec![1u8]).content_type, "image/png");
        assert_eq!(photo_part("dog.jpeg", vec![1u8]).content_type, "image/jpeg");
        let unknown = photo_part("notes", vec![1u8]);
        assert_eq!(unknown.content_type, "application/octet-stream");
        assert_eq!(unknown.field, PHOTO_FIELD);
    }
}
