//! Data model for boards, pins and users as the site serves them.
//!
//! Only the fields the crawler reads are typed. Everything else the site sends is kept in
//! `extra` so a pin's metadata file is the full upstream record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;

/// Site settings embedded in the root page. Maps image buckets to hosts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "imgHosts", default)]
    pub img_hosts: HashMap<String, String>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nav_link: String,
    #[serde(default)]
    pub col: u32,
}

/// Short user record embedded in boards and returned by user listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub urlname: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default)]
    pub board_count: u64,
    #[serde(default)]
    pub pin_count: u64,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    /// Cursor key in followed-user listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Board {
    pub board_id: u64,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_name: String,
    #[serde(default)]
    pub pin_count: u64,
    #[serde(default)]
    pub follow_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// First page of pins as embedded by the site.
    #[serde(default)]
    pub pins: Vec<Pin>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Board {
    /// Descriptor written to `board.json`: no pins and no owner board list.
    pub fn descriptor(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("pins");
            if let Some(user) = obj.get_mut("user").and_then(Value::as_object_mut) {
                user.remove("boards");
            }
        }
        Ok(value)
    }

    /// Directory name used when dumping boards of a user: `{urlname}-{board_id}`.
    pub fn dir_name(&self, fallback_owner: &str) -> String {
        let owner = self
            .user
            .as_ref()
            .map(|u| u.urlname.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback_owner);
        format!("{}-{}", owner, self.board_id)
    }
}

/// Image descriptor of a pin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinFile {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub key: String,
    /// MIME type, e.g. `image/jpeg`.
    #[serde(rename = "type", default)]
    pub mime: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub frames: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PinFile {
    pub fn kind(&self) -> ImageKind {
        ImageKind::from_mime(&self.mime)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pin {
    pub pin_id: u64,
    #[serde(default)]
    pub board_id: u64,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub file_id: u64,
    pub file: PinFile,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub repin_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub orig_source: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Known image content types. Anything else is [ImageKind::Unknown].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
    Unknown,
}

impl ImageKind {
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => ImageKind::Jpeg,
            "image/png" | "image/apng" => ImageKind::Png,
            "image/gif" => ImageKind::Gif,
            "image/webp" => ImageKind::Webp,
            "image/bmp" => ImageKind::Bmp,
            _ => ImageKind::Unknown,
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
            ImageKind::Bmp => "bmp",
            ImageKind::Unknown => "unknown",
        }
    }
}

/// Outcome of dumping one pin. `size == 0` means the image was already on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpResult {
    pub image_path: PathBuf,
    pub meta_path: Option<PathBuf>,
    pub size: u64,
}

impl DumpResult {
    pub fn is_skipped(&self) -> bool {
        self.size == 0
    }
}

/// Accepts `"640"`, `640` or null.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accepts strings, numbers (rendered) or null (empty).
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    const PIN_JSON: &str = r#"{
        "pin_id": 1702893453,
        "user_id": 17,
        "board_id": 42,
        "file_id": 9,
        "file": {
            "bucket": "hbimg",
            "key": "abc-def",
            "type": "image/jpeg",
            "width": "640",
            "height": 480,
            "frames": "1",
            "theme": "ffffff"
        },
        "media_type": 0,
        "raw_text": "sunset",
        "tags": ["sky"],
        "link": null,
        "via_user_id": 3
    }"#;

    #[test]
    fn pin_keeps_unknown_fields() -> Result<(), Box<dyn Error>> {
        let pin: Pin = serde_json::from_str(PIN_JSON)?;
        assert_eq!(pin.pin_id, 1702893453);
        assert_eq!(pin.file.width, Some(640));
        assert_eq!(pin.file.height, Some(480));
        assert_eq!(pin.file.kind(), ImageKind::Jpeg);
        assert_eq!(pin.extra.get("via_user_id"), Some(&Value::from(3)));
        assert_eq!(pin.file.extra.get("theme"), Some(&Value::from("ffffff")));

        let back = serde_json::to_value(&pin)?;
        assert_eq!(back["media_type"], Value::from(0));
        assert_eq!(back["file"]["type"], Value::from("image/jpeg"));
        Ok(())
    }

    #[test]
    fn mime_table_is_total() {
        assert_eq!(ImageKind::from_mime("image/jpeg").extension(), "jpg");
        assert_eq!(ImageKind::from_mime("image/png").extension(), "png");
        assert_eq!(ImageKind::from_mime("image/apng").extension(), "png");
        assert_eq!(ImageKind::from_mime("image/gif").extension(), "gif");
        assert_eq!(ImageKind::from_mime("image/webp").extension(), "webp");
        assert_eq!(ImageKind::from_mime("image/bmp").extension(), "bmp");
        assert_eq!(ImageKind::from_mime("image/tiff").extension(), "unknown");
        assert_eq!(ImageKind::from_mime("").extension(), "unknown");
    }

    #[test]
    fn descriptor_drops_pins_and_owner_boards() -> Result<(), Box<dyn Error>> {
        let board: Board = serde_json::from_str(
            r#"{
                "board_id": 1,
                "title": "Sky",
                "pin_count": 2,
                "category_id": null,
                "user": {"user_id": 5, "urlname": "alice", "boards": [{"board_id": 2}]},
                "pins": [{"pin_id": 100, "file": {"key": "k", "type": "image/jpeg"}}],
                "seq": 12
            }"#,
        )?;
        let descriptor = board.descriptor()?;
        let obj = descriptor.as_object().expect("descriptor is an object");
        assert!(!obj.contains_key("pins"));
        assert!(!obj["user"].as_object().expect("user").contains_key("boards"));
        assert_eq!(obj["user"]["urlname"], Value::from("alice"));
        assert_eq!(obj["seq"], Value::from(12));
        assert_eq!(obj["category_id"], Value::from(""));
        Ok(())
    }

    #[test]
    fn dir_name_prefers_owner_urlname() {
        let mut board = Board {
            board_id: 7,
            ..Default::default()
        };
        assert_eq!(board.dir_name("bob"), "bob-7");
        board.user = Some(User {
            user_id: 1,
            urlname: "alice".into(),
            ..Default::default()
        });
        assert_eq!(board.dir_name("bob"), "alice-7");
    }

    #[test]
    fn skipped_dump_has_zero_size() {
        let r = DumpResult {
            image_path: PathBuf::from("1.jpg"),
            meta_path: None,
            size: 0,
        };
        assert!(r.is_skipped());
    }
}
