//! Output record shape for enriched posts
//!
//! Translated fields are keyed by the target language, so the record is
//! serialized by hand rather than derived.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::model::EnrichedPost;

/// Field-name slug for a target language
///
/// The language is lowercased and otherwise kept verbatim, so
/// `"Brazilian Portuguese"` yields `title_brazilian portuguese`.
pub fn language_slug(language: &str) -> String {
    language.to_lowercase()
}

/// Key of the translated title, e.g. `title_italian`
pub fn title_key(language: &str) -> String {
    format!("title_{}", language_slug(language))
}

/// Key of the translated poem, e.g. `poem_italian`
pub fn poem_key(language: &str) -> String {
    format!("poem_{}", language_slug(language))
}

impl Serialize for EnrichedPost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        map.serialize_entry("content", &self.post.content)?;
        map.serialize_entry("published_at", &self.post.published_at)?;
        map.serialize_entry("source_tags", &self.post.tags)?;
        map.serialize_entry("uri", &self.post.uri)?;
        map.serialize_entry("cid", &self.post.cid)?;

        if let Some(text) = &self.corrected_text {
            map.serialize_entry("poem_en", text)?;
        }
        if let Some(title) = &self.title {
            map.serialize_entry("title_en", title)?;
        }
        if let Some(translation) = &self.translation {
            if let Some(title) = &translation.title {
                map.serialize_entry(&title_key(&translation.language), title)?;
            }
            if let Some(text) = &translation.text {
                map.serialize_entry(&poem_key(&translation.language), text)?;
            }
        }
        if let Some(tags) = &self.tags {
            map.serialize_entry("tags", tags)?;
        }
        map.serialize_entry("category", &self.category)?;

        map.end()
    }
}
