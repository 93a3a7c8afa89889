//! Modèle du document de catalogue et invariants d'édition
//!
//! Le document est un arbre `categories[] -> subcategories[] -> videos[]`.
//! Une catégorie porte soit directement ses vidéos ([`CategoryContent::Flat`]),
//! soit des sous-catégories ([`CategoryContent::Nested`]).
//!
//! Les champs inconnus sont conservés à chaque niveau pour que la réécriture
//! du document ne perde rien.
//!
//! Deux règles encadrent les identifiants de vidéo :
//!
//! - un identifiant généré vaut `{sous-catégorie ou catégorie}_{n}` où `n` est
//!   le plus grand suffixe numérique parmi les vidéos sœurs, plus un ;
//! - l'unicité est vérifiée sur l'arbre entier, pas seulement parmi les sœurs.

use crate::error::{GistError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static NUMERIC_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\d+)$").expect("numeric suffix regex is valid"));

/// Vidéo référencée par le catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    /// Identifiant interne ; vide quand il reste à générer
    #[serde(default)]
    pub id: String,

    /// Identifiant YouTube
    #[serde(rename = "youtubeId", default)]
    pub external_id: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VideoEntry {
    /// Nouvelle vidéo sans identifiant interne
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            external_id: external_id.into(),
            extra: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Ajoute un champ libre (titre éditorial, tags...)
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Fusion superficielle : chaque champ du patch remplace celui de l'entrée
    pub fn merged(&self, patch: &Map<String, Value>) -> Result<Self> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut value {
            for (name, field) in patch {
                fields.insert(name.clone(), field.clone());
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub videos: Vec<VideoEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Subcategory {
    pub fn new(id: impl Into<String>, videos: Vec<VideoEntry>) -> Self {
        Self {
            id: id.into(),
            videos,
            extra: Map::new(),
        }
    }
}

/// Contenu d'une catégorie
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryContent {
    Flat(Vec<VideoEntry>),
    Nested(Vec<Subcategory>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCategory", into = "RawCategory")]
pub struct Category {
    pub id: String,
    pub content: CategoryContent,
    pub extra: Map<String, Value>,
}

/// Forme JSON d'une catégorie
#[derive(Serialize, Deserialize)]
struct RawCategory {
    #[serde(default)]
    id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    subcategories: Option<Vec<Subcategory>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    videos: Option<Vec<VideoEntry>>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RawCategory> for Category {
    type Error = serde_json::Error;

    fn try_from(raw: RawCategory) -> std::result::Result<Self, Self::Error> {
        let mut extra = raw.extra;
        let content = match (raw.subcategories, raw.videos) {
            (Some(subcategories), videos) => {
                // Des vidéos posées à côté des sous-catégories sont conservées telles quelles
                if let Some(videos) = videos {
                    extra.insert("videos".to_string(), serde_json::to_value(videos)?);
                }
                CategoryContent::Nested(subcategories)
            }
            (None, videos) => CategoryContent::Flat(videos.unwrap_or_default()),
        };
        Ok(Self {
            id: raw.id,
            content,
            extra,
        })
    }
}

impl From<Category> for RawCategory {
    fn from(category: Category) -> Self {
        let (subcategories, videos) = match category.content {
            CategoryContent::Flat(videos) => (None, Some(videos)),
            CategoryContent::Nested(subcategories) => (Some(subcategories), None),
        };
        Self {
            id: category.id,
            subcategories,
            videos,
            extra: category.extra,
        }
    }
}

impl Category {
    pub fn flat(id: impl Into<String>, videos: Vec<VideoEntry>) -> Self {
        Self {
            id: id.into(),
            content: CategoryContent::Flat(videos),
            extra: Map::new(),
        }
    }

    pub fn nested(id: impl Into<String>, subcategories: Vec<Subcategory>) -> Self {
        Self {
            id: id.into(),
            content: CategoryContent::Nested(subcategories),
            extra: Map::new(),
        }
    }

    /// Vidéos de la catégorie, ou de la sous-catégorie pour une catégorie imbriquée
    ///
    /// L'identifiant de sous-catégorie est ignoré pour une catégorie plate.
    fn videos(&self, subcategory_id: Option<&str>) -> Result<&Vec<VideoEntry>> {
        match &self.content {
            CategoryContent::Flat(videos) => Ok(videos),
            CategoryContent::Nested(subcategories) => subcategories
                .iter()
                .find(|sub| Some(sub.id.as_str()) == subcategory_id)
                .map(|sub| &sub.videos)
                .ok_or_else(|| subcategory_not_found(subcategory_id)),
        }
    }

    fn videos_mut(&mut self, subcategory_id: Option<&str>) -> Result<&mut Vec<VideoEntry>> {
        match &mut self.content {
            CategoryContent::Flat(videos) => Ok(videos),
            CategoryContent::Nested(subcategories) => subcategories
                .iter_mut()
                .find(|sub| Some(sub.id.as_str()) == subcategory_id)
                .map(|sub| &mut sub.videos)
                .ok_or_else(|| subcategory_not_found(subcategory_id)),
        }
    }

    /// Toutes les vidéos de la catégorie, sous-catégories comprises
    pub fn all_videos(&self) -> Box<dyn Iterator<Item = &VideoEntry> + '_> {
        match &self.content {
            CategoryContent::Flat(videos) => Box::new(videos.iter()),
            CategoryContent::Nested(subcategories) => {
                Box::new(subcategories.iter().flat_map(|sub| sub.videos.iter()))
            }
        }
    }
}

fn subcategory_not_found(subcategory_id: Option<&str>) -> GistError {
    GistError::NotFound(format!(
        "Subcategory {} not found",
        subcategory_id.unwrap_or("<none>")
    ))
}

/// Plus grand suffixe `_<n>` parmi `videos`, plus un
fn next_suffix(videos: &[VideoEntry]) -> u64 {
    videos
        .iter()
        .filter_map(|video| NUMERIC_SUFFIX.captures(&video.id))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .filter(|n| *n > 0)
        .max()
        .map_or(1, |max| max + 1)
}

/// Document de catalogue complet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub categories: Vec<Category>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteDocument {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            extra: Map::new(),
        }
    }

    /// Parse un document en vérifiant la présence de la collection `categories`
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.get("categories").is_some_and(Value::is_array) {
            return Err(GistError::Validation(
                "Invalid config format: missing categories collection".into(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Sérialisation indentée utilisée pour l'écriture
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    fn find_category(&self, category_id: &str) -> Result<&Category> {
        self.category(category_id)
            .ok_or_else(|| GistError::NotFound(format!("Category {} not found", category_id)))
    }

    fn find_category_mut(&mut self, category_id: &str) -> Result<&mut Category> {
        self.categories
            .iter_mut()
            .find(|c| c.id == category_id)
            .ok_or_else(|| GistError::NotFound(format!("Category {} not found", category_id)))
    }

    /// Vidéos d'un groupe de sœurs
    pub fn videos(&self, category_id: &str, subcategory_id: Option<&str>) -> Result<&[VideoEntry]> {
        self.find_category(category_id)?
            .videos(subcategory_id)
            .map(Vec::as_slice)
    }

    pub fn video_count(&self) -> usize {
        self.categories.iter().map(|c| c.all_videos().count()).sum()
    }

    /// Prochain identifiant du groupe de sœurs
    ///
    /// Le préfixe est l'identifiant de sous-catégorie s'il est fourni, sinon
    /// celui de la catégorie. Un groupe introuvable donne `{préfixe}_1`.
    pub fn next_video_id(&self, category_id: &str, subcategory_id: Option<&str>) -> String {
        let prefix = subcategory_id.unwrap_or(category_id);
        let next = self
            .videos(category_id, subcategory_id)
            .map(next_suffix)
            .unwrap_or(1);
        format!("{}_{}", prefix, next)
    }

    /// `true` si une vidéo de l'arbre porte déjà `video_id`
    pub fn contains_video_id(&self, video_id: &str) -> bool {
        self.categories
            .iter()
            .flat_map(|c| c.all_videos())
            .any(|v| v.id == video_id)
    }

    /// Ajoute une vidéo et renvoie son identifiant
    ///
    /// L'identifiant est généré quand l'entrée n'en porte pas. Aucune
    /// modification n'est faite en cas d'erreur.
    pub fn insert_video(
        &mut self,
        category_id: &str,
        subcategory_id: Option<&str>,
        mut entry: VideoEntry,
    ) -> Result<String> {
        self.videos(category_id, subcategory_id)?;

        let generated = entry.id.trim().is_empty();
        if generated {
            entry.id = self.next_video_id(category_id, subcategory_id);
        }

        if self.contains_video_id(&entry.id) {
            let message = if generated {
                format!("Generated video ID \"{}\" is not unique", entry.id)
            } else {
                format!("Video ID \"{}\" already exists", entry.id)
            };
            return Err(GistError::Validation(message));
        }

        let id = entry.id.clone();
        self.find_category_mut(category_id)?
            .videos_mut(subcategory_id)?
            .push(entry);
        Ok(id)
    }

    /// Fusionne `patch` dans la vidéo `video_id` du groupe indiqué
    pub fn update_video(
        &mut self,
        category_id: &str,
        subcategory_id: Option<&str>,
        video_id: &str,
        patch: &Map<String, Value>,
    ) -> Result<()> {
        let videos = self.videos(category_id, subcategory_id)?;
        let index = videos
            .iter()
            .position(|v| v.id == video_id)
            .ok_or_else(|| GistError::NotFound(format!("Video {} not found", video_id)))?;

        let updated = videos[index].merged(patch)?;
        if updated.id.trim().is_empty() {
            return Err(GistError::Validation("Video ID cannot be empty".into()));
        }
        if updated.id != video_id && self.contains_video_id(&updated.id) {
            return Err(GistError::Validation(format!(
                "Video ID \"{}\" already exists",
                updated.id
            )));
        }

        self.find_category_mut(category_id)?
            .videos_mut(subcategory_id)?[index] = updated;
        Ok(())
    }

    /// Retire la vidéo `video_id` du groupe indiqué
    pub fn remove_video(
        &mut self,
        category_id: &str,
        subcategory_id: Option<&str>,
        video_id: &str,
    ) -> Result<VideoEntry> {
        let videos = self
            .find_category_mut(category_id)?
            .videos_mut(subcategory_id)?;
        let index = videos
            .iter()
            .position(|v| v.id == video_id)
            .ok_or_else(|| GistError::NotFound(format!("Video {} not found", video_id)))?;
        Ok(videos.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video(id: &str) -> VideoEntry {
        VideoEntry::new(format!("yt-{}", id)).with_id(id)
    }

    fn document() -> RemoteDocument {
        RemoteDocument::new(vec![
            Category::nested(
                "x",
                vec![
                    Subcategory::new("y", vec![video("y_1"), video("y_3")]),
                    Subcategory::new("z", vec![]),
                ],
            ),
            Category::flat("music", vec![video("music_2"), video("intro")]),
            Category::nested("other", vec![Subcategory::new("w", vec![video("y_4")])]),
        ])
    }

    #[test]
    fn test_next_id_is_max_suffix_plus_one() {
        let doc = document();
        assert_eq!(doc.next_video_id("x", Some("y")), "y_4");
        assert_eq!(doc.next_video_id("x", Some("z")), "z_1");
        assert_eq!(doc.next_video_id("music", None), "music_3");
        assert_eq!(doc.next_video_id("missing", None), "missing_1");
    }

    #[test]
    fn test_flat_category_uses_subcategory_prefix_when_given() {
        let doc = document();
        assert_eq!(doc.next_video_id("music", Some("live")), "live_3");
    }

    #[test]
    fn test_generated_id_collision_is_checked_tree_wide() {
        let mut doc = document();
        // y_4 est unique dans x/y mais existe dans other/w
        let err = doc
            .insert_video("x", Some("y"), VideoEntry::new("new"))
            .unwrap_err();
        assert!(matches!(err, GistError::Validation(ref m) if m.contains("not unique")));
        assert_eq!(doc.videos("x", Some("y")).unwrap().len(), 2);
    }

    #[test]
    fn test_caller_supplied_duplicate_is_rejected() {
        let mut doc = document();
        let err = doc
            .insert_video("x", Some("z"), VideoEntry::new("new").with_id("intro"))
            .unwrap_err();
        assert!(matches!(err, GistError::Validation(ref m) if m.contains("already exists")));
    }

    #[test]
    fn test_insert_appends_to_sibling_group() {
        let mut doc = document();
        let id = doc
            .insert_video("x", Some("z"), VideoEntry::new("abc"))
            .unwrap();
        assert_eq!(id, "z_1");
        assert_eq!(doc.videos("x", Some("z")).unwrap()[0].external_id, "abc");
    }

    #[test]
    fn test_lookup_errors() {
        let mut doc = document();
        assert!(matches!(
            doc.insert_video("nope", None, VideoEntry::new("a")),
            Err(GistError::NotFound(_))
        ));
        assert!(matches!(
            doc.insert_video("x", Some("nope"), VideoEntry::new("a")),
            Err(GistError::NotFound(_))
        ));
        assert!(matches!(
            doc.insert_video("x", None, VideoEntry::new("a")),
            Err(GistError::NotFound(_))
        ));
        assert!(matches!(
            doc.remove_video("x", Some("y"), "intro"),
            Err(GistError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_merges_fields() {
        let mut doc = document();
        let patch = json!({ "youtubeId": "fresh", "title": "Live" });
        doc.update_video("music", None, "intro", patch.as_object().unwrap())
            .unwrap();

        let entry = &doc.videos("music", None).unwrap()[1];
        assert_eq!(entry.id, "intro");
        assert_eq!(entry.external_id, "fresh");
        assert_eq!(entry.extra["title"], "Live");
    }

    #[test]
    fn test_update_rejects_id_collision() {
        let mut doc = document();
        let patch = json!({ "id": "y_1" });
        let err = doc
            .update_video("music", None, "intro", patch.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, GistError::Validation(_)));
        assert_eq!(doc.videos("music", None).unwrap()[1].id, "intro");
    }

    #[test]
    fn test_remove_returns_entry() {
        let mut doc = document();
        let removed = doc.remove_video("x", Some("y"), "y_3").unwrap();
        assert_eq!(removed.id, "y_3");
        assert!(!doc.contains_video_id("y_3"));
    }

    #[test]
    fn test_missing_categories_is_a_validation_error() {
        assert!(matches!(
            RemoteDocument::from_json(r#"{"videos": []}"#),
            Err(GistError::Validation(_))
        ));
        assert!(matches!(
            RemoteDocument::from_json("not json"),
            Err(GistError::JsonParse(_))
        ));
    }

    #[test]
    fn test_unknown_fields_survive_a_round_trip() {
        let text = json!({
            "version": 3,
            "categories": [
                {
                    "id": "x",
                    "icon": "star",
                    "subcategories": [
                        { "id": "y", "label": "Y", "videos": [{ "id": "y_1", "youtubeId": "a", "tags": ["t"] }] }
                    ],
                    "videos": [{ "id": "stray", "youtubeId": "s" }]
                },
                { "id": "flat", "videos": [] }
            ]
        })
        .to_string();

        let doc = RemoteDocument::from_json(&text).unwrap();
        assert!(matches!(doc.categories[0].content, CategoryContent::Nested(_)));
        assert!(matches!(doc.categories[1].content, CategoryContent::Flat(_)));

        let written: Value = serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();
        let original: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(written, original);
    }
}
