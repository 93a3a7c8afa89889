//! Assemblage du catalogue affiché
//!
//! Le document éditorial est ramené à une vue uniforme catégorie ->
//! sous-catégories, puis les métadonnées sont récupérées par lots de taille
//! maximale et regroupées par sous-catégorie, les plus récentes d'abord.

use chrono::{DateTime, Utc};
use pmogist::{CategoryContent, RemoteDocument, VideoEntry};
use pmoyoutube::{ItemReference, MetadataFetcher, NormalizedMetadata};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Nombre de vidéos récentes affichées par défaut
pub const DEFAULT_LATEST_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSubcategory {
    pub id: String,
    pub videos: Vec<VideoEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCategory {
    pub id: String,
    pub subcategories: Vec<CatalogSubcategory>,
}

/// Vue imbriquée de toutes les catégories
///
/// Une catégorie plate devient une sous-catégorie unique qui porte
/// l'identifiant de la catégorie. Les catégories sans identifiant sont ignorées.
pub fn normalize_categories(document: &RemoteDocument) -> Vec<CatalogCategory> {
    document
        .categories
        .iter()
        .filter(|category| !category.id.is_empty())
        .map(|category| {
            let subcategories = match &category.content {
                CategoryContent::Nested(subcategories) => subcategories
                    .iter()
                    .map(|sub| CatalogSubcategory {
                        id: sub.id.clone(),
                        videos: sub.videos.clone(),
                    })
                    .collect(),
                CategoryContent::Flat(videos) if !videos.is_empty() => vec![CatalogSubcategory {
                    id: category.id.clone(),
                    videos: videos.clone(),
                }],
                CategoryContent::Flat(_) => Vec::new(),
            };
            CatalogCategory {
                id: category.id.clone(),
                subcategories,
            }
        })
        .collect()
}

/// Références des vidéos d'une catégorie, chacune avec sa sous-catégorie
pub fn item_references(category: &CatalogCategory) -> Vec<ItemReference> {
    category
        .subcategories
        .iter()
        .flat_map(|sub| {
            sub.videos.iter().filter_map(move |video| {
                if video.external_id.is_empty() {
                    warn!(video_id = %video.id, "Video without youtubeId skipped");
                    return None;
                }
                Some(ItemReference::new(&video.id, &video.external_id).with_subcategory(&sub.id))
            })
        })
        .collect()
}

/// Récupère les métadonnées en lots de `max_batch_size`
///
/// Un lot servi par le cache garde l'ordre de sa première requête.
pub async fn fetch_all(
    fetcher: &MetadataFetcher,
    refs: &[ItemReference],
) -> pmoyoutube::Result<Vec<NormalizedMetadata>> {
    let mut results = Vec::with_capacity(refs.len());
    for chunk in refs.chunks(fetcher.max_batch_size()) {
        results.extend(fetcher.fetch_batch(chunk, None).await?);
    }
    Ok(results)
}

fn published(video: &NormalizedMetadata) -> Option<DateTime<Utc>> {
    video
        .published_at
        .as_deref()
        .and_then(|date| DateTime::parse_from_rfc3339(date).ok())
        .map(|date| date.with_timezone(&Utc))
}

/// Tri des plus récentes aux plus anciennes ; les dates absentes en dernier
pub fn sort_newest_first(videos: &mut [NormalizedMetadata]) {
    videos.sort_by_key(|video| Reverse(published(video)));
}

/// Vidéos d'une catégorie regroupées par sous-catégorie
pub async fn load_category(
    fetcher: &MetadataFetcher,
    category: &CatalogCategory,
) -> pmoyoutube::Result<BTreeMap<String, Vec<NormalizedMetadata>>> {
    let refs = item_references(category);
    let videos = fetch_all(fetcher, &refs).await?;

    let by_external_id: HashMap<&str, &NormalizedMetadata> = videos
        .iter()
        .map(|video| (video.external_id.as_str(), video))
        .collect();

    let mut grouped: BTreeMap<String, Vec<NormalizedMetadata>> = BTreeMap::new();
    for reference in &refs {
        let Some(subcategory) = &reference.subcategory_id else {
            continue;
        };
        let Some(video) = by_external_id.get(reference.external_id.as_str()) else {
            warn!(youtube_id = %reference.external_id, "No metadata returned for video");
            continue;
        };
        // Le cache peut porter l'id interne d'une autre catégorie
        let mut video = (*video).clone();
        video.internal_id = reference.internal_id.clone();
        grouped.entry(subcategory.clone()).or_default().push(video);
    }
    for videos in grouped.values_mut() {
        sort_newest_first(videos);
    }

    debug!(category = %category.id, groups = grouped.len(), "Category loaded");
    Ok(grouped)
}

/// Les `count` vidéos les plus récentes parmi `videos` ; les vidéos sans date sont exclues
pub fn select_latest(videos: Vec<NormalizedMetadata>, count: usize) -> Vec<NormalizedMetadata> {
    let mut dated: Vec<NormalizedMetadata> = videos
        .into_iter()
        .filter(|video| published(video).is_some())
        .collect();
    sort_newest_first(&mut dated);
    dated.truncate(count);
    dated
}

/// Les `count` vidéos les plus récentes de tout le catalogue
pub async fn latest_videos(
    fetcher: &MetadataFetcher,
    categories: &[CatalogCategory],
    count: usize,
) -> pmoyoutube::Result<Vec<NormalizedMetadata>> {
    let refs: Vec<ItemReference> = categories.iter().flat_map(item_references).collect();
    if refs.is_empty() {
        return Ok(Vec::new());
    }
    let videos = fetch_all(fetcher, &refs).await?;
    Ok(select_latest(videos, count))
}
