use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    constants::{TAG_NAME_MAX_LENGTH, TAG_SLUG_MAX_LENGTH},
    error::ServiceError,
    schema::{Id, NewTag, Tag},
    store::Store,
};

static COLOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("color pattern is valid"));
static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

/// Derives a URL slug from a tag name: transliterated to ASCII, lowercased,
/// every other run of characters collapsed into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut derived = slug::slugify(name);

    derived.truncate(TAG_SLUG_MAX_LENGTH);
    derived.trim_end_matches('-').to_owned()
}

pub async fn create_tag<S: Store>(tag: &NewTag, store: &S) -> Result<Tag, ServiceError> {
    let name = tag.name.trim();
    if name.is_empty() || name.chars().count() > TAG_NAME_MAX_LENGTH {
        return Err(ServiceError::validation(format!(
            "Tag name must be between 1 and {TAG_NAME_MAX_LENGTH} characters"
        )));
    }

    if !COLOR_PATTERN.is_match(&tag.color) {
        return Err(ServiceError::validation(format!(
            "Invalid color code: {}",
            tag.color
        )));
    }
    let color = tag.color.to_ascii_lowercase();

    let slug = match &tag.slug {
        Some(slug) => slug.to_owned(),
        None => slugify(name),
    };
    if slug.len() > TAG_SLUG_MAX_LENGTH || !SLUG_PATTERN.is_match(&slug) {
        return Err(ServiceError::validation(format!("Invalid slug: {slug}")));
    }

    let row = store.insert_tag(name, &color, &slug).await?;
    log::info!("Created tag {} ({})", row.name, row.slug);

    Ok(row)
}

pub async fn get_tag<S: Store>(id: Id, store: &S) -> Result<Tag, ServiceError> {
    store
        .get_tag(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("tag".to_owned()))
}

pub async fn list_tags<S: Store>(store: &S) -> Result<Vec<Tag>, ServiceError> {
    Ok(store.list_tags().await?)
}
