use serde::{Deserialize, Serialize};

use crate::types::Model;

/// One selectable entry of the model combobox. The catalog does not limit
/// what an operator may select: free text that matches no catalog id becomes
/// a `Custom` candidate carrying the text itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelChoice {
    Custom { id: String },
    Catalog(Model),
}

impl ModelChoice {
    /// The model identifier this choice stands for; it is the only value
    /// ever persisted to settings.
    pub fn id(&self) -> &str {
        match self {
            ModelChoice::Custom { id } => id,
            ModelChoice::Catalog(model) => &model.id,
        }
    }
}

/// Compute the visible candidate list for the model selector.
///
/// Text filter first (case-insensitive substring over name and id, empty
/// query matches everything), then the free-tier filter. If a non-empty
/// query equals no surviving entry's id, a single custom entry carrying the
/// query is prepended.
pub fn visible_models(catalog: &[Model], query: &str, free_only: bool) -> Vec<ModelChoice> {
    let needle = query.to_lowercase();
    let matching = catalog.iter().filter(|m| {
        needle.is_empty()
            || m.name.to_lowercase().contains(&needle)
            || m.id.to_lowercase().contains(&needle)
    });
    let surviving: Vec<&Model> = if free_only {
        matching.filter(|m| m.is_free()).collect()
    } else {
        matching.collect()
    };

    let mut choices = Vec::with_capacity(surviving.len() + 1);
    if !query.is_empty() && !surviving.iter().any(|m| m.id == query) {
        choices.push(ModelChoice::Custom {
            id: query.to_string(),
        });
    }
    choices.extend(surviving.into_iter().cloned().map(ModelChoice::Catalog));
    choices
}
