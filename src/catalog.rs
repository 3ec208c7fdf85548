//! Read-only skin catalog. The engine only asks for a random item of a
//! category and edition, or for everything in a category.
use crate::error::{GachaError, Result};
use crate::skin::Edition;
use once_cell::sync::Lazy;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub rarity: Edition,
    pub category: String,
    pub image_ref: String,
}

pub trait ItemCatalog {
    fn random_item(&self, category: &str, rarity: Edition, rng: &mut dyn RngCore) -> Option<Item>;
    fn list_items(&self, category: &str) -> Vec<Item>;
    fn categories(&self) -> Vec<String>;
}

/// Catalog file entry; the category is the id prefix before the first `_`.
#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    wp_id: String,
    wp_name: String,
    rarity: Edition,
}

impl CatalogEntry {
    fn into_item(self) -> Item {
        let (category, slug) = self.wp_id.split_once('_').unwrap_or((self.wp_id.as_str(), ""));
        let image_ref = format!("valorant_assets/{category}/{slug}.png");
        Item {
            category: category.to_string(),
            image_ref,
            name: self.wp_name,
            rarity: self.rarity,
            id: self.wp_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticCatalog {
    items: Vec<Item>,
}

static DEFAULT_CATALOG: Lazy<StaticCatalog> = Lazy::new(|| {
    StaticCatalog::from_json(include_str!("../data/skins.json")).unwrap_or_else(|e| {
        log::error!("Embedded skin catalog is invalid: {}", e);
        StaticCatalog::default()
    })
});

impl StaticCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(json).map_err(|e| GachaError::Storage(format!("skin catalog: {e}")))?;
        Ok(Self::new(entries.into_iter().map(CatalogEntry::into_item).collect()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| GachaError::Storage(format!("read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn default_catalog() -> &'static StaticCatalog {
        &DEFAULT_CATALOG
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemCatalog for StaticCatalog {
    fn random_item(&self, category: &str, rarity: Edition, rng: &mut dyn RngCore) -> Option<Item> {
        let candidates: Vec<&Item> = self
            .items
            .iter()
            .filter(|item| item.category == category && item.rarity == rarity)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let pick = (rng.gen::<f64>() * candidates.len() as f64) as usize;
        candidates
            .get(pick.min(candidates.len() - 1))
            .map(|item| (*item).clone())
    }

    fn list_items(&self, category: &str) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.category == category)
            .cloned()
            .collect()
    }

    fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.items.iter().map(|i| i.category.clone()).collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;

    #[test]
    fn embedded_catalog_covers_every_pool() {
        let catalog = StaticCatalog::default_catalog();
        for pool in crate::skin::GUN_POOLS {
            for edition in Edition::ALL {
                let mut rng = ScriptedRng::constant(0.5);
                assert!(
                    catalog.random_item(pool.category, edition, &mut rng).is_some(),
                    "no {:?} item for {}",
                    edition,
                    pool.id
                );
            }
        }
        assert_eq!(catalog.list_items("melee").len(), 5);
    }

    #[test]
    fn entries_map_category_and_image() {
        let catalog = StaticCatalog::from_json(
            r#"[{"wp_id":"vandal_prime","wp_name":"Prime Vandal","rarity":3},
                {"wp_id":"melee_reaver_karambit","wp_name":"Reaver Karambit","rarity":4}]"#,
        )
        .unwrap();
        let knives = catalog.list_items("melee");
        assert_eq!(knives.len(), 1);
        assert_eq!(knives[0].image_ref, "valorant_assets/melee/reaver_karambit.png");
        assert_eq!(catalog.categories(), vec!["melee".to_string(), "vandal".to_string()]);
    }

    #[test]
    fn missing_combination_is_none() {
        let catalog = StaticCatalog::from_json(r#"[{"wp_id":"vandal_prime","wp_name":"Prime Vandal","rarity":3}]"#).unwrap();
        let mut rng = ScriptedRng::constant(0.99);
        assert!(catalog.random_item("vandal", Edition::Ultra, &mut rng).is_none());
        assert_eq!(
            catalog.random_item("vandal", Edition::Premium, &mut rng).map(|i| i.id),
            Some("vandal_prime".to_string())
        );
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(StaticCatalog::from_json("[{").is_err());
    }
}
