//! Static recommendation data: apriori co-purchase associations and a
//! popularity ranking with product categories.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const STANDALONE_LIMIT: usize = 3;
pub const ORDER_ATTACHED_LIMIT: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AprioriEntry {
    pub product: String,
    #[serde(default)]
    pub product_category: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularProduct {
    pub product: String,
    pub product_category: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read apriori data `{path}`: {source}")]
    ReadApriori { path: PathBuf, source: std::io::Error },
    #[error("could not parse apriori data `{path}`: {source}")]
    ParseApriori { path: PathBuf, source: serde_json::Error },
    #[error("could not read popularity data `{path}`: {source}")]
    ReadPopularity { path: PathBuf, source: csv::Error },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecommendationCatalog {
    apriori: HashMap<String, Vec<AprioriEntry>>,
    popular: Vec<PopularProduct>,
}

impl RecommendationCatalog {
    pub fn new(apriori: HashMap<String, Vec<AprioriEntry>>, popular: Vec<PopularProduct>) -> Self {
        Self { apriori, popular }
    }

    /// Loads both data files. A file that cannot be loaded is logged and
    /// treated as empty so the agents degrade to their no-results replies.
    pub fn load(apriori_path: &Path, popularity_path: &Path) -> Self {
        let apriori = Self::load_apriori(apriori_path).unwrap_or_else(|error| {
            warn!(
                event_name = "recommendations.apriori.load_failed",
                error = %error,
                "apriori recommendations unavailable"
            );
            HashMap::new()
        });
        let popular = Self::load_popularity(popularity_path).unwrap_or_else(|error| {
            warn!(
                event_name = "recommendations.popularity.load_failed",
                error = %error,
                "popularity recommendations unavailable"
            );
            Vec::new()
        });

        info!(
            event_name = "recommendations.loaded",
            apriori_items = apriori.len(),
            popular_products = popular.len(),
            "recommendation data loaded"
        );
        Self::new(apriori, popular)
    }

    pub fn load_apriori(path: &Path) -> Result<HashMap<String, Vec<AprioriEntry>>, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadApriori { path: path.to_path_buf(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| CatalogError::ParseApriori { path: path.to_path_buf(), source })
    }

    pub fn load_popularity(path: &Path) -> Result<Vec<PopularProduct>, CatalogError> {
        let read_error =
            |source: csv::Error| CatalogError::ReadPopularity { path: path.to_path_buf(), source };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(read_error)?;
        reader.deserialize::<PopularProduct>().map(|row| row.map_err(read_error)).collect()
    }

    pub fn apriori_len(&self) -> usize {
        self.apriori.len()
    }

    pub fn popular_len(&self) -> usize {
        self.popular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apriori.is_empty() && self.popular.is_empty()
    }

    pub fn products(&self) -> Vec<&str> {
        self.popular.iter().map(|row| row.product.as_str()).collect()
    }

    /// Distinct categories in popularity order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.popular
            .iter()
            .map(|row| row.product_category.as_str())
            .filter(|category| seen.insert(category.to_ascii_lowercase()))
            .collect()
    }

    /// Products frequently bought with `items`, excluding `items` themselves.
    pub fn apriori(&self, items: &[String], limit: usize) -> Vec<String> {
        let mut picker = Picker::new(items, limit);
        for item in items {
            let Some(entries) = self.associations(item) else {
                continue;
            };
            for entry in entries {
                if picker.offer(&entry.product) {
                    return picker.finish();
                }
            }
        }
        picker.finish()
    }

    /// Most popular products overall, skipping anything in `exclude`.
    pub fn popular(&self, limit: usize, exclude: &[String]) -> Vec<String> {
        let mut picker = Picker::new(exclude, limit);
        for row in &self.popular {
            if picker.offer(&row.product) {
                break;
            }
        }
        picker.finish()
    }

    /// Most popular products within each requested category, in request order.
    pub fn popular_by_category(&self, categories: &[String], limit: usize) -> Vec<String> {
        let mut picker = Picker::new(&[], limit);
        for category in categories {
            let category = category.trim();
            let in_category = self
                .popular
                .iter()
                .filter(|row| row.product_category.eq_ignore_ascii_case(category));
            for row in in_category {
                if picker.offer(&row.product) {
                    return picker.finish();
                }
            }
        }
        picker.finish()
    }

    fn associations(&self, item: &str) -> Option<&Vec<AprioriEntry>> {
        let item = item.trim();
        self.apriori.get(item).or_else(|| {
            self.apriori
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(item))
                .map(|(_, entries)| entries)
        })
    }
}

/// Collects distinct product names up to `limit`, skipping excluded names.
struct Picker {
    seen: HashSet<String>,
    picked: Vec<String>,
    limit: usize,
}

impl Picker {
    fn new(exclude: &[String], limit: usize) -> Self {
        let seen = exclude.iter().map(|name| name.trim().to_ascii_lowercase()).collect();
        Self { seen, picked: Vec::new(), limit }
    }

    /// Returns true once the limit is reached.
    fn offer(&mut self, product: &str) -> bool {
        if self.picked.len() >= self.limit {
            return true;
        }
        if self.seen.insert(product.trim().to_ascii_lowercase()) {
            self.picked.push(product.trim().to_string());
        }
        self.picked.len() >= self.limit
    }

    fn finish(self) -> Vec<String> {
        self.picked
    }
}
