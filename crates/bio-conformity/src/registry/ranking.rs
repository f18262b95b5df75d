use serde::Serialize;

use super::query::RegistryQuery;
use crate::conformity::rules::fold;
use crate::records::Supplier;

const NAME_MATCH: u32 = 3;
const NAME_PREFIX: u32 = 2;
const CITY_MATCH: u32 = 1;
const POSTAL_MATCH: u32 = 5;

/// Anything that can be ranked against a supplier query.
pub trait Rankable {
    fn rank_name(&self) -> &str;
    fn rank_city(&self) -> Option<&str>;
    fn rank_postal_code(&self) -> Option<&str>;
}

impl Rankable for Supplier {
    fn rank_name(&self) -> &str {
        &self.name
    }

    fn rank_city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    fn rank_postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub item: T,
    pub relevance: u32,
}

pub fn relevance<T: Rankable>(item: &T, query: &RegistryQuery) -> u32 {
    let name = fold(item.rank_name());
    let city = item.rank_city().map(fold).unwrap_or_default();
    let mut score = 0;

    for term in query.terms.iter().map(|term| fold(term)) {
        if name.contains(&term) {
            score += NAME_MATCH;
            if name.starts_with(&term) {
                score += NAME_PREFIX;
            }
        }
        if !city.is_empty() && city.contains(&term) {
            score += CITY_MATCH;
        }
    }

    if let (Some(filter), Some(postal_code)) = (&query.postal_code, item.rank_postal_code()) {
        if postal_code.trim() == filter.as_str() {
            score += POSTAL_MATCH;
        }
    }

    score
}

/// Sort by relevance, highest first. Ties keep their input order.
pub fn rank<T: Rankable>(items: Vec<T>, query: &RegistryQuery) -> Vec<Ranked<T>> {
    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .map(|item| Ranked {
            relevance: relevance(&item, query),
            item,
        })
        .collect();
    ranked.sort_by(|a, b| b.relevance.cmp(&a.relevance));
    ranked
}

/// Fuzzy search over already-stored suppliers; only positive matches are kept.
pub fn search_local(suppliers: Vec<Supplier>, query: &RegistryQuery) -> Vec<Ranked<Supplier>> {
    rank(suppliers, query)
        .into_iter()
        .filter(|ranked| ranked.relevance > 0)
        .collect()
}
