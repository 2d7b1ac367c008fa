//! Boarding search.
//!
//! A search is a conjunction of typed [`Predicate`]s plus a [`SortOrder`], or
//! the admin [`BoardingSearch::ShowAll`] bypass. The same value is evaluated
//! against in-memory rows and rendered into parameterized SQL, so every
//! repository back end shares one set of semantics.

use std::cmp::Ordering;

use serde::Deserialize;
use utoipa::IntoParams;

use crate::models::{Boarding, BoardingType};
use crate::validation::{sanitize_text, strip_tags};

pub const DEFAULT_MIN_PRICE: f64 = 0.0;
pub const DEFAULT_MAX_PRICE: f64 = 999_999.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Moderation gate, only present when listing approval is required.
    Approved,
    UniversityContains(String),
    TownContains(String),
    TypeIs(BoardingType),
    PriceBetween { min: f64, max: f64 },
    /// Listing must carry this facility; one predicate per requested token.
    HasFacility(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    PriceLow,
    PriceHigh,
}

impl SortOrder {
    /// Unrecognised values fall back to newest first.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("price_low") => SortOrder::PriceLow,
            Some("price_high") => SortOrder::PriceHigh,
            _ => SortOrder::Newest,
        }
    }

    #[cfg(feature = "postgres-store")]
    fn order_by_sql(&self) -> &'static str {
        match self {
            SortOrder::Newest => " ORDER BY created_at DESC, id DESC",
            SortOrder::PriceLow => " ORDER BY price ASC, created_at DESC, id DESC",
            SortOrder::PriceHigh => " ORDER BY price DESC, created_at DESC, id DESC",
        }
    }

    fn compare(&self, a: &Boarding, b: &Boarding) -> Ordering {
        let newest = b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id));
        match self {
            SortOrder::Newest => newest,
            SortOrder::PriceLow => a.price.total_cmp(&b.price).then(newest),
            SortOrder::PriceHigh => b.price.total_cmp(&a.price).then(newest),
        }
    }
}

/// Raw query string of `GET /boardings`. Everything is optional text so
/// malformed numbers surface as validation errors instead of extractor
/// failures.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub stats: Option<String>,
    pub all: Option<String>,
    pub university: Option<String>,
    pub town: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Comma separated; every listed facility must be present.
    pub facilities: Option<String>,
    /// `price_low`, `price_high` or anything else for newest first.
    pub sort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid {0} value")]
    InvalidPrice(&'static str),
    #[error("Invalid type filter: {0}")]
    InvalidType(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardingSearch {
    ShowAll,
    Filtered { predicates: Vec<Predicate>, sort: SortOrder },
}

fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_price(field: &'static str, raw: &Option<String>, default: f64) -> Result<f64, SearchError> {
    match present(raw) {
        None => Ok(default),
        Some(s) => match s.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(SearchError::InvalidPrice(field)),
        },
    }
}

impl BoardingSearch {
    pub fn from_params(params: &SearchParams, approved_only: bool) -> Result<Self, SearchError> {
        let mut predicates = Vec::new();
        if approved_only {
            predicates.push(Predicate::Approved);
        }
        // stored university and town are escaped, facilities are not
        if let Some(u) = present(&params.university).map(sanitize_text).filter(|u| !u.is_empty()) {
            predicates.push(Predicate::UniversityContains(u));
        }
        if let Some(t) = present(&params.town).map(sanitize_text).filter(|t| !t.is_empty()) {
            predicates.push(Predicate::TownContains(t));
        }
        if let Some(k) = present(&params.kind) {
            let kind = k.parse::<BoardingType>().map_err(|_| SearchError::InvalidType(k.to_string()))?;
            predicates.push(Predicate::TypeIs(kind));
        }
        let min = parse_price("min_price", &params.min_price, DEFAULT_MIN_PRICE)?;
        let max = parse_price("max_price", &params.max_price, DEFAULT_MAX_PRICE)?;
        predicates.push(Predicate::PriceBetween { min, max });
        if let Some(list) = present(&params.facilities) {
            predicates.extend(
                list.split(',')
                    .map(strip_tags)
                    .filter(|f| !f.is_empty())
                    .map(Predicate::HasFacility),
            );
        }
        Ok(BoardingSearch::Filtered { predicates, sort: SortOrder::parse(params.sort.as_deref()) })
    }

    pub fn predicates(&self) -> &[Predicate] {
        match self {
            BoardingSearch::ShowAll => &[],
            BoardingSearch::Filtered { predicates, .. } => predicates,
        }
    }

    pub fn sort(&self) -> SortOrder {
        match self {
            BoardingSearch::ShowAll => SortOrder::Newest,
            BoardingSearch::Filtered { sort, .. } => *sort,
        }
    }

    pub fn matches(&self, boarding: &Boarding) -> bool {
        self.predicates().iter().all(|p| p.matches(boarding))
    }

    /// Filter and order rows already held in memory.
    pub fn apply<I>(&self, rows: I) -> Vec<Boarding>
    where
        I: IntoIterator<Item = Boarding>,
    {
        let sort = self.sort();
        let mut out: Vec<Boarding> = rows.into_iter().filter(|b| self.matches(b)).collect();
        out.sort_by(|a, b| sort.compare(a, b));
        out
    }

    /// Append the WHERE conjuncts and ORDER BY clause to a query that already
    /// ends in `WHERE TRUE`.
    #[cfg(feature = "postgres-store")]
    pub fn push_sql(&self, qb: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>) {
        for predicate in self.predicates() {
            qb.push(" AND ");
            predicate.push_sql(qb);
        }
        qb.push(self.sort().order_by_sql());
    }
}

impl Predicate {
    pub fn matches(&self, b: &Boarding) -> bool {
        match self {
            Predicate::Approved => b.is_approved,
            Predicate::UniversityContains(needle) => contains_ci(&b.university, needle),
            Predicate::TownContains(needle) => contains_ci(&b.town, needle),
            Predicate::TypeIs(kind) => b.kind == *kind,
            Predicate::PriceBetween { min, max } => b.price >= *min && b.price <= *max,
            Predicate::HasFacility(wanted) => {
                let wanted = wanted.to_lowercase();
                b.facilities.iter().any(|f| f.to_lowercase() == wanted)
            }
        }
    }

    #[cfg(feature = "postgres-store")]
    fn push_sql(&self, qb: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>) {
        match self {
            Predicate::Approved => {
                qb.push("is_approved = TRUE");
            }
            Predicate::UniversityContains(needle) => {
                qb.push("university ILIKE ").push_bind(contains_pattern(needle));
            }
            Predicate::TownContains(needle) => {
                qb.push("town ILIKE ").push_bind(contains_pattern(needle));
            }
            Predicate::TypeIs(kind) => {
                qb.push("boarding_type = ").push_bind(kind.as_str().to_string());
            }
            Predicate::PriceBetween { min, max } => {
                qb.push("price BETWEEN ").push_bind(*min).push(" AND ").push_bind(*max);
            }
            Predicate::HasFacility(wanted) => {
                qb.push("facilities ILIKE ").push_bind(facility_pattern(wanted));
            }
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escape LIKE metacharacters (backslash is the Postgres default escape).
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn contains_pattern(needle: &str) -> String {
    format!("%{}%", escape_like(needle))
}

/// Facilities are stored as a JSON array, so a facility is present when its
/// quoted JSON form occurs in the serialized column.
pub fn facility_pattern(facility: &str) -> String {
    let quoted = serde_json::Value::String(facility.to_string()).to_string();
    format!("%{}%", escape_like(&quoted))
}
