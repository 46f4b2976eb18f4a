//! Event Query Parameters
//!
//! Raw, string-typed query parameters as they arrive from a request, and their mapping
//! onto [`FilterCriteria`]. Each parameter maps to exactly one criteria field.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::str::FromStr;
use tracing::debug;
use vigil_core::{EntityId, FilterCriteria};
use vigil_schema::{SchemaError, Severity, SourceType};

/// Cluster event query
///
/// List parameters may repeat and may hold comma separated values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventQuery {
    pub severity_levels: Option<Vec<String>>,
    pub source_types: Option<Vec<String>>,
    pub entity_name: Option<String>,
    pub entity_id: Option<String>,
}

impl EventQuery {
    /// Build a query from `key=value` pairs, e.g. decoded URL parameters
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = EventQuery::default();

        for (key, value) in pairs {
            match key.as_ref() {
                "severity_levels" => query
                    .severity_levels
                    .get_or_insert_with(Vec::new)
                    .push(value.into()),
                "source_types" => query
                    .source_types
                    .get_or_insert_with(Vec::new)
                    .push(value.into()),
                "entity_name" => query.entity_name = Some(value.into()),
                "entity_id" => query.entity_id = Some(value.into()),
                other => debug!(parameter = other, "Ignoring unknown query parameter"),
            }
        }

        query
    }

    /// Map the parameters onto filter criteria.
    ///
    /// A list parameter with no non-empty items is treated as absent.
    pub fn to_criteria(&self) -> Result<FilterCriteria, QueryError> {
        Ok(FilterCriteria {
            severity_levels: parse_set::<Severity>(self.severity_levels.as_deref())?,
            source_types: parse_set::<SourceType>(self.source_types.as_deref())?,
            entity_name: self
                .entity_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            entity_id: self.entity_id.as_deref().map(EntityId::parse),
        })
    }
}

fn parse_set<T>(values: Option<&[String]>) -> Result<Option<AHashSet<T>>, QueryError>
where
    T: FromStr<Err = SchemaError> + Eq + Hash,
{
    let Some(values) = values else {
        return Ok(None);
    };

    let set = values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse::<T>)
        .collect::<Result<AHashSet<T>, _>>()?;

    Ok((!set.is_empty()).then_some(set))
}

/// Query mapping errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0}")]
    Schema(#[from] SchemaError),
}
