//! Event Filter
//!
//! Selects cluster events matching a set of independent, optional criteria. Every
//! criterion that is present must hold for an event to be kept; absent criteria
//! constrain nothing.
//!
//! Entity matching looks up `entity_name` in the event's custom fields. The stored
//! value is compared through its string form (see [`FieldValue::coerce_to_string`]),
//! so a numeric `job_id` of `1` matches the query id `"1"`. The wildcard id `*` only
//! requires the key to be present.

use ahash::AHashSet;
use vigil_event::ClusterEvent;
use vigil_schema::{FieldValue, Severity, SourceType};

/// Entity id that matches any value
pub const WILDCARD: &str = "*";

/// Expected value of the entity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityId {
    /// Key present, any value
    Any,
    /// Stored value's string form must equal this id
    Exact(String),
}

impl EntityId {
    /// Parse a query id, mapping [`WILDCARD`] to [`EntityId::Any`]
    pub fn parse(id: &str) -> Self {
        if id == WILDCARD {
            EntityId::Any
        } else {
            EntityId::Exact(id.to_string())
        }
    }

    fn accepts(&self, value: &FieldValue) -> bool {
        match self {
            EntityId::Any => true,
            EntityId::Exact(id) => value.coerce_to_string() == *id,
        }
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::parse(id)
    }
}

/// Criteria for selecting events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub severity_levels: Option<AHashSet<Severity>>,
    pub source_types: Option<AHashSet<SourceType>>,
    pub entity_name: Option<String>,
    /// Ignored unless `entity_name` is set
    pub entity_id: Option<EntityId>,
}

impl FilterCriteria {
    /// Criteria that keep every event
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_severities(mut self, levels: impl IntoIterator<Item = Severity>) -> Self {
        self.severity_levels = Some(levels.into_iter().collect());
        self
    }

    pub fn with_source_types(mut self, sources: impl IntoIterator<Item = SourceType>) -> Self {
        self.source_types = Some(sources.into_iter().collect());
        self
    }

    /// Require the custom field `name` to match `id`
    pub fn with_entity(mut self, name: impl Into<String>, id: impl Into<EntityId>) -> Self {
        self.entity_name = Some(name.into());
        self.entity_id = Some(id.into());
        self
    }

    /// True when no criterion is set, i.e. filtering is the identity
    pub fn is_empty(&self) -> bool {
        self.severity_levels.is_none() && self.source_types.is_none() && self.entity_name.is_none()
    }

    /// Per-event inclusion test
    pub fn matches(&self, event: &ClusterEvent) -> bool {
        if let Some(levels) = &self.severity_levels {
            if !levels.contains(&event.severity) {
                return false;
            }
        }

        if let Some(sources) = &self.source_types {
            if !sources.contains(&event.source_type) {
                return false;
            }
        }

        match &self.entity_name {
            None => true,
            Some(name) => match (event.custom_field(name), &self.entity_id) {
                (Some(value), Some(id)) => id.accepts(value),
                // Key missing, or nothing to compare the stored value against
                _ => false,
            },
        }
    }
}

/// Return the events matching `criteria`, in input order
pub fn filter_events<'a>(events: &'a [ClusterEvent], criteria: &FilterCriteria) -> Vec<&'a ClusterEvent> {
    if criteria.is_empty() {
        return events.iter().collect();
    }

    events.iter().filter(|event| criteria.matches(event)).collect()
}
