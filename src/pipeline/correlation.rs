//! Class correlation: raw class identifier → resolved [`ClassDescriptor`].
//!
//! Lookups run as an ordered list of pure strategies. The first one that
//! yields a descriptor wins; when none do, the raw identifier becomes the
//! display name so the assignment is never dropped.

use std::collections::HashMap;

use serde::Serialize;

use super::types::{ClassDescriptor, ClassListingEntry};

// ═══════════════════════════════════════════
// Class index
// ═══════════════════════════════════════════

/// Run-scoped class descriptors keyed by group identifier, in listing order.
#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    classes: Vec<ClassDescriptor>,
    by_group: HashMap<String, usize>,
}

impl ClassIndex {
    pub fn from_listing(entries: &[ClassListingEntry]) -> Self {
        let mut index = Self::default();
        for entry in entries {
            let descriptor = ClassDescriptor::from_listing(entry);
            if descriptor.class_id.is_empty() || index.by_group.contains_key(&descriptor.class_id) {
                tracing::debug!(
                    class = %descriptor.class_name,
                    "Skipping listing entry without unique group id"
                );
                continue;
            }
            index
                .by_group
                .insert(descriptor.class_id.clone(), index.classes.len());
            index.classes.push(descriptor);
        }
        index
    }

    pub fn get(&self, group_id: &str) -> Option<&ClassDescriptor> {
        self.by_group
            .get(group_id.trim())
            .map(|&i| &self.classes[i])
    }

    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    /// Classes of the active period. Falls back to every class when the
    /// listing flags none as current.
    pub fn current_classes(&self, current_only: bool) -> Vec<&ClassDescriptor> {
        let any_highlighted = self.classes.iter().any(|c| c.highlighted);
        self.classes
            .iter()
            .filter(|c| !current_only || !any_highlighted || c.highlighted)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ═══════════════════════════════════════════
// Correlation
// ═══════════════════════════════════════════

/// What is known about one assignment when resolving its class.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationInput<'a> {
    pub class_id: Option<&'a str>,
    pub group_hint: Option<&'a str>,
    pub preceding_group: Option<&'a str>,
    pub cached: Option<&'a ClassDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationSource {
    Direct,
    GroupHint,
    PrecedingGroup,
    Cached,
    RawIdentifier,
}

impl CorrelationSource {
    /// Resolved from this run's class listing.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Direct | Self::GroupHint | Self::PrecedingGroup)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub descriptor: ClassDescriptor,
    pub source: CorrelationSource,
}

type Strategy = fn(&ClassIndex, &CorrelationInput<'_>) -> Option<ClassDescriptor>;

const STRATEGIES: &[(CorrelationSource, Strategy)] = &[
    (CorrelationSource::Direct, by_class_id as Strategy),
    (CorrelationSource::GroupHint, by_group_hint as Strategy),
    (CorrelationSource::PrecedingGroup, by_preceding_group as Strategy),
    (CorrelationSource::Cached, from_cache as Strategy),
];

/// Resolve the class of one assignment.
pub fn correlate(index: &ClassIndex, input: &CorrelationInput<'_>) -> Correlation {
    STRATEGIES
        .iter()
        .find_map(|(source, strategy)| {
            strategy(index, input).map(|descriptor| Correlation {
                descriptor,
                source: *source,
            })
        })
        .unwrap_or_else(|| Correlation {
            descriptor: ClassDescriptor::unresolved(input.class_id),
            source: CorrelationSource::RawIdentifier,
        })
}

fn lookup(index: &ClassIndex, id: Option<&str>) -> Option<ClassDescriptor> {
    id.map(str::trim)
        .filter(|id| !id.is_empty())
        .and_then(|id| index.get(id))
        .cloned()
}

fn by_class_id(index: &ClassIndex, input: &CorrelationInput<'_>) -> Option<ClassDescriptor> {
    lookup(index, input.class_id)
}

fn by_group_hint(index: &ClassIndex, input: &CorrelationInput<'_>) -> Option<ClassDescriptor> {
    lookup(index, input.group_hint)
}

fn by_preceding_group(index: &ClassIndex, input: &CorrelationInput<'_>) -> Option<ClassDescriptor> {
    lookup(index, input.preceding_group)
}

fn from_cache(_index: &ClassIndex, input: &CorrelationInput<'_>) -> Option<ClassDescriptor> {
    input
        .cached
        .filter(|c| !c.class_name.trim().is_empty())
        .cloned()
}
