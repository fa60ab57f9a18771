use resgraph_filter::{Criteria, Criterion};
use resgraph_protocol::{Metadata, SearchQuery};
use serde_json::Value;

/// Search filter for containers and assets. Unset criteria are unconstrained.
///
/// The same filter produces the query sent to the engine and an equivalent
/// local [`Criteria`] for re-filtering fetched collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceFilter {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn to_query(&self) -> SearchQuery {
        let query = SearchQuery {
            name: self.name.clone(),
            kind: self.kind.clone(),
            tags: self.tags.clone().unwrap_or_default(),
            metadata: Vec::new(),
        };
        match &self.metadata {
            Some(metadata) => query.with_metadata(metadata),
            None => query,
        }
    }

    pub fn to_criteria(&self) -> Criteria {
        let mut criteria = Criteria::new();
        if let Some(name) = &self.name {
            criteria.insert("name", Criterion::equals(name.as_str()));
        }
        if let Some(kind) = &self.kind {
            criteria.insert("type", Criterion::equals(kind.as_str()));
        }
        if let Some(tags) = &self.tags {
            criteria.insert("tags", Criterion::contains(tags.iter().map(String::as_str)));
        }
        // Criteria paths split on `.`, so dotted keys are matched literally
        // against the metadata object instead.
        let mut dotted = Metadata::new();
        for (key, value) in self.metadata.iter().flatten() {
            if key.contains('.') {
                dotted.insert(key.clone(), value.clone());
            } else {
                criteria.insert(format!("metadata.{key}"), Criterion::Equals(value.clone()));
            }
        }
        if !dotted.is_empty() {
            criteria.insert(
                "metadata",
                Criterion::predicate(move |metadata| {
                    dotted.iter().all(|(key, value)| metadata.get(key) == Some(value))
                }),
            );
        }
        criteria
    }
}
