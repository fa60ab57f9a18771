//! # Resource Graph Filter
//!
//! Side-effect free predicate matching over resources addressed by
//! dot-separated property paths (`metadata.sample.temperature`).
//!
//! The same engine re-filters collections that were already fetched and
//! mirrors the criteria sent to the database for remote searches.
//!
//! ## Example
//!
//! ```rust
//! use resgraph_filter::{filter, Criteria, Criterion};
//! use serde_json::json;
//!
//! let resources = vec![
//!     json!({"name": "a", "tags": ["raw", "csv"]}),
//!     json!({"name": "b", "tags": ["csv"]}),
//! ];
//! let criteria = Criteria::new().with("tags", Criterion::contains(["raw"]));
//! let matching = filter(&criteria, resources);
//! assert_eq!(matching, vec![json!({"name": "a", "tags": ["raw", "csv"]})]);
//! ```

use serde_json::{Map, Value};
use std::borrow::Cow;

mod criterion;
mod error;

pub use criterion::{Criterion, Operator, Predicate};
pub use error::{FilterError, Result};

/// A resource whose top level properties can be looked up by name.
///
/// Nested segments of a property path are always resolved through JSON
/// objects, so attribute-style and mapping-style resources behave the same.
pub trait Filterable {
    fn property(&self, name: &str) -> Option<Cow<'_, Value>>;
}

impl Filterable for Value {
    fn property(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.as_object()?.get(name).map(Cow::Borrowed)
    }
}

impl Filterable for Map<String, Value> {
    fn property(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.get(name).map(Cow::Borrowed)
    }
}

impl<T: Filterable + ?Sized> Filterable for &T {
    fn property(&self, name: &str) -> Option<Cow<'_, Value>> {
        (**self).property(name)
    }
}

/// Property path → criterion, applied in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    entries: Vec<(String, Criterion)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, criterion: Criterion) -> Self {
        self.insert(path, criterion);
        self
    }

    /// Sets the criterion for `path`, replacing an earlier one in place.
    pub fn insert(&mut self, path: impl Into<String>, criterion: Criterion) {
        let path = path.into();
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == path) {
            entry.1 = criterion;
        } else {
            self.entries.push((path, criterion));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Criterion)> {
        self.entries.iter().map(|(path, c)| (path.as_str(), c))
    }

    /// Builds criteria from a JSON object keyed by property path.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(entries) = value else {
            return Err(FilterError::NotAnObject(value.to_string()));
        };
        let mut criteria = Criteria::new();
        for (path, criterion) in entries {
            criteria.insert(path, Criterion::from_json(criterion)?);
        }
        Ok(criteria)
    }
}

/// Resolves a dot-separated property path. `None` if any segment is absent.
pub fn resolve<'r, R: Filterable + ?Sized>(path: &str, resource: &'r R) -> Option<Cow<'r, Value>> {
    let mut segments = path.split('.');
    let mut current = resource.property(segments.next()?)?;
    for segment in segments {
        current = match current {
            Cow::Borrowed(value) => Cow::Borrowed(value.as_object()?.get(segment)?),
            Cow::Owned(Value::Object(mut map)) => Cow::Owned(map.remove(segment)?),
            Cow::Owned(_) => return None,
        };
    }
    Some(current)
}

/// Whether the property at `path` satisfies `criterion`.
/// An absent property never matches.
pub fn matches<R: Filterable + ?Sized>(path: &str, criterion: &Criterion, resource: &R) -> bool {
    resolve(path, resource).is_some_and(|value| criterion.matches_value(&value))
}

/// Keeps the resources satisfying every criterion, preserving input order.
pub fn filter<R, I>(criteria: &Criteria, resources: I) -> Vec<R>
where
    R: Filterable,
    I: IntoIterator<Item = R>,
{
    let mut matching: Vec<R> = resources.into_iter().collect();
    for (path, criterion) in criteria.iter() {
        let before = matching.len();
        matching.retain(|resource| matches(path, criterion, resource));
        log::trace!("filter `{path}`: {before} -> {}", matching.len());
    }
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Sample {
        name: &'static str,
        metadata: Value,
    }

    impl Filterable for Sample {
        fn property(&self, name: &str) -> Option<Cow<'_, Value>> {
            match name {
                "name" => Some(Cow::Owned(Value::from(self.name))),
                "metadata" => Some(Cow::Borrowed(&self.metadata)),
                _ => None,
            }
        }
    }

    fn samples() -> Vec<Value> {
        vec![
            json!({"name": "s1", "kind": "trial", "tags": ["raw"], "metadata": {"temp": 20, "site": {"id": "A"}}}),
            json!({"name": "s2", "kind": "control", "tags": ["raw", "csv"], "metadata": {"temp": 25}}),
            json!({"name": "s3", "kind": "trial", "tags": ["csv"], "metadata": {"temp": 20, "site": {"id": "B"}}}),
        ]
    }

    fn names(values: &[Value]) -> Vec<&str> {
        values.iter().map(|v| v["name"].as_str().unwrap()).collect()
    }

    #[test]
    fn absent_segments_never_match() {
        let resource = json!({"metadata": {"temp": 20}});
        let criteria = [
            Criterion::equals(20),
            Criterion::contains([20]),
            Criterion::from_json(json!({"$in": [20]})).unwrap(),
            Criterion::predicate(|_| true),
            Criterion::pattern(".*").unwrap(),
        ];
        for criterion in &criteria {
            assert!(!matches("metadata.pressure", criterion, &resource));
            assert!(!matches("metadata.temp.unit", criterion, &resource));
            assert!(!matches("missing", criterion, &resource));
        }
    }

    #[test]
    fn nested_paths_resolve_through_objects() {
        let resource = samples().remove(0);
        assert!(matches("metadata.site.id", &Criterion::equals("A"), &resource));
        assert!(!matches("metadata.site.id", &Criterion::equals("B"), &resource));
    }

    #[test]
    fn attribute_style_resources_resolve_like_mappings() {
        let sample = Sample {
            name: "s1",
            metadata: json!({"site": {"id": "A"}}),
        };
        assert!(matches("name", &Criterion::equals("s1"), &sample));
        assert!(matches("metadata.site.id", &Criterion::pattern("^A$").unwrap(), &sample));
        assert!(!matches("tags", &Criterion::contains(["raw"]), &sample));
    }

    #[test]
    fn predicate_receives_resolved_value() {
        let resource = json!({"metadata": {"temp": 25}});
        let warm = Criterion::predicate(|v| v.as_i64().is_some_and(|t| t > 22));
        assert!(matches("metadata.temp", &warm, &resource));
    }

    #[test]
    fn empty_criteria_is_identity() {
        let resources = samples();
        let out = filter(&Criteria::new(), resources.clone());
        assert_eq!(out, resources);

        let mut reversed = samples();
        reversed.reverse();
        assert_eq!(filter(&Criteria::new(), reversed.clone()), reversed);
    }

    #[test]
    fn passes_narrow_without_reordering() {
        let criteria = Criteria::new()
            .with("kind", Criterion::equals("trial"))
            .with("metadata.temp", Criterion::equals(20));
        let out = filter(&criteria, samples());
        assert_eq!(names(&out), vec!["s1", "s3"]);

        let mut reversed = samples();
        reversed.reverse();
        let out = filter(&criteria, reversed);
        assert_eq!(names(&out), vec!["s3", "s1"]);
    }

    #[test]
    fn criteria_from_json_combines_shapes() {
        let criteria = Criteria::from_json(json!({
            "tags": ["csv"],
            "metadata.temp": {"$in": [20, 30]},
        }))
        .unwrap();
        assert_eq!(criteria.len(), 2);
        let out = filter(&criteria, samples());
        assert_eq!(names(&out), vec!["s3"]);
    }

    #[test]
    fn borrowed_resources_filter_in_place() {
        let resources = samples();
        let criteria = Criteria::new().with("tags", Criterion::contains(["raw"]));
        let out = filter(&criteria, resources.iter());
        assert_eq!(out.len(), 2);
        assert!(std::ptr::eq(out[0], &resources[0]));
    }

    #[test]
    fn insert_replaces_existing_path() {
        let mut criteria = Criteria::new().with("kind", Criterion::equals("trial"));
        criteria.insert("kind", Criterion::equals("control"));
        assert_eq!(criteria.len(), 1);
        assert_eq!(names(&filter(&criteria, samples())), vec!["s2"]);
    }
}
