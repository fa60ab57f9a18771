use crate::context::SessionMode;

/// Cache slot for a lazily resolved relationship.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cached<T> {
    /// Never resolved; the first access fetches.
    #[default]
    Unresolved,

    /// Resolved and safe to return from memory.
    Trusted(T),

    /// Resolved, but the graph may have changed since; accessors refetch.
    MustRefresh(T),
}

impl<T> Cached<T> {
    /// Wraps a freshly resolved value according to the session's refresh policy.
    pub fn store(value: T, mode: SessionMode) -> Self {
        if mode.graph_is_frozen() {
            Cached::Trusted(value)
        } else {
            Cached::MustRefresh(value)
        }
    }

    pub fn trusted(&self) -> Option<&T> {
        match self {
            Cached::Trusted(value) => Some(value),
            _ => None,
        }
    }

    /// Last resolved value, trusted or not.
    pub fn value(&self) -> Option<&T> {
        match self {
            Cached::Trusted(value) | Cached::MustRefresh(value) => Some(value),
            Cached::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Cached::Unresolved)
    }
}
