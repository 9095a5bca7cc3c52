//! Query string assembly for list endpoints.
//!
//! Values are stored unescaped; the transport form-encodes them when the URL
//! is assembled, so a filter such as `name eq 'a b'` reaches the server as
//! `query=name+eq+%27a+b%27`.

/// Ordered list of `key=value` pairs for a request URL.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Empty parameter list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add `key` only if `value` is `Some`.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: ToString,
    {
        if let Some(set) = value {
            self.entries.push((key, set.to_string()));
        }
    }

    /// Consume the builder, yielding pairs in insertion order.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.entries
    }
}

/// Query pairs for the `?query=<filter>` search supported by list endpoints.
#[must_use]
pub fn filter_query(filter: &str) -> Vec<(&'static str, String)> {
    vec![("query", filter.to_owned())]
}
