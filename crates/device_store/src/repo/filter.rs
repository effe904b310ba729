//! Predicate composition for device listings.
//!
//! # Responsibility
//! - Turn a variadic set of query parameters into one `WHERE` clause.
//!
//! # Invariants
//! - Caller values are always bound parameters; only fixed column names and
//!   operators appear in SQL text.
//! - Parameters that are not filters contribute nothing.
//! - No fragments means no `WHERE` clause at all.

use crate::model::device::DeviceId;
use rusqlite::types::Value;

/// Capability of an argument passed to a device listing.
///
/// The default answers "not a filter", so auxiliary argument types can be
/// passed alongside filters and are ignored.
pub trait QueryParam {
    fn as_filter(&self) -> Option<&DeviceFilter> {
        None
    }
}

/// Closed set of supported device filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    /// Exact surrogate identifier.
    Uuid(DeviceId),
    Udid(String),
    SerialNumber(String),
    ProfileStatus(String),
    /// Rows reported by the provisioning feed.
    ProvisionedOnly,
}

impl DeviceFilter {
    /// Renders this filter as one SQL fragment plus its bound values.
    pub fn render(&self) -> (&'static str, Vec<Value>) {
        match self {
            Self::Uuid(id) => ("device_uuid = ?", vec![Value::Text(id.to_string())]),
            Self::Udid(udid) => ("udid = ?", vec![Value::Text(udid.clone())]),
            Self::SerialNumber(serial) => ("serial_number = ?", vec![Value::Text(serial.clone())]),
            Self::ProfileStatus(status) => {
                ("dep_profile_status = ?", vec![Value::Text(status.clone())])
            }
            Self::ProvisionedOnly => ("dep_device = 1", Vec::new()),
        }
    }
}

impl QueryParam for DeviceFilter {
    fn as_filter(&self) -> Option<&DeviceFilter> {
        Some(self)
    }
}

/// Combined filter condition and its bound values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    fragments: Vec<&'static str>,
    values: Vec<Value>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Appends ` WHERE <a> AND <b> ...` to `base`, or returns it unchanged.
    pub fn append_to(&self, base: &str) -> String {
        if self.is_empty() {
            return base.to_string();
        }
        format!("{base} WHERE {}", self.fragments.join(" AND "))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Collects the filters among `params` into a single clause.
pub fn compose_where(params: &[&dyn QueryParam]) -> WhereClause {
    let mut clause = WhereClause::default();
    for filter in params.iter().filter_map(|param| param.as_filter()) {
        let (fragment, values) = filter.render();
        clause.fragments.push(fragment);
        clause.values.extend(values);
    }
    clause
}
