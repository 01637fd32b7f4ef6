//! Device type to backend routing

use appsload_common::LoadError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

/// Address of one key-value backend, e.g. `127.0.0.1:33013`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("Unknown device type: {0}")]
    UnknownDeviceType(String),
}

/// Immutable `device_type -> endpoint` mapping, built once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<String, EndpointId>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Fails closed: there is no default backend.
    pub fn lookup(&self, device_type: &str) -> Result<&EndpointId, RouteError> {
        self.routes
            .get(device_type)
            .ok_or_else(|| RouteError::UnknownDeviceType(device_type.to_string()))
    }

    /// Distinct endpoints, sorted
    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.routes
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn device_types(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Builder that rejects empty names and duplicate device types
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    routes: Vec<(String, String)>,
}

impl RouteTableBuilder {
    pub fn route(mut self, device_type: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.routes.push((device_type.into(), endpoint.into()));
        self
    }

    pub fn routes<I, K, V>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.routes
            .extend(routes.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn build(self) -> Result<RouteTable, LoadError> {
        let mut routes = HashMap::with_capacity(self.routes.len());

        for (device_type, endpoint) in self.routes {
            if device_type.is_empty() {
                return Err(LoadError::config("route with empty device type"));
            }
            if endpoint.trim().is_empty() {
                return Err(LoadError::config(format!(
                    "route for device type `{device_type}` has no endpoint"
                )));
            }
            if routes.contains_key(&device_type) {
                return Err(LoadError::config(format!(
                    "device type `{device_type}` is routed more than once"
                )));
            }
            routes.insert(device_type, EndpointId::new(endpoint.trim()));
        }

        if routes.is_empty() {
            return Err(LoadError::config("route table is empty"));
        }

        Ok(RouteTable { routes })
    }
}
