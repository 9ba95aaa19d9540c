//! Representations of the entity producing telemetry.
//!
//! A [Resource] is an immutable set of attributes identifying the process
//! emitting spans, for example its service name. It is set once when the
//! [`TracerProvider`] is built and shared read-only by every span the
//! provider's tracers produce.
//!
//! [`TracerProvider`]: crate::trace::TracerProvider

use crate::{Key, KeyValue, Value};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

/// Environment variable holding extra resource attributes as a comma separated
/// list of `key=value` pairs.
pub const MICROTEL_RESOURCE_ATTRIBUTES: &str = "MICROTEL_RESOURCE_ATTRIBUTES";
/// Environment variable overriding the service name.
pub const MICROTEL_SERVICE_NAME: &str = "MICROTEL_SERVICE_NAME";

/// Attribute key under which the service name is recorded.
pub const SERVICE_NAME: Key = Key::from_static_str("service.name");

const DEFAULT_SERVICE_NAME: &str = "unknown_service";

#[derive(Debug, Clone, PartialEq)]
struct ResourceInner {
    attrs: HashMap<Key, Value>,
}

/// An immutable representation of the entity producing telemetry as attributes.
///
/// Uses `Arc` internally so cloning is cheap and all spans of a provider share
/// one copy.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl Default for Resource {
    fn default() -> Self {
        Resource::builder().build()
    }
}

impl Resource {
    /// Creates a [ResourceBuilder] pre-populated from the environment: a
    /// default service name, plus any attributes found in
    /// [`MICROTEL_RESOURCE_ATTRIBUTES`] and [`MICROTEL_SERVICE_NAME`].
    pub fn builder() -> ResourceBuilder {
        let mut attrs = HashMap::new();
        attrs.insert(SERVICE_NAME, Value::from(DEFAULT_SERVICE_NAME));
        for kv in attributes_from_env() {
            attrs.insert(kv.key, kv.value);
        }
        if let Ok(service_name) = env::var(MICROTEL_SERVICE_NAME) {
            if !service_name.is_empty() {
                attrs.insert(SERVICE_NAME, Value::from(service_name));
            }
        }
        ResourceBuilder {
            resource: Resource {
                inner: Arc::new(ResourceInner { attrs }),
            },
        }
    }

    /// Creates a [ResourceBuilder] with no attributes and no environment
    /// detection.
    pub fn builder_empty() -> ResourceBuilder {
        ResourceBuilder {
            resource: Resource::empty(),
        }
    }

    /// Creates an empty resource.
    pub(crate) fn empty() -> Self {
        Resource {
            inner: Arc::new(ResourceInner {
                attrs: HashMap::new(),
            }),
        }
    }

    /// Retrieve the attribute value for the given key, if present.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.inner.attrs.get(key)
    }

    /// Returns an iterator over the contained attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.inner.attrs.iter()
    }

    /// Number of attributes in this resource.
    pub fn len(&self) -> usize {
        self.inner.attrs.len()
    }

    /// Whether the resource is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.attrs.is_empty()
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Builder for [Resource].
#[derive(Debug)]
pub struct ResourceBuilder {
    resource: Resource,
}

impl ResourceBuilder {
    /// Add the `service.name` attribute.
    pub fn with_service_name(self, name: impl Into<Value>) -> Self {
        self.with_attribute(KeyValue {
            key: SERVICE_NAME,
            value: name.into(),
        })
    }

    /// Add a single attribute. Last write wins when keys collide.
    pub fn with_attribute(mut self, kv: KeyValue) -> Self {
        let inner = Arc::make_mut(&mut self.resource.inner);
        inner.attrs.insert(kv.key, kv.value);
        self
    }

    /// Add multiple attributes. Last write wins when keys collide.
    pub fn with_attributes<T: IntoIterator<Item = KeyValue>>(mut self, attrs: T) -> Self {
        let inner = Arc::make_mut(&mut self.resource.inner);
        for kv in attrs {
            inner.attrs.insert(kv.key, kv.value);
        }
        self
    }

    /// Build the immutable [Resource].
    pub fn build(self) -> Resource {
        self.resource
    }
}

fn attributes_from_env() -> Vec<KeyValue> {
    env::var(MICROTEL_RESOURCE_ATTRIBUTES)
        .ok()
        .map(|raw| {
            raw.split(',')
                .filter_map(|entry| {
                    let (key, value) = entry.split_once('=')?;
                    let (key, value) = (key.trim(), value.trim());
                    if key.is_empty() || value.is_empty() {
                        return None;
                    }
                    Some(KeyValue::new(key.to_owned(), value.to_owned()))
                })
                .collect()
        })
        .unwrap_or_default()
}
