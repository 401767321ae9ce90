//! Representations of entities producing telemetry.
//!
//! A [`Resource`] is a set of static attributes describing the process that
//! emits spans — service name, version, listening port. It is built once at
//! provider construction, never mutated, and stamped onto every exported
//! batch by the exporters.

use crate::common::{KeyValue, Value};
use std::borrow::Cow;

/// Attribute key for the logical name of the service.
pub const SERVICE_NAME: &str = "service.name";
/// Attribute key for the version of the service.
pub const SERVICE_VERSION: &str = "service.version";
/// Attribute key for the port the service listens on.
pub const SERVICE_PORT: &str = "service.port";

/// An immutable representation of the entity producing telemetry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    attrs: Vec<KeyValue>,
}

impl Resource {
    /// Create an empty resource.
    pub fn empty() -> Self {
        Resource::default()
    }

    /// Create a [`ResourceBuilder`] to construct a `Resource`.
    pub fn builder() -> ResourceBuilder {
        ResourceBuilder::default()
    }

    /// Retrieve the value for the given key, if it exists.
    ///
    /// When a key was supplied more than once the last value wins.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs
            .iter()
            .rev()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    /// Iterate over the resource attributes.
    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.attrs.iter()
    }

    /// Number of attributes in this resource.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Returns `true` if the resource has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// Builder for [`Resource`].
#[derive(Debug, Default)]
pub struct ResourceBuilder {
    attrs: Vec<KeyValue>,
}

impl ResourceBuilder {
    /// Set the [`SERVICE_NAME`] attribute.
    pub fn with_service_name(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.with_attribute(KeyValue::new(SERVICE_NAME, name.into().into_owned()))
    }

    /// Add a single attribute.
    pub fn with_attribute(mut self, kv: KeyValue) -> Self {
        self.attrs.push(kv);
        self
    }

    /// Add multiple attributes.
    pub fn with_attributes<T: IntoIterator<Item = KeyValue>>(mut self, attrs: T) -> Self {
        self.attrs.extend(attrs);
        self
    }

    /// Build the [`Resource`].
    pub fn build(self) -> Resource {
        Resource { attrs: self.attrs }
    }
}
