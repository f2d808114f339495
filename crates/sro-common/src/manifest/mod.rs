//! Resource document model
//!
//! Manifests are handled as generic documents: a JSON object identified by
//! `(apiVersion, kind, namespace, name)` with arbitrary nested fields. Field
//! access goes through typed accessors that return `None` when a field is
//! absent or has a different type, so "may be absent" is explicit at every
//! call site.

mod split;

pub use split::{split, Document, Documents};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde_json::{Map, Value};

use crate::Error;

/// A path of object keys into a document, e.g. `["metadata", "resourceVersion"]`
pub type FieldPath = &'static [&'static str];

/// Path of the optimistic concurrency token
pub const RESOURCE_VERSION_PATH: FieldPath = &["metadata", "resourceVersion"];

/// A single cluster resource document
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceObject {
    value: Value,
}

impl ResourceObject {
    /// Wrap a parsed document.
    ///
    /// The document must be an object with string `apiVersion`, `kind` and
    /// `metadata.name` fields.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        if !value.is_object() {
            return Err(Error::serialization("manifest document is not a mapping"));
        }
        let obj = Self { value };
        if obj.nested_str(&["apiVersion"]).is_none() {
            return Err(Error::serialization("manifest missing apiVersion"));
        }
        let kind = obj
            .nested_str(&["kind"])
            .ok_or_else(|| Error::serialization("manifest missing kind"))?;
        if obj.nested_str(&["metadata", "name"]).is_none() {
            return Err(Error::serialization_for_kind(
                kind,
                "manifest missing metadata.name",
            ));
        }
        Ok(obj)
    }

    /// Build a document from identity fields only
    pub fn new(api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::String(name.to_string()));
        if let Some(ns) = namespace {
            metadata.insert("namespace".to_string(), Value::String(ns.to_string()));
        }
        let mut root = Map::new();
        root.insert(
            "apiVersion".to_string(),
            Value::String(api_version.to_string()),
        );
        root.insert("kind".to_string(), Value::String(kind.to_string()));
        root.insert("metadata".to_string(), Value::Object(metadata));
        Self {
            value: Value::Object(root),
        }
    }

    /// apiVersion of the resource
    pub fn api_version(&self) -> &str {
        self.nested_str(&["apiVersion"]).unwrap_or_default()
    }

    /// Kind of the resource
    pub fn kind(&self) -> &str {
        self.nested_str(&["kind"]).unwrap_or_default()
    }

    /// metadata.name
    pub fn name(&self) -> &str {
        self.nested_str(&["metadata", "name"]).unwrap_or_default()
    }

    /// metadata.namespace, if set and non-empty
    pub fn namespace(&self) -> Option<&str> {
        self.nested_str(&["metadata", "namespace"])
            .filter(|ns| !ns.is_empty())
    }

    /// Set or clear metadata.namespace
    pub fn set_namespace(&mut self, namespace: Option<&str>) {
        let metadata = self.metadata_mut();
        match namespace {
            Some(ns) => {
                metadata.insert("namespace".to_string(), Value::String(ns.to_string()));
            }
            None => {
                metadata.remove("namespace");
            }
        }
    }

    /// Identity used in logs and errors: `kind/namespace/name`
    pub fn identity(&self) -> String {
        format!(
            "{}/{}/{}",
            self.kind(),
            self.namespace().unwrap_or_default(),
            self.name()
        )
    }

    /// Look up a nested field
    pub fn nested(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.value, |current, key| current.as_object()?.get(*key))
    }

    /// Look up a nested string field
    pub fn nested_str(&self, path: &[&str]) -> Option<&str> {
        self.nested(path).and_then(Value::as_str)
    }

    /// Set a nested field, creating intermediate objects as needed.
    ///
    /// Fails if an intermediate field exists but is not an object.
    pub fn set_nested(&mut self, path: &[&str], value: Value) -> Result<(), Error> {
        let Some((last, parents)) = path.split_last() else {
            return Err(Error::serialization("empty field path"));
        };
        let mut current = &mut self.value;
        for key in parents {
            let map = current.as_object_mut().ok_or_else(|| {
                Error::serialization(format!("field {} is not an object", key))
            })?;
            current = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let map = current.as_object_mut().ok_or_else(|| {
            Error::serialization(format!("parent of field {} is not an object", last))
        })?;
        map.insert(last.to_string(), value);
        Ok(())
    }

    /// metadata.resourceVersion, if present
    pub fn resource_version(&self) -> Option<&str> {
        self.nested_str(RESOURCE_VERSION_PATH)
    }

    /// Look up an annotation value
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.nested(&["metadata", "annotations"])
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
    }

    /// Owner references currently recorded on the object
    pub fn owner_references(&self) -> Vec<OwnerReference> {
        self.nested(&["metadata", "ownerReferences"])
            .and_then(|refs| serde_json::from_value(refs.clone()).ok())
            .unwrap_or_default()
    }

    /// Record `owner` as the controlling owner.
    ///
    /// An existing reference with the same uid is replaced, so repeated
    /// injection never duplicates entries.
    pub fn set_controller_reference(&mut self, owner: OwnerReference) -> Result<(), Error> {
        let mut refs = self.owner_references();
        if let Some(existing) = refs
            .iter()
            .find(|r| r.controller == Some(true) && r.uid != owner.uid)
        {
            return Err(Error::serialization_for_kind(
                self.kind(),
                format!(
                    "{} is already controlled by {} {}",
                    self.identity(),
                    existing.kind,
                    existing.name
                ),
            ));
        }
        refs.retain(|r| r.uid != owner.uid);
        refs.push(owner);
        let refs = serde_json::to_value(refs).map_err(|e| Error::serialization(e.to_string()))?;
        self.metadata_mut()
            .insert("ownerReferences".to_string(), refs);
        Ok(())
    }

    /// Borrow the underlying JSON document
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        let root = self
            .value
            .as_object_mut()
            .expect("ResourceObject is always constructed from an object");
        let metadata = root
            .entry("metadata".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Map::new());
        }
        metadata
            .as_object_mut()
            .expect("metadata was just replaced with an object")
    }
}
