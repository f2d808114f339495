//! YAML parsing using yaml-rust2
//!
//! Manifest documents are converted to `serde_json::Value` so the rest of the
//! operator works with a single document model. JSON is a subset of YAML, so
//! JSON documents take the same path.

use serde_json::{Map, Number, Value};
use thiserror::Error;
use yaml_rust2::{Yaml, YamlLoader};

/// Error type for YAML parsing
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct YamlError(String);

/// Parse a single YAML document into a `serde_json::Value`.
///
/// Returns `Value::Null` for input that contains no document (empty or
/// comments only). Input holding more than one document is rejected, since
/// callers split streams before parsing.
pub fn parse_yaml(input: &str) -> Result<Value, YamlError> {
    let docs = YamlLoader::load_from_str(input).map_err(|e| YamlError(e.to_string()))?;
    let mut docs = docs.into_iter();
    let first = match docs.next() {
        Some(doc) => yaml_to_json(doc)?,
        None => return Ok(Value::Null),
    };
    if docs.next().is_some() {
        return Err(YamlError(
            "expected a single document, found a document separator".to_string(),
        ));
    }
    Ok(first)
}

fn yaml_to_json(yaml: Yaml) -> Result<Value, YamlError> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|e: std::num::ParseFloatError| YamlError(e.to_string()))?;
            Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(arr) => arr
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(map) => map
            .into_iter()
            .map(|(k, v)| {
                let key = match k {
                    Yaml::String(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Real(r) => r,
                    Yaml::Boolean(b) => b.to_string(),
                    Yaml::Null => "null".to_string(),
                    _ => return Err(YamlError("unsupported YAML key type".to_string())),
                };
                yaml_to_json(v).map(|v| (key, v))
            })
            .collect::<Result<Map<String, Value>, _>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(YamlError("YAML aliases not supported".to_string())),
        Yaml::BadValue => Err(YamlError("bad YAML value".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_document() {
        let yaml = r#"
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: driver
  annotations:
    specialresource.openshift.io/state: driver-container
spec:
  template:
    spec:
      hostPID: true
"#;
        let value = parse_yaml(yaml).unwrap();
        assert_eq!(value["kind"], "DaemonSet");
        assert_eq!(
            value["metadata"]["annotations"]["specialresource.openshift.io/state"],
            "driver-container"
        );
        assert_eq!(value["spec"]["template"]["spec"]["hostPID"], true);
    }

    #[test]
    fn test_parse_json_document() {
        let value = parse_yaml(r#"{"apiVersion": "v1", "kind": "ServiceAccount"}"#).unwrap();
        assert_eq!(value["kind"], "ServiceAccount");
    }

    #[test]
    fn test_comment_only_document_is_null() {
        assert_eq!(parse_yaml("# nothing here\n").unwrap(), Value::Null);
        assert_eq!(parse_yaml("").unwrap(), Value::Null);
    }

    #[test]
    fn test_multiple_documents_rejected() {
        assert!(parse_yaml("a: 1\n---\nb: 2\n").is_err());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(parse_yaml("not: valid: yaml: {{").is_err());
    }
}
