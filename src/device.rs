// src/device.rs

//! Device specifications supplied by callers
//!
//! A device spec is passed through to `bundletool extract-apks` as a JSON
//! document. Only `supportedAbis` is interpreted here (it drives package
//! selection); every other field is carried verbatim.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File name of the spec document inside an extraction directory
pub const DEVICE_SPEC_FILENAME: &str = "device-spec.json";

/// Target device description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    /// Platform SDK version, as supplied by the caller
    pub sdk_version: String,
    /// Supported ABIs in the caller's preference order
    pub supported_abis: Vec<String>,
    /// Remaining fields (screenDensity, supportedLocales, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceSpec {
    pub fn new(sdk_version: impl Into<String>, supported_abis: Vec<String>) -> Self {
        Self {
            sdk_version: sdk_version.into(),
            supported_abis,
            extra: Map::new(),
        }
    }

    /// Parse and validate a caller-supplied JSON value
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidDeviceSpec("device spec must be an object".to_string()))?;

        match object.get("sdkVersion") {
            Some(Value::String(v)) if !v.is_empty() => {}
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(Error::InvalidDeviceSpec("sdkVersion is required".to_string()));
            }
            Some(_) => {
                return Err(Error::InvalidDeviceSpec("sdkVersion must be a string".to_string()));
            }
        }

        match object.get("supportedAbis") {
            Some(Value::Array(abis)) => {
                if abis.is_empty() {
                    return Err(Error::InvalidDeviceSpec(
                        "supportedAbis must list at least one ABI".to_string(),
                    ));
                }
                if !abis.iter().all(Value::is_string) {
                    return Err(Error::InvalidDeviceSpec(
                        "supportedAbis must contain only strings".to_string(),
                    ));
                }
            }
            Some(Value::Null) | None => {
                return Err(Error::InvalidDeviceSpec("supportedAbis is required".to_string()));
            }
            Some(_) => {
                return Err(Error::InvalidDeviceSpec(
                    "supportedAbis must be an array".to_string(),
                ));
            }
        }

        let spec: DeviceSpec = serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidDeviceSpec(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check the invariants that `from_value` enforces
    ///
    /// Specs built in code bypass parsing, so the extraction stage re-checks
    /// before spending a process invocation.
    pub fn validate(&self) -> Result<()> {
        if self.sdk_version.trim().is_empty() {
            return Err(Error::InvalidDeviceSpec("sdkVersion is required".to_string()));
        }
        if self.supported_abis.is_empty() {
            return Err(Error::InvalidDeviceSpec(
                "supportedAbis must list at least one ABI".to_string(),
            ));
        }
        if self.supported_abis.iter().any(|abi| abi.trim().is_empty()) {
            return Err(Error::InvalidDeviceSpec(
                "supportedAbis must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to the document handed to the conversion tool
    pub fn to_document(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("Failed to serialize device spec: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn assert_invalid(value: Value) {
        let err = DeviceSpec::from_value(&value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDeviceSpec, "accepted {value}");
    }

    #[test]
    fn test_parse_minimal_spec() {
        let spec = DeviceSpec::from_value(&json!({
            "sdkVersion": "33",
            "supportedAbis": ["arm64-v8a", "armeabi-v7a"]
        }))
        .unwrap();
        assert_eq!(spec.sdk_version, "33");
        assert_eq!(spec.supported_abis, vec!["arm64-v8a", "armeabi-v7a"]);
        assert!(spec.extra.is_empty());
    }

    #[test]
    fn test_extra_fields_pass_through() {
        let value = json!({
            "sdkVersion": "31",
            "supportedAbis": ["x86_64"],
            "screenDensity": 420,
            "supportedLocales": ["en", "ar"]
        });
        let spec = DeviceSpec::from_value(&value).unwrap();
        let document: Value = serde_json::from_slice(&spec.to_document().unwrap()).unwrap();
        assert_eq!(document, value);
    }

    #[test]
    fn test_rejects_missing_fields() {
        assert_invalid(json!({ "supportedAbis": ["x86"] }));
        assert_invalid(json!({ "sdkVersion": "33" }));
        assert_invalid(json!({}));
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert_invalid(json!(null));
        assert_invalid(json!("33"));
        assert_invalid(json!({ "sdkVersion": 33, "supportedAbis": ["x86"] }));
        assert_invalid(json!({ "sdkVersion": "", "supportedAbis": ["x86"] }));
        assert_invalid(json!({ "sdkVersion": "33", "supportedAbis": "x86" }));
        assert_invalid(json!({ "sdkVersion": "33", "supportedAbis": [] }));
        assert_invalid(json!({ "sdkVersion": "33", "supportedAbis": [64] }));
    }

    #[test]
    fn test_validate_constructed_spec() {
        assert!(DeviceSpec::new("33", vec!["x86".into()]).validate().is_ok());
        assert!(DeviceSpec::new("33", vec![]).validate().is_err());
        assert!(DeviceSpec::new(" ", vec!["x86".into()]).validate().is_err());
    }
}
