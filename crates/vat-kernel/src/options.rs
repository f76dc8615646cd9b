use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::KernelError;
use crate::vat::VatKind;

const DYNAMIC_OPTIONS: &[&str] = &[
    "description",
    "metered",
    "managerType",
    "vatParameters",
    "enableSetup",
    "enablePipelining",
    "virtualObjectCacheSize",
];

const STATIC_OPTIONS: &[&str] = &[
    "description",
    "name",
    "vatParameters",
    "managerType",
    "enableDisavow",
    "enableSetup",
    "enablePipelining",
    "virtualObjectCacheSize",
];

impl VatKind {
    pub fn allowed_options(self) -> &'static [&'static str] {
        match self {
            VatKind::Dynamic => DYNAMIC_OPTIONS,
            VatKind::Static => STATIC_OPTIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagerType {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "nodeWorker")]
    NodeWorker,
    #[serde(rename = "node-subprocess")]
    NodeSubprocess,
    #[serde(rename = "xs-worker")]
    XsWorker,
}

/// Options as supplied by whoever asked for the vat. Every field is optional;
/// which ones may be set depends on the [`VatKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_type: Option<ManagerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_setup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_disavow: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_pipelining: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_object_cache_size: Option<u64>,
}

/// Options after validation, with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVatOptions {
    pub description: String,
    pub name: Option<String>,
    pub metered: bool,
    pub manager_type: Option<ManagerType>,
    pub vat_parameters: Value,
    pub enable_setup: bool,
    pub enable_disavow: bool,
    pub enable_pipelining: bool,
    pub virtual_object_cache_size: Option<u64>,
}

impl VatOptions {
    /// Parses an options bag, rejecting keys outside the allow-list for
    /// `kind` before any value is looked at.
    pub fn from_json(value: &Value, kind: VatKind) -> Result<Self, KernelError> {
        let empty = Map::new();
        let map = match value {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(KernelError::InvalidOptions("options must be an object".into())),
        };
        check_allowed(map.keys().map(String::as_str), kind)?;
        serde_json::from_value(Value::Object(map.clone()))
            .map_err(|err| KernelError::InvalidOptions(err.to_string()))
    }

    /// Names of the options that are set, in their wire spelling.
    pub fn present_keys(&self) -> Vec<&'static str> {
        let fields = [
            ("description", self.description.is_some()),
            ("name", self.name.is_some()),
            ("metered", self.metered.is_some()),
            ("managerType", self.manager_type.is_some()),
            ("vatParameters", self.vat_parameters.is_some()),
            ("enableSetup", self.enable_setup.is_some()),
            ("enableDisavow", self.enable_disavow.is_some()),
            ("enablePipelining", self.enable_pipelining.is_some()),
            ("virtualObjectCacheSize", self.virtual_object_cache_size.is_some()),
        ];
        fields
            .into_iter()
            .filter_map(|(key, set)| set.then_some(key))
            .collect()
    }

    pub fn validate(&self, kind: VatKind) -> Result<(), KernelError> {
        check_allowed(self.present_keys().into_iter(), kind)
    }

    /// Validates and applies defaults. Dynamic vats are metered unless told
    /// otherwise; static vats are never metered.
    pub fn resolve(&self, kind: VatKind) -> Result<ResolvedVatOptions, KernelError> {
        self.validate(kind)?;
        let metered = match kind {
            VatKind::Dynamic => self.metered.unwrap_or(true),
            VatKind::Static => false,
        };
        Ok(ResolvedVatOptions {
            description: self.description.clone().unwrap_or_default(),
            name: self.name.clone(),
            metered,
            manager_type: self.manager_type,
            vat_parameters: self
                .vat_parameters
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new())),
            enable_setup: self.enable_setup.unwrap_or(false),
            enable_disavow: self.enable_disavow.unwrap_or(false),
            enable_pipelining: self.enable_pipelining.unwrap_or(false),
            virtual_object_cache_size: self.virtual_object_cache_size,
        })
    }
}

fn check_allowed<'a>(
    keys: impl Iterator<Item = &'a str>,
    kind: VatKind,
) -> Result<(), KernelError> {
    let allowed = kind.allowed_options();
    let unknown: Vec<String> = keys
        .filter(|key| !allowed.iter().any(|allowed| allowed == key))
        .map(str::to_string)
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(KernelError::UnknownOptions { kind, keys: unknown })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_key_is_rejected() {
        let err = VatOptions::from_json(&json!({ "fooBar": 1 }), VatKind::Dynamic).unwrap_err();
        assert_eq!(
            err,
            KernelError::UnknownOptions {
                kind: VatKind::Dynamic,
                keys: vec!["fooBar".into()],
            }
        );
        assert_eq!(err.to_string(), "unknown options for dynamic vat: fooBar");
    }

    #[test]
    fn allow_lists_differ_by_kind() {
        let err = VatOptions::from_json(&json!({ "name": "bank" }), VatKind::Dynamic).unwrap_err();
        assert!(matches!(err, KernelError::UnknownOptions { .. }));
        VatOptions::from_json(&json!({ "name": "bank" }), VatKind::Static).unwrap();

        let err = VatOptions::from_json(&json!({ "metered": true }), VatKind::Static).unwrap_err();
        assert!(matches!(err, KernelError::UnknownOptions { .. }));
        let err =
            VatOptions::from_json(&json!({ "enableDisavow": true }), VatKind::Dynamic).unwrap_err();
        assert!(matches!(err, KernelError::UnknownOptions { .. }));
    }

    #[test]
    fn typed_options_use_the_same_allow_list() {
        let options = VatOptions {
            metered: Some(false),
            ..VatOptions::default()
        };
        options.validate(VatKind::Dynamic).unwrap();
        assert!(matches!(
            options.resolve(VatKind::Static),
            Err(KernelError::UnknownOptions { .. })
        ));
    }

    #[test]
    fn badly_typed_value_is_invalid() {
        let err = VatOptions::from_json(&json!({ "metered": "yes" }), VatKind::Dynamic).unwrap_err();
        assert!(matches!(err, KernelError::InvalidOptions(_)));
        let err = VatOptions::from_json(&json!(["metered"]), VatKind::Dynamic).unwrap_err();
        assert!(matches!(err, KernelError::InvalidOptions(_)));
    }

    #[test]
    fn defaults_for_dynamic_vat() {
        let resolved = VatOptions::from_json(&Value::Null, VatKind::Dynamic)
            .unwrap()
            .resolve(VatKind::Dynamic)
            .unwrap();
        assert!(resolved.metered);
        assert_eq!(resolved.vat_parameters, json!({}));
        assert!(!resolved.enable_setup);
        assert!(!resolved.enable_pipelining);
        assert!(!resolved.enable_disavow);
        assert_eq!(resolved.description, "");
        assert_eq!(resolved.manager_type, None);
    }

    #[test]
    fn explicit_values_survive_resolution() {
        let options = VatOptions::from_json(
            &json!({
                "description": "bank",
                "metered": false,
                "managerType": "xs-worker",
                "vatParameters": { "limit": 3 },
                "enablePipelining": true,
                "virtualObjectCacheSize": 50,
            }),
            VatKind::Dynamic,
        )
        .unwrap();
        let resolved = options.resolve(VatKind::Dynamic).unwrap();
        assert!(!resolved.metered);
        assert_eq!(resolved.manager_type, Some(ManagerType::XsWorker));
        assert_eq!(resolved.vat_parameters, json!({ "limit": 3 }));
        assert!(resolved.enable_pipelining);
        assert_eq!(resolved.virtual_object_cache_size, Some(50));
    }

    #[test]
    fn static_vats_are_never_metered() {
        let options = VatOptions::from_json(&json!({ "enableDisavow": true }), VatKind::Static)
            .unwrap();
        let resolved = options.resolve(VatKind::Static).unwrap();
        assert!(!resolved.metered);
        assert!(resolved.enable_disavow);
    }
}
