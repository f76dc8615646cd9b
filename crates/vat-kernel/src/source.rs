use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KernelError;
use crate::keeper::KernelKeeper;
use crate::vat::VatId;

/// Where a vat's code comes from: an inline bundle, or the name of a bundle
/// registered with the kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VatSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_name: Option<String>,
}

impl VatSource {
    pub fn bundle(bundle: Value) -> Self {
        Self {
            bundle: Some(bundle),
            bundle_name: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            bundle: None,
            bundle_name: Some(name.into()),
        }
    }

    /// Finds the bundle this source denotes. An inline bundle wins over a name.
    pub fn resolve_bundle(
        &self,
        vat_id: &VatId,
        keeper: &dyn KernelKeeper,
    ) -> Result<Value, KernelError> {
        if let Some(bundle) = &self.bundle {
            return Ok(bundle.clone());
        }
        let name = self
            .bundle_name
            .as_deref()
            .ok_or_else(|| KernelError::MissingBundle(vat_id.clone()))?;
        keeper
            .get_bundle(name)
            .ok_or_else(|| KernelError::BundleNotFound {
                vat_id: vat_id.clone(),
                name: name.to_string(),
            })
    }

    pub fn provenance(&self) -> String {
        match (&self.bundle, &self.bundle_name) {
            (Some(_), _) => "from source bundle".to_string(),
            (None, Some(name)) => format!("from bundleName: {name}"),
            (None, None) => "from nowhere".to_string(),
        }
    }

    /// Human-readable label for diagnostics, e.g. `"bank (from bundleName: bank)"`.
    pub fn describe(&self, description: &str) -> String {
        format!("{description} ({})", self.provenance())
            .trim()
            .to_string()
    }
}

/// Bundles are structured data; a bare string or number means the caller
/// handed over the wrong thing.
pub(crate) fn insist_bundle_shape(vat_id: &VatId, bundle: &Value) -> Result<(), KernelError> {
    let found = match bundle {
        Value::Object(_) => return Ok(()),
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
    };
    Err(KernelError::MalformedBundle {
        vat_id: vat_id.clone(),
        found,
    })
}
