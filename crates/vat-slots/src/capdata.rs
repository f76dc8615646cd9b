use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::SlotError;

/// Capability-bearing data: a JSON body in which capabilities appear only as
/// `{"@qclass": "slot", "index": N}` references into `slots`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapData {
    pub body: String,
    pub slots: Vec<String>,
}

impl CapData {
    pub fn new(body: &Value, slots: Vec<String>) -> Self {
        Self {
            body: body.to_string(),
            slots,
        }
    }

    /// Capdata carrying no capabilities.
    pub fn plain(body: &Value) -> Self {
        Self::new(body, Vec::new())
    }

    pub fn parse_body(&self) -> Result<Value, SlotError> {
        serde_json::from_str(&self.body).map_err(|err| SlotError::InvalidCapData(err.to_string()))
    }

    /// Checks that the body parses and that every slot reference in it points
    /// inside `slots`.
    pub fn insist(&self) -> Result<(), SlotError> {
        let body = self.parse_body()?;
        check_refs(&body, self.slots.len())
    }
}

/// The wire shape of a capability reference.
pub fn slot_ref(index: usize) -> Value {
    json!({ "@qclass": "slot", "index": index })
}

fn check_refs(value: &Value, slot_count: usize) -> Result<(), SlotError> {
    match value {
        Value::Array(items) => items.iter().try_for_each(|item| check_refs(item, slot_count)),
        Value::Object(map) => {
            if map.get("@qclass").and_then(Value::as_str) == Some("slot") {
                let index = map
                    .get("index")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| SlotError::InvalidCapData("slot ref without index".into()))?;
                if !usize::try_from(index).is_ok_and(|index| index < slot_count) {
                    return Err(SlotError::InvalidCapData(format!(
                        "slot ref {index} out of range ({slot_count} slots)"
                    )));
                }
                return Ok(());
            }
            map.values().try_for_each(|item| check_refs(item, slot_count))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_in_range_refs() {
        let data = CapData::new(&json!([{ "target": slot_ref(0) }]), vec!["ko4".into()]);
        data.insist().unwrap();
        assert_eq!(data.parse_body().unwrap()[0]["target"]["index"], 0);
    }

    #[test]
    fn rejects_dangling_ref() {
        let data = CapData::plain(&json!({ "x": slot_ref(1) }));
        assert!(matches!(data.insist(), Err(SlotError::InvalidCapData(_))));
    }

    #[test]
    fn rejects_ref_beyond_any_slot_table() {
        let body = json!({ "x": { "@qclass": "slot", "index": 1u64 << 32 } });
        let data = CapData::new(&body, vec!["ko1".into()]);
        assert!(matches!(data.insist(), Err(SlotError::InvalidCapData(_))));

        let body = json!({ "x": { "@qclass": "slot", "index": u64::MAX } });
        let data = CapData::new(&body, vec!["ko1".into()]);
        assert!(matches!(data.insist(), Err(SlotError::InvalidCapData(_))));
    }

    #[test]
    fn rejects_non_json_body() {
        let data = CapData {
            body: "not json".into(),
            slots: vec![],
        };
        assert!(data.insist().is_err());
    }
}
