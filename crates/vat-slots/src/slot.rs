use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SlotError;

/// What a slot denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Object,
    Promise,
    Device,
}

impl SlotKind {
    pub const fn prefix(self) -> char {
        match self {
            SlotKind::Object => 'o',
            SlotKind::Promise => 'p',
            SlotKind::Device => 'd',
        }
    }

    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            'o' => Some(SlotKind::Object),
            'p' => Some(SlotKind::Promise),
            'd' => Some(SlotKind::Device),
            _ => None,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SlotKind::Object => "object",
            SlotKind::Promise => "promise",
            SlotKind::Device => "device",
        })
    }
}

/// A slot as seen from inside a vat: `o+5` was allocated by the vat itself
/// (an export), `o-5` by the kernel (an import).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct VatSlot {
    pub kind: SlotKind,
    pub allocated_by_vat: bool,
    pub index: u64,
}

impl VatSlot {
    pub const fn new(kind: SlotKind, allocated_by_vat: bool, index: u64) -> Self {
        Self {
            kind,
            allocated_by_vat,
            index,
        }
    }

    /// The slot every vat exports its root object under.
    pub const fn root_object() -> Self {
        Self::new(SlotKind::Object, true, 0)
    }

    pub fn insist_kind(&self, expected: SlotKind) -> Result<(), SlotError> {
        if self.kind != expected {
            return Err(SlotError::WrongKind {
                slot: self.to_string(),
                expected,
            });
        }
        Ok(())
    }
}

impl fmt::Display for VatSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.allocated_by_vat { '+' } else { '-' };
        write!(f, "{}{}{}", self.kind.prefix(), sign, self.index)
    }
}

impl FromStr for VatSlot {
    type Err = SlotError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = split_kind(text, text)?;
        let (allocated_by_vat, digits) = split_sign(text, rest)?;
        Ok(Self::new(kind, allocated_by_vat, parse_index(text, digits)?))
    }
}

/// A slot in the kernel's own numbering space: `ko12`, `kp3`, `kd1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct KernelSlot {
    pub kind: SlotKind,
    pub index: u64,
}

impl KernelSlot {
    pub const fn new(kind: SlotKind, index: u64) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for KernelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k{}{}", self.kind.prefix(), self.index)
    }
}

impl FromStr for KernelSlot {
    type Err = SlotError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let rest = text
            .strip_prefix('k')
            .ok_or_else(|| SlotError::malformed(text, "kernel slots start with 'k'"))?;
        let (kind, digits) = split_kind(text, rest)?;
        Ok(Self::new(kind, parse_index(text, digits)?))
    }
}

/// A slot in the numbering space shared with one remote machine.
///
/// The sign records which side minted the index, from the point of view of
/// whoever receives the reference: `ro+12` was allocated by the recipient,
/// `ro-12` by the sender. The same underlying object is therefore written
/// with opposite signs depending on direction, and [`RemoteSlot::flip`]
/// converts between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RemoteSlot {
    pub kind: SlotKind,
    pub allocated_by_recipient: bool,
    pub index: u64,
}

impl RemoteSlot {
    pub const fn new(kind: SlotKind, allocated_by_recipient: bool, index: u64) -> Self {
        Self {
            kind,
            allocated_by_recipient,
            index,
        }
    }

    /// Inbound form to outbound form and back. Self-inverse.
    #[must_use]
    pub const fn flip(self) -> Self {
        Self {
            allocated_by_recipient: !self.allocated_by_recipient,
            ..self
        }
    }
}

impl fmt::Display for RemoteSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.allocated_by_recipient { '+' } else { '-' };
        write!(f, "r{}{}{}", self.kind.prefix(), sign, self.index)
    }
}

impl FromStr for RemoteSlot {
    type Err = SlotError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let rest = text
            .strip_prefix('r')
            .ok_or_else(|| SlotError::malformed(text, "remote slots start with 'r'"))?;
        let (kind, rest) = split_kind(text, rest)?;
        let (allocated_by_recipient, digits) = split_sign(text, rest)?;
        Ok(Self::new(
            kind,
            allocated_by_recipient,
            parse_index(text, digits)?,
        ))
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {$(
        impl From<$ty> for String {
            fn from(slot: $ty) -> String {
                slot.to_string()
            }
        }

        impl TryFrom<String> for $ty {
            type Error = SlotError;

            fn try_from(text: String) -> Result<Self, Self::Error> {
                text.parse()
            }
        }
    )*};
}

string_conversions!(VatSlot, KernelSlot, RemoteSlot);

fn split_kind<'a>(text: &str, rest: &'a str) -> Result<(SlotKind, &'a str), SlotError> {
    let mut chars = rest.chars();
    let kind = chars
        .next()
        .and_then(SlotKind::from_prefix)
        .ok_or_else(|| SlotError::malformed(text, "unknown slot kind"))?;
    Ok((kind, chars.as_str()))
}

fn split_sign<'a>(text: &str, rest: &'a str) -> Result<(bool, &'a str), SlotError> {
    if let Some(digits) = rest.strip_prefix('+') {
        Ok((true, digits))
    } else if let Some(digits) = rest.strip_prefix('-') {
        Ok((false, digits))
    } else {
        Err(SlotError::malformed(text, "missing allocator sign"))
    }
}

fn parse_index(text: &str, digits: &str) -> Result<u64, SlotError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SlotError::malformed(text, "index must be decimal digits"));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(SlotError::malformed(text, "index has leading zeros"));
    }
    digits
        .parse()
        .map_err(|_| SlotError::malformed(text, "index out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_is_self_inverse() {
        let inbound = RemoteSlot::new(SlotKind::Object, true, 12);
        assert_eq!(inbound.flip().to_string(), "ro-12");
        assert_eq!(inbound.flip().flip(), inbound);
        assert_ne!(inbound.flip(), inbound);
    }

    #[test]
    fn textual_forms_do_not_overlap() {
        let vat = VatSlot::new(SlotKind::Object, false, 5);
        let kernel = KernelSlot::new(SlotKind::Object, 5);
        let remote = RemoteSlot::new(SlotKind::Object, false, 5);
        assert_eq!(vat.to_string(), "o-5");
        assert_eq!(kernel.to_string(), "ko5");
        assert_eq!(remote.to_string(), "ro-5");

        assert!("o-5".parse::<RemoteSlot>().is_err());
        assert!("ro-5".parse::<VatSlot>().is_err());
        assert!("ko5".parse::<VatSlot>().is_err());
    }

    #[test]
    fn parses_each_kind() {
        assert_eq!(
            "p+3".parse::<VatSlot>().unwrap(),
            VatSlot::new(SlotKind::Promise, true, 3)
        );
        assert_eq!(
            "kd1".parse::<KernelSlot>().unwrap(),
            KernelSlot::new(SlotKind::Device, 1)
        );
        assert_eq!(
            "ro+0".parse::<RemoteSlot>().unwrap(),
            RemoteSlot::new(SlotKind::Object, true, 0)
        );
    }

    #[test]
    fn rejects_sloppy_indices() {
        for text in ["o+", "o+05", "o+-1", "o+ 1", "o+1a", "o5", "x+1"] {
            assert!(text.parse::<VatSlot>().is_err(), "{text} should not parse");
        }
    }

    #[test]
    fn insist_kind_reports_slot() {
        let slot: VatSlot = "p-4".parse().unwrap();
        let err = slot.insist_kind(SlotKind::Object).unwrap_err();
        assert_eq!(err.to_string(), "slot 'p-4' is not of kind object");
    }

    #[test]
    fn serde_uses_textual_form() {
        let slot = RemoteSlot::new(SlotKind::Promise, false, 9);
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(json, "\"rp-9\"");
        let back: RemoteSlot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slot);
    }
}
