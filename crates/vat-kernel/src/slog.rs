use std::time::{Duration, Instant};

use log::Level;
use serde_json::Value;
use vat_slots::CapData;

use crate::vat::{VatId, VatKind};

/// The kernel's diagnostic record of vat lifecycle events.
pub trait KernelSlog: Send + Sync {
    fn add_vat(
        &self,
        vat_id: &VatId,
        kind: VatKind,
        description: &str,
        name: Option<&str>,
        bundle: &Value,
    );
    fn startup(&self, vat_id: &VatId) -> StartupSpan;
    fn terminate_vat(&self, vat_id: &VatId, should_reject: bool, info: &CapData);
}

/// Open interval between asking the factory for a manager and getting one.
#[must_use]
#[derive(Debug)]
pub struct StartupSpan {
    vat_id: VatId,
    started: Instant,
}

impl StartupSpan {
    pub fn new(vat_id: &VatId) -> Self {
        Self {
            vat_id: vat_id.clone(),
            started: Instant::now(),
        }
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.started.elapsed();
        log::debug!(target: "slog", "vat {} startup finished in {elapsed:?}", self.vat_id);
        elapsed
    }
}

/// Slog that writes through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSlog;

impl KernelSlog for LogSlog {
    fn add_vat(
        &self,
        vat_id: &VatId,
        kind: VatKind,
        description: &str,
        name: Option<&str>,
        bundle: &Value,
    ) {
        let format = bundle
            .get("moduleFormat")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        log::info!(
            target: "slog",
            "create-vat {vat_id} {kind} name={} format={format} {description}",
            name.unwrap_or("-"),
        );
    }

    fn startup(&self, vat_id: &VatId) -> StartupSpan {
        log::debug!(target: "slog", "vat {vat_id} startup begins");
        StartupSpan::new(vat_id)
    }

    fn terminate_vat(&self, vat_id: &VatId, should_reject: bool, info: &CapData) {
        log::info!(
            target: "slog",
            "terminate-vat {vat_id} reject={should_reject} info={}",
            info.body
        );
    }
}

/// Per-vat console. `vat` consoles carry output of the vat's own code, `ls`
/// consoles that of its liveslots layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VatConsole {
    target: String,
}

impl VatConsole {
    pub fn new(flavour: &str, vat_id: &VatId) -> Self {
        Self {
            target: format!("{flavour}::{vat_id}"),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn log(&self, level: Level, message: &str) {
        log::log!(target: self.target.as_str(), level, "{message}");
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consoles_are_scoped_per_vat() {
        let vat: VatId = "v7".into();
        assert_eq!(VatConsole::new("vat", &vat).target(), "vat::v7");
        assert_eq!(VatConsole::new("ls", &vat).target(), "ls::v7");
    }
}
