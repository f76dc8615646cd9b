use crate::options::ManagerType;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Name the admin vat is registered under with the keeper.
    pub admin_vat_name: String,
    /// Manager type used when a vat's options do not name one; if None, the
    /// factory chooses.
    pub default_manager_type: Option<ManagerType>,
    /// Whether static vats get within-vat metering.
    pub internal_metering_for_static: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            admin_vat_name: "vatAdmin".into(),
            default_manager_type: None,
            internal_metering_for_static: true,
        }
    }
}
