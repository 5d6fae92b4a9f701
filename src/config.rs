/// Settings that shape what the finalization conventions derive.
///
/// Similar in spirit to a connection configuration: every field has a
/// sensible default and a chained setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeConfig {
    /// Appended to the table name when a temporal entity declares no history table.
    pub history_table_suffix: String,

    /// Period-start property used when an entity is marked temporal without names.
    pub default_period_start: String,

    /// Period-end property used when an entity is marked temporal without names.
    pub default_period_end: String,

    /// Reject derived types whose own transient descriptor names different
    /// period properties than their root, instead of overwriting them.
    pub strict_temporal_markers: bool,

    /// Require hierarchies sharing a table to agree on temporal configuration.
    pub validate_shared_temporal: bool,
}

impl FinalizeConfig {
    pub fn new() -> Self {
        Self {
            history_table_suffix: "History".to_string(),
            default_period_start: "PeriodStart".to_string(),
            default_period_end: "PeriodEnd".to_string(),
            strict_temporal_markers: false,
            validate_shared_temporal: true,
        }
    }

    /// Set the history table suffix
    pub fn history_table_suffix(mut self, suffix: &str) -> Self {
        self.history_table_suffix = suffix.to_string();
        self
    }

    /// Set the default period property names
    pub fn default_period(mut self, start: &str, end: &str) -> Self {
        self.default_period_start = start.to_string();
        self.default_period_end = end.to_string();
        self
    }

    pub fn strict_temporal_markers(mut self, strict: bool) -> Self {
        self.strict_temporal_markers = strict;
        self
    }

    pub fn validate_shared_temporal(mut self, validate: bool) -> Self {
        self.validate_shared_temporal = validate;
        self
    }

    pub fn history_table_for(&self, table: &str) -> String {
        format!("{}{}", table, self.history_table_suffix)
    }
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FinalizeConfig::default();
        assert_eq!(config.history_table_for("Vehicles"), "VehiclesHistory");
        assert_eq!(config.default_period_start, "PeriodStart");
        assert!(!config.strict_temporal_markers);
        assert!(config.validate_shared_temporal);
    }

    #[test]
    fn test_builder_setters() {
        let config = FinalizeConfig::new()
            .history_table_suffix("_log")
            .default_period("SysStart", "SysEnd")
            .strict_temporal_markers(true);
        assert_eq!(config.history_table_for("orders"), "orders_log");
        assert_eq!(config.default_period_end, "SysEnd");
        assert!(config.strict_temporal_markers);
    }
}
