//! Migrator-wide constants
//!
//! Single source of truth for configuration defaults and identifier syntax.

/// Default values for migrator configuration
pub mod defaults {
    /// Persisted variable that receives the migration memo
    pub const AUDIT_VARIABLE: &str = "migrationMemo";
    /// Name reported for root pointers
    pub const ROOT_POINTER_NAME: &str = process_graph::ROOT_POINTER_NAME;
    /// Whether the predecessor execution is ended after migrating
    pub const END_PREDECESSOR: bool = false;
}

/// Identifier syntax
pub mod identifiers {
    /// Prefix marking a current identifier as resolved at runtime
    pub const DYNAMIC_PREFIX: &str = "dynamic://";
}

/// Numbered step lookup
pub mod steps {
    /// Digits in a step revision suffix (`order001`)
    pub const REVISION_WIDTH: usize = 3;
    /// Highest revision a numbered lookup will probe
    pub const MAX_REVISION: u32 = 999;
}
