//! Lowering configuration.

/// Default upper bound on the number of entries in a dense switch table.
pub const DEFAULT_MAX_TABLE_ENTRIES: u32 = 65_536;

/// Options controlling how a nest is lowered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringOptions {
    /// Route cross-type private member access through synthesized bridges.
    ///
    /// When disabled, such accesses are emitted directly.
    pub generate_bridges: bool,
    /// Fuse `x = x + c` on int locals into a single `IncLocal`.
    pub fuse_local_updates: bool,
    /// Largest dense table a switch may emit.
    pub max_table_entries: u32,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            generate_bridges: true,
            fuse_local_updates: true,
            max_table_entries: DEFAULT_MAX_TABLE_ENTRIES,
        }
    }
}

impl LoweringOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bridges(mut self, enabled: bool) -> Self {
        self.generate_bridges = enabled;
        self
    }

    pub fn with_local_update_fusion(mut self, enabled: bool) -> Self {
        self.fuse_local_updates = enabled;
        self
    }

    pub fn with_max_table_entries(mut self, max: u32) -> Self {
        self.max_table_entries = max;
        self
    }
}
