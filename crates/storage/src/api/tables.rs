/// Tables in the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Execution blocks: `<chainId>:<reversed number>` -> BlockRecord
    ///
    /// Keys sort newest first, so "latest N blocks" is a plain forward scan.
    Blocks,
    /// Epoch statistics: decimal epoch -> EpochSummary
    Epochs,
    /// Validator state snapshot: the single row `state` -> ValidatorState
    ValidatorState,
    /// Balance history: `<index>#<epoch>` -> ValidatorBalanceRecord
    ///
    /// Immutable once written.
    ValidatorBalanceHistory,
    /// Full validator export: `<index>#<epoch>` -> ValidatorExportRecord
    Validators,
    /// Lifetime-tiered cache. One column family per lifetime.
    Cache,
}

/// All table variants.
pub const ALL_TABLES: [Table; 6] = [
    Table::Blocks,
    Table::Epochs,
    Table::ValidatorState,
    Table::ValidatorBalanceHistory,
    Table::Validators,
    Table::Cache,
];

/// Column family used by every non-cache table.
pub const DEFAULT_FAMILY: &str = "default";

/// Column holding the encoded payload of a row.
pub const DATA_COLUMN: &str = "data";

impl Table {
    /// Stable name of the table in the underlying store.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Blocks => "blocks",
            Table::Epochs => "epochs",
            Table::ValidatorState => "validator_state",
            Table::ValidatorBalanceHistory => "validator_balance_history",
            Table::Validators => "validators",
            Table::Cache => "cache",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
