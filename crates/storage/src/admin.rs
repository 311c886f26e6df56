use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info};

use crate::api::{AdminBackend, DEFAULT_FAMILY, GcPolicy, Table};
use crate::cache::CacheLifetime;
use crate::error::StoreError;

/// A column family to create and the GC policy it should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilySpec {
    pub name: String,
    pub policy: GcPolicy,
}

impl FamilySpec {
    pub fn new(name: impl Into<String>, policy: GcPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }
}

/// A table and the families declared on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub table: Table,
    pub families: Vec<FamilySpec>,
}

/// Every table except the cache, each with a single-version default family.
pub fn core_tables() -> Vec<TableSpec> {
    [
        Table::Blocks,
        Table::Epochs,
        Table::ValidatorState,
        Table::ValidatorBalanceHistory,
        Table::Validators,
    ]
    .into_iter()
    .map(|table| TableSpec {
        table,
        families: vec![FamilySpec::new(DEFAULT_FAMILY, GcPolicy::MaxVersions(1))],
    })
    .collect()
}

/// The cache table with one family per [`CacheLifetime`].
pub fn cache_table() -> TableSpec {
    TableSpec {
        table: Table::Cache,
        families: CacheLifetime::ALL
            .into_iter()
            .map(|lifetime| {
                FamilySpec::new(
                    lifetime.family(),
                    GcPolicy::intersection([
                        GcPolicy::MaxVersions(1),
                        GcPolicy::MaxAge(lifetime.duration()),
                    ]),
                )
            })
            .collect(),
    }
}

/// Table and column-family bootstrap.
///
/// Creation is idempotent. GC policies are set in a separate step so that
/// re-running bootstrap never resets a policy changed by an operator. Any
/// backend failure aborts the remaining steps.
pub struct SchemaAdmin {
    backend: Arc<dyn AdminBackend>,
}

impl SchemaAdmin {
    pub fn new(backend: Arc<dyn AdminBackend>) -> Self {
        Self { backend }
    }

    /// Ensure every declared table and family exists.
    pub fn create_tables(&self, specs: &[TableSpec]) -> Result<(), StoreError> {
        let existing: HashSet<String> = self.backend.tables()?.into_iter().collect();

        for spec in specs {
            let name = spec.table.name();
            let families: HashSet<String> = if existing.contains(name) {
                self.backend.table_info(spec.table)?.families.into_iter().collect()
            } else {
                self.backend.create_table(spec.table).inspect_err(
                    |err| error!(table = name, %err, "Failed to create table"),
                )?;
                info!(table = name, "Created table");
                HashSet::new()
            };

            for family in spec.families.iter().filter(|f| !families.contains(&f.name)) {
                self.backend
                    .create_column_family(spec.table, &family.name)
                    .inspect_err(|err| {
                        error!(table = name, family = %family.name, %err, "Failed to create column family")
                    })?;
                info!(table = name, family = %family.name, "Created column family");
            }
        }
        Ok(())
    }

    /// Set the declared GC policy on every family. Families must exist.
    pub fn apply_gc_policies(&self, specs: &[TableSpec]) -> Result<(), StoreError> {
        for spec in specs {
            for family in &spec.families {
                self.backend
                    .set_gc_policy(spec.table, &family.name, &family.policy)
                    .inspect_err(|err| {
                        error!(table = %spec.table, family = %family.name, %err, "Failed to set GC policy")
                    })?;
                info!(table = %spec.table, family = %family.name, policy = %family.policy, "Applied GC policy");
            }
        }
        Ok(())
    }

    /// Drop tables and all their data. Tables that don't exist are skipped.
    pub fn delete_tables(&self, tables: &[Table]) -> Result<(), StoreError> {
        let existing: HashSet<String> = self.backend.tables()?.into_iter().collect();

        for table in tables {
            if !existing.contains(table.name()) {
                info!(%table, "Table does not exist, nothing to delete");
                continue;
            }
            self.backend
                .delete_table(*table)
                .inspect_err(|err| error!(%table, %err, "Failed to delete table"))?;
            info!(%table, "Deleted table");
        }
        Ok(())
    }

    /// Create the core tables. Their policies are applied separately.
    pub fn setup_core(&self) -> Result<(), StoreError> {
        self.create_tables(&core_tables())
    }

    pub fn apply_core_gc_policies(&self) -> Result<(), StoreError> {
        self.apply_gc_policies(&core_tables())
    }

    /// Create the cache table and apply its lifetime policies.
    pub fn setup_cache(&self) -> Result<(), StoreError> {
        let spec = [cache_table()];
        self.create_tables(&spec)?;
        self.apply_gc_policies(&spec)
    }

    pub fn teardown_cache(&self) -> Result<(), StoreError> {
        self.delete_tables(&[Table::Cache])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn admin() -> (InMemoryBackend, SchemaAdmin) {
        let backend = InMemoryBackend::new();
        let admin = SchemaAdmin::new(Arc::new(backend.clone()));
        (backend, admin)
    }

    #[test]
    fn test_setup_twice_is_idempotent() {
        let (backend, admin) = admin();
        admin.setup_core().unwrap();
        admin.setup_cache().unwrap();
        admin.setup_core().unwrap();
        admin.setup_cache().unwrap();

        assert_eq!(
            backend.tables().unwrap(),
            vec![
                "blocks",
                "cache",
                "epochs",
                "validator_balance_history",
                "validator_state",
                "validators"
            ]
        );
        let info = backend.table_info(Table::Cache).unwrap();
        assert_eq!(info.families, vec!["10_min", "1_day", "1_hour"]);
    }

    #[test]
    fn test_create_does_not_reset_policies() {
        let (backend, admin) = admin();
        admin.setup_core().unwrap();
        let info = backend.table_info(Table::Blocks).unwrap();
        assert_eq!(info.policies[DEFAULT_FAMILY], GcPolicy::NoGc);

        admin.apply_core_gc_policies().unwrap();
        backend
            .set_gc_policy(Table::Blocks, DEFAULT_FAMILY, &GcPolicy::MaxVersions(3))
            .unwrap();
        admin.setup_core().unwrap();

        let info = backend.table_info(Table::Blocks).unwrap();
        assert_eq!(info.policies[DEFAULT_FAMILY], GcPolicy::MaxVersions(3));
    }

    #[test]
    fn test_missing_family_added_to_existing_table() {
        let (backend, admin) = admin();
        backend.create_table(Table::Cache).unwrap();
        backend.create_column_family(Table::Cache, "1_hour").unwrap();

        admin.setup_cache().unwrap();

        let info = backend.table_info(Table::Cache).unwrap();
        assert_eq!(info.families.len(), 3);
        assert_eq!(info.policies["1_hour"], cache_table().families[1].policy);
    }

    #[test]
    fn test_cache_policies() {
        let spec = cache_table();
        assert_eq!(spec.families[0].name, "10_min");
        assert_eq!(
            spec.families[0].policy.to_string(),
            "(versions() > 1 && age() > 600s)"
        );
        assert_eq!(
            spec.families[2].policy.to_string(),
            "(versions() > 1 && age() > 86400s)"
        );
    }

    #[test]
    fn test_apply_policy_on_missing_family_fails() {
        let (_, admin) = admin();
        assert!(admin.apply_gc_policies(&core_tables()).is_err());
    }

    #[test]
    fn test_teardown_cache() {
        let (backend, admin) = admin();
        admin.setup_core().unwrap();
        admin.setup_cache().unwrap();
        admin.teardown_cache().unwrap();
        // A second teardown has nothing to delete
        admin.teardown_cache().unwrap();

        let tables = backend.tables().unwrap();
        assert!(!tables.contains(&"cache".to_string()));
        assert!(tables.contains(&"blocks".to_string()));
    }
}
