use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Garbage-collection rule for the cell versions of a column family.
///
/// Versions are numbered from 0 (newest). The store has no per-key TTL, so
/// lifetimes are modelled as families whose policy ages cells out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GcPolicy {
    /// Keep every version forever.
    #[default]
    NoGc,
    /// Keep at most this many versions per cell.
    MaxVersions(usize),
    /// Drop versions older than this.
    MaxAge(Duration),
    /// A version is garbage if any member policy says so.
    Union(Vec<GcPolicy>),
    /// A version is garbage only if every member policy says so.
    Intersection(Vec<GcPolicy>),
}

impl GcPolicy {
    pub fn union(policies: impl IntoIterator<Item = GcPolicy>) -> Self {
        GcPolicy::Union(policies.into_iter().collect())
    }

    pub fn intersection(policies: impl IntoIterator<Item = GcPolicy>) -> Self {
        GcPolicy::Intersection(policies.into_iter().collect())
    }

    /// Whether the version at position `version` (0 = newest) with the given
    /// age is eligible for collection.
    pub fn is_garbage(&self, version: usize, age: Duration) -> bool {
        match self {
            GcPolicy::NoGc => false,
            GcPolicy::MaxVersions(max) => version >= *max,
            GcPolicy::MaxAge(max) => age > *max,
            GcPolicy::Union(policies) => policies.iter().any(|p| p.is_garbage(version, age)),
            GcPolicy::Intersection(policies) => {
                !policies.is_empty() && policies.iter().all(|p| p.is_garbage(version, age))
            }
        }
    }
}

impl std::fmt::Display for GcPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |f: &mut std::fmt::Formatter<'_>, policies: &[GcPolicy], op: &str| {
            write!(f, "(")?;
            for (i, policy) in policies.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{policy}")?;
            }
            write!(f, ")")
        };
        match self {
            GcPolicy::NoGc => write!(f, "<never>"),
            GcPolicy::MaxVersions(max) => write!(f, "versions() > {max}"),
            GcPolicy::MaxAge(max) => write!(f, "age() > {}s", max.as_secs()),
            GcPolicy::Union(policies) => join(f, policies, "||"),
            GcPolicy::Intersection(policies) => join(f, policies, "&&"),
        }
    }
}

/// Column families of a table and their GC policies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    families: BTreeMap<String, GcPolicy>,
}

impl TableSchema {
    pub fn has_family(&self, family: &str) -> bool {
        self.families.contains_key(family)
    }

    /// Add a family with no GC policy. Returns false if it already existed.
    pub fn add_family(&mut self, family: &str) -> bool {
        if self.has_family(family) {
            return false;
        }
        self.families.insert(family.to_string(), GcPolicy::NoGc);
        true
    }

    /// Replace the policy of an existing family. Returns false if it doesn't exist.
    pub fn set_policy(&mut self, family: &str, policy: GcPolicy) -> bool {
        match self.families.get_mut(family) {
            Some(current) => {
                *current = policy;
                true
            }
            None => false,
        }
    }

    pub fn policy(&self, family: &str) -> Option<&GcPolicy> {
        self.families.get(family)
    }

    pub fn info(&self) -> TableInfo {
        TableInfo {
            families: self.families.keys().cloned().collect(),
            policies: self.families.clone(),
        }
    }
}

/// Admin view of a table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableInfo {
    pub families: Vec<String>,
    pub policies: BTreeMap<String, GcPolicy>,
}
