use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::TableSchema;

/// Current wall-clock time in microseconds since the unix epoch.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or_default()
}

/// A single timestamped version of a column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Microseconds since the unix epoch, or a fixed logical value.
    pub timestamp: u64,
    pub value: Vec<u8>,
}

type Columns = BTreeMap<String, Vec<Cell>>;

/// A row as returned by a read view: family -> column -> versions (newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    key: String,
    families: BTreeMap<String, Columns>,
}

impl Row {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            families: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// All versions of a column, newest first.
    pub fn cells(&self, family: &str, column: &str) -> &[Cell] {
        self.families
            .get(family)
            .and_then(|columns| columns.get(column))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Newest version of a column.
    pub fn latest(&self, family: &str, column: &str) -> Option<&Cell> {
        self.cells(family, column).first()
    }

    /// Iterate every (family, column, cell) triple.
    pub fn iter_cells(&self) -> impl Iterator<Item = (&str, &str, &Cell)> {
        self.families.iter().flat_map(|(family, columns)| {
            columns.iter().flat_map(move |(column, cells)| {
                cells
                    .iter()
                    .map(move |cell| (family.as_str(), column.as_str(), cell))
            })
        })
    }

    /// Insert a version, replacing any existing version with the same timestamp.
    pub fn insert_cell(&mut self, family: &str, column: &str, cell: Cell) {
        let cells = self
            .families
            .entry(family.to_string())
            .or_default()
            .entry(column.to_string())
            .or_default();
        match cells.binary_search_by(|probe| cell.timestamp.cmp(&probe.timestamp)) {
            Ok(pos) => cells[pos] = cell,
            Err(pos) => cells.insert(pos, cell),
        }
    }

    pub(crate) fn apply(&mut self, mutation: &Mutation) {
        for op in mutation.ops() {
            match op {
                MutationOp::SetCell {
                    family,
                    column,
                    timestamp,
                    value,
                } => self.insert_cell(
                    family,
                    column,
                    Cell {
                        timestamp: *timestamp,
                        value: value.clone(),
                    },
                ),
                MutationOp::DeleteCells { family, column } => {
                    if let Some(columns) = self.families.get_mut(family) {
                        columns.remove(column);
                        if columns.is_empty() {
                            self.families.remove(family);
                        }
                    }
                }
                MutationOp::DeleteRow => self.families.clear(),
            }
        }
    }

    /// Drop every version the table's GC policies consider garbage at `now`.
    pub(crate) fn collect_garbage(&mut self, schema: &TableSchema, now: u64) {
        for (family, columns) in self.families.iter_mut() {
            let Some(policy) = schema.policy(family) else {
                continue;
            };
            for cells in columns.values_mut() {
                let mut version = 0;
                cells.retain(|cell| {
                    let age = Duration::from_micros(now.saturating_sub(cell.timestamp));
                    let keep = !policy.is_garbage(version, age);
                    version += 1;
                    keep
                });
            }
            columns.retain(|_, cells| !cells.is_empty());
        }
        self.families.retain(|_, columns| !columns.is_empty());
    }
}

/// A single change to a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOp {
    SetCell {
        family: String,
        column: String,
        timestamp: u64,
        value: Vec<u8>,
    },
    /// Remove every version of one column.
    DeleteCells { family: String, column: String },
    DeleteRow,
}

/// An ordered list of changes applied atomically to one row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mutation {
    ops: Vec<MutationOp>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, family: &str, column: &str, timestamp: u64, value: Vec<u8>) -> Self {
        self.ops.push(MutationOp::SetCell {
            family: family.to_string(),
            column: column.to_string(),
            timestamp,
            value,
        });
        self
    }

    pub fn delete_cells(mut self, family: &str, column: &str) -> Self {
        self.ops.push(MutationOp::DeleteCells {
            family: family.to_string(),
            column: column.to_string(),
        });
        self
    }

    pub fn delete_row(mut self) -> Self {
        self.ops.push(MutationOp::DeleteRow);
        self
    }

    pub fn ops(&self) -> &[MutationOp] {
        &self.ops
    }

    /// Families this mutation writes to. Used to reject unknown families.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            MutationOp::SetCell { family, .. } | MutationOp::DeleteCells { family, .. } => {
                Some(family.as_str())
            }
            MutationOp::DeleteRow => None,
        })
    }
}

/// A half-open key range `[start, end)`; `end = None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowRange {
    start: String,
    end: Option<String>,
}

impl RowRange {
    /// All rows with key >= `start`.
    pub fn infinite(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: None,
        }
    }

    /// All rows whose key starts with `prefix`. The empty prefix spans the table.
    pub fn prefix(prefix: &str) -> Self {
        Self {
            start: prefix.to_string(),
            end: prefix_successor(prefix),
        }
    }

    /// Move the lower bound, keeping the upper one.
    pub fn starting_at(mut self, start: impl Into<String>) -> Self {
        self.start = start.into();
        self
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> Option<&str> {
        self.end.as_deref()
    }

    pub fn contains(&self, key: &str) -> bool {
        key >= self.start.as_str() && self.end.as_deref().is_none_or(|end| key < end)
    }
}

/// Smallest string greater than every string starting with `prefix`.
fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        // Step over the surrogate block, which has no `char` values
        let next = match last {
            '\u{D7FF}' => Some('\u{E000}'),
            _ => char::from_u32(last as u32 + 1),
        };
        if let Some(next) = next {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}
