//! In-memory inspector backend.
//!
//! Holds small tables entirely in memory and evaluates match queries by
//! nested-loop enumeration with the same semantics as the SQL backend.
//! Used by tests, examples, and scenario fixtures.

use std::collections::{BTreeMap, HashSet};

use super::query::MatchQuery;
use super::{ColumnInfo, ForeignKey, Inspector, InspectorError, InspectorResult};

/// A cell value. `Null` never compares equal to anything, including itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Int(i64),
    Text(String),
    Null,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Join equality: SQL semantics, null matches nothing.
    fn matches(&self, other: &Value) -> bool {
        !matches!(self, Value::Null) && self == other
    }
}

#[derive(Debug, Default)]
struct MemTable {
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Value>>,
    foreign_keys: Vec<ForeignKey>,
}

impl MemTable {
    fn column_index(&self, table: &str, column: &str) -> InspectorResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| InspectorError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
    }
}

/// An inspector over in-memory tables.
#[derive(Debug, Default)]
pub struct MemoryInspector {
    name: String,
    tables: BTreeMap<String, MemTable>,
}

impl MemoryInspector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Define a table from `(column, declared_type)` pairs.
    pub fn create_table(&mut self, table: &str, columns: &[(&str, &str)]) {
        let columns = columns
            .iter()
            .map(|(name, declared_type)| ColumnInfo {
                name: (*name).to_string(),
                declared_type: (*declared_type).to_string(),
                primary_key: false,
            })
            .collect();
        self.tables.insert(
            table.to_string(),
            MemTable {
                columns,
                ..MemTable::default()
            },
        );
    }

    /// Mark a column as (part of) the primary key.
    pub fn set_primary_key(&mut self, table: &str, column: &str) -> InspectorResult<()> {
        let t = self.table_mut(table)?;
        let idx = t.column_index(table, column)?;
        t.columns[idx].primary_key = true;
        Ok(())
    }

    /// Append rows; each row must match the table's column count.
    pub fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Value>>) -> InspectorResult<()> {
        let t = self.table_mut(table)?;
        let width = t.columns.len();
        for row in &rows {
            if row.len() != width {
                return Err(InspectorError::Backend(format!(
                    "row width {} does not match table {table} ({} columns)",
                    row.len(),
                    width
                )));
            }
        }
        t.rows.extend(rows);
        Ok(())
    }

    /// Declare a foreign key edge.
    pub fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        referenced_table: &str,
        referenced_column: &str,
    ) -> InspectorResult<()> {
        let fk = ForeignKey {
            column: column.to_string(),
            referenced_table: referenced_table.to_string(),
            referenced_column: referenced_column.to_string(),
        };
        self.table_mut(table)?.foreign_keys.push(fk);
        Ok(())
    }

    fn table(&self, table: &str) -> InspectorResult<&MemTable> {
        self.tables
            .get(table)
            .ok_or_else(|| InspectorError::MissingTable(table.to_string()))
    }

    fn table_mut(&mut self, table: &str) -> InspectorResult<&mut MemTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| InspectorError::MissingTable(table.to_string()))
    }

    fn column_values(&self, table: &str, column: &str) -> InspectorResult<HashSet<&Value>> {
        let t = self.table(table)?;
        let idx = t.column_index(table, column)?;
        Ok(t.rows
            .iter()
            .map(|row| &row[idx])
            .filter(|v| !matches!(v, Value::Null))
            .collect())
    }

    fn evaluator<'a>(&'a self, query: &'a MatchQuery) -> InspectorResult<Evaluator<'a>> {
        Evaluator::new(self, query)
    }
}

impl Inspector for MemoryInspector {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    fn list_tables(&self) -> InspectorResult<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn list_columns(&self, table: &str) -> InspectorResult<Vec<ColumnInfo>> {
        Ok(self.table(table)?.columns.clone())
    }

    fn row_count(&self, table: &str) -> InspectorResult<u64> {
        Ok(self.table(table)?.rows.len() as u64)
    }

    fn distinct_values(&self, table: &str, column: &str) -> InspectorResult<u64> {
        Ok(self.column_values(table, column)?.len() as u64)
    }

    fn foreign_keys(&self, table: &str) -> InspectorResult<Vec<ForeignKey>> {
        Ok(self.table(table)?.foreign_keys.clone())
    }

    fn overlap_ratio(
        &self,
        left_table: &str,
        left_column: &str,
        right_table: &str,
        right_column: &str,
    ) -> InspectorResult<f64> {
        let left = self.column_values(left_table, left_column)?;
        let right = self.column_values(right_table, right_column)?;
        let min = left.len().min(right.len());
        if min == 0 {
            return Ok(0.0);
        }
        let common = left.intersection(&right).count();
        Ok(common as f64 / min as f64)
    }

    fn count_body_matches(&self, query: &MatchQuery) -> InspectorResult<u64> {
        let eval = self.evaluator(query)?;
        let mut count = 0u64;
        eval.for_each_body_binding(|_| {
            count += 1;
            true
        });
        Ok(count)
    }

    fn count_both_matches(&self, query: &MatchQuery) -> InspectorResult<u64> {
        let eval = self.evaluator(query)?;
        let mut count = 0u64;
        eval.for_each_body_binding(|binding| {
            if eval.head_satisfiable(binding) {
                count += 1;
            }
            true
        });
        Ok(count)
    }

    fn count_anchor_matches(&self, query: &MatchQuery) -> InspectorResult<u64> {
        let eval = self.evaluator(query)?;
        let mut anchor_rows: HashSet<usize> = HashSet::new();
        if query.atoms[query.anchor].in_body {
            eval.for_each_body_binding(|binding| {
                if eval.head_satisfiable(binding) {
                    anchor_rows.insert(binding[query.anchor]);
                }
                true
            });
        } else {
            eval.for_each_body_binding(|binding| {
                eval.collect_head_witnesses(binding, query.anchor, &mut anchor_rows);
                true
            });
        }
        Ok(anchor_rows.len() as u64)
    }
}

/// Resolved column indices plus backtracking enumeration over one query.
struct Evaluator<'a> {
    query: &'a MatchQuery,
    /// Row storage per atom.
    rows: Vec<&'a [Vec<Value>]>,
    /// Resolved `(left_atom, left_col, right_atom, right_col, in_body)`.
    equalities: Vec<(usize, usize, usize, usize, bool)>,
    body_atoms: Vec<usize>,
    head_atoms: Vec<usize>,
}

impl<'a> Evaluator<'a> {
    fn new(inspector: &'a MemoryInspector, query: &'a MatchQuery) -> InspectorResult<Self> {
        let mut rows = Vec::with_capacity(query.atoms.len());
        for atom in &query.atoms {
            rows.push(inspector.table(&atom.table)?.rows.as_slice());
        }
        let mut equalities = Vec::with_capacity(query.equalities.len());
        for eq in &query.equalities {
            let left_table = &query.atoms[eq.left.atom].table;
            let right_table = &query.atoms[eq.right.atom].table;
            let li = inspector
                .table(left_table)?
                .column_index(left_table, &eq.left.column)?;
            let ri = inspector
                .table(right_table)?
                .column_index(right_table, &eq.right.column)?;
            equalities.push((eq.left.atom, li, eq.right.atom, ri, eq.in_body));
        }
        Ok(Self {
            query,
            rows,
            equalities,
            body_atoms: query.body_atoms().map(|(i, _)| i).collect(),
            head_atoms: query.head_atoms().map(|(i, _)| i).collect(),
        })
    }

    fn equality_holds(
        &self,
        binding: &[usize],
        bound: &[bool],
        (la, lc, ra, rc, _): (usize, usize, usize, usize, bool),
    ) -> Option<bool> {
        if !bound[la] || !bound[ra] {
            return None;
        }
        let left = &self.rows[la][binding[la]][lc];
        let right = &self.rows[ra][binding[ra]][rc];
        Some(left.matches(right))
    }

    /// Enumerate bindings of the body atoms satisfying the body equalities.
    /// The visitor returns `false` to stop early.
    fn for_each_body_binding(&self, mut visit: impl FnMut(&[usize]) -> bool) {
        let mut binding = vec![0usize; self.query.atoms.len()];
        let mut bound = vec![false; self.query.atoms.len()];
        self.assign_body(0, &mut binding, &mut bound, &mut visit);
    }

    fn assign_body(
        &self,
        depth: usize,
        binding: &mut [usize],
        bound: &mut [bool],
        visit: &mut impl FnMut(&[usize]) -> bool,
    ) -> bool {
        if depth == self.body_atoms.len() {
            return visit(binding);
        }
        let atom = self.body_atoms[depth];
        for row in 0..self.rows[atom].len() {
            binding[atom] = row;
            bound[atom] = true;
            let ok = self
                .equalities
                .iter()
                .filter(|eq| eq.4)
                .all(|eq| self.equality_holds(binding, bound, *eq) != Some(false));
            if ok && !self.assign_body(depth + 1, binding, bound, visit) {
                bound[atom] = false;
                return false;
            }
            bound[atom] = false;
        }
        true
    }

    /// Whether the head pattern can be satisfied for a full body binding.
    fn head_satisfiable(&self, body_binding: &[usize]) -> bool {
        let mut binding = body_binding.to_vec();
        let mut bound = vec![false; self.query.atoms.len()];
        for &a in &self.body_atoms {
            bound[a] = true;
        }
        // Head equalities between already-bound atoms must hold outright.
        for eq in self.equalities.iter().filter(|eq| !eq.4) {
            if self.equality_holds(&binding, &bound, *eq) == Some(false) {
                return false;
            }
        }
        self.exists_head(0, &mut binding, &mut bound)
    }

    /// Collect every row of `target` (a head atom) that can witness the head
    /// for the given body binding.
    fn collect_head_witnesses(
        &self,
        body_binding: &[usize],
        target: usize,
        out: &mut HashSet<usize>,
    ) {
        let mut binding = body_binding.to_vec();
        let mut bound = vec![false; self.query.atoms.len()];
        for &a in &self.body_atoms {
            bound[a] = true;
        }
        for eq in self.equalities.iter().filter(|eq| !eq.4) {
            if self.equality_holds(&binding, &bound, *eq) == Some(false) {
                return;
            }
        }
        self.each_head(0, &mut binding, &mut bound, &mut |b| {
            out.insert(b[target]);
        });
    }

    /// True when at least one complete head assignment exists (stops at the
    /// first one).
    fn exists_head(&self, depth: usize, binding: &mut [usize], bound: &mut [bool]) -> bool {
        if depth == self.head_atoms.len() {
            return true;
        }
        let atom = self.head_atoms[depth];
        for row in 0..self.rows[atom].len() {
            binding[atom] = row;
            bound[atom] = true;
            let ok = self
                .equalities
                .iter()
                .filter(|eq| !eq.4)
                .all(|eq| self.equality_holds(binding, bound, *eq) != Some(false));
            if ok && self.exists_head(depth + 1, binding, bound) {
                bound[atom] = false;
                return true;
            }
            bound[atom] = false;
        }
        false
    }

    /// Visit every complete head assignment.
    fn each_head(
        &self,
        depth: usize,
        binding: &mut [usize],
        bound: &mut [bool],
        visit: &mut impl FnMut(&[usize]),
    ) {
        if depth == self.head_atoms.len() {
            visit(binding);
            return;
        }
        let atom = self.head_atoms[depth];
        for row in 0..self.rows[atom].len() {
            binding[atom] = row;
            bound[atom] = true;
            let ok = self
                .equalities
                .iter()
                .filter(|eq| !eq.4)
                .all(|eq| self.equality_holds(binding, bound, *eq) != Some(false));
            if ok {
                self.each_head(depth + 1, binding, bound, visit);
            }
            bound[atom] = false;
        }
    }
}
