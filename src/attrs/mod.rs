//! Attribute model: interned attributes, indexed attributes, and JIAs.
//!
//! Every `(table, column)` pair is interned into a dense [`AttrId`] at
//! startup, together with its coarse type class and cached row/distinct
//! counts. Indexed attributes add an occurrence index for self-joins; a
//! [`Jia`] (joined indexed attribute) is a canonical set of indexed
//! attributes that a rule unifies under one variable.
//!
//! All types here are immutable value objects, created during
//! initialization and shared by reference throughout traversal.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::inspector::{Inspector, InspectorResult};

/// Column-qualification delimiter used in attribute keys and rule records.
pub const ATTR_KEY_SEP: &str = "___sep___";

/// Interned attribute id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrId(pub u32);

/// Interned table id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u16);

/// Coarse type class used for join compatibility. Fine-grained backend
/// types all map onto these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Numeric,
    Textual,
    Identifier,
}

impl ColumnType {
    /// Classify a column from its declared type and schema role.
    ///
    /// Key columns (primary keys, foreign-key endpoints, `id`-style names)
    /// form their own class so that measures never unify with identifiers.
    pub fn classify(declared: &str, name: &str, is_key: bool) -> Self {
        if is_key {
            return Self::Identifier;
        }
        let name = name.to_lowercase();
        if name == "id" || name.ends_with("_id") {
            return Self::Identifier;
        }
        let declared = declared.to_lowercase();
        const NUMERIC: [&str; 8] = [
            "int", "real", "num", "dec", "float", "double", "bool", "serial",
        ];
        if NUMERIC.iter().any(|marker| declared.contains(marker)) {
            Self::Numeric
        } else {
            Self::Textual
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Textual => write!(f, "textual"),
            Self::Identifier => write!(f, "identifier"),
        }
    }
}

/// An interned `(table, column)` attribute with cached statistics.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub table: TableId,
    pub column: String,
    pub ty: ColumnType,
    /// Row count of the owning table.
    pub row_count: u64,
    /// Distinct non-null values in the column.
    pub distinct_count: u64,
}

/// An attribute occurrence: the same attribute may appear several times in
/// one rule (self-joins); the occurrence index disambiguates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexedAttr {
    pub attr: AttrId,
    pub occurrence: u8,
}

impl IndexedAttr {
    pub fn new(attr: AttrId, occurrence: u8) -> Self {
        Self { attr, occurrence }
    }
}

/// One table occurrence within a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableOcc {
    pub table: TableId,
    pub occurrence: u8,
}

/// A joined indexed attribute: the set of positions a rule asserts to take
/// the same variable. Canonical form is sorted and deduplicated; equality
/// and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jia {
    ias: Vec<IndexedAttr>,
}

impl Jia {
    /// Canonicalize a member list. JIAs are never empty.
    pub fn new(mut ias: Vec<IndexedAttr>) -> Self {
        debug_assert!(!ias.is_empty(), "a JIA must have at least one member");
        ias.sort_unstable();
        ias.dedup();
        Self { ias }
    }

    pub fn singleton(ia: IndexedAttr) -> Self {
        Self { ias: vec![ia] }
    }

    pub fn ias(&self) -> &[IndexedAttr] {
        &self.ias
    }

    pub fn len(&self) -> usize {
        self.ias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ias.is_empty()
    }

    /// A singleton JIA leaves its variable free (or existential, on the
    /// head side); only multi-member JIAs express joins.
    pub fn is_singleton(&self) -> bool {
        self.ias.len() == 1
    }

    pub fn contains(&self, ia: IndexedAttr) -> bool {
        self.ias.binary_search(&ia).is_ok()
    }

    /// The first member in canonical order.
    pub fn first(&self) -> IndexedAttr {
        self.ias[0]
    }

    /// Whether this JIA shares any member with another.
    pub fn intersects(&self, other: &Jia) -> bool {
        self.ias.iter().any(|ia| other.contains(*ia))
    }

    /// The distinct table occurrences this JIA touches.
    pub fn occurrences(&self, interner: &AttributeInterner) -> BTreeSet<TableOcc> {
        self.ias
            .iter()
            .map(|ia| TableOcc {
                table: interner.attr(ia.attr).table,
                occurrence: ia.occurrence,
            })
            .collect()
    }

    /// Whether the JIA can open a rule: for every table it touches, its
    /// occurrence indices must be exactly `{0, …, k}`.
    pub fn is_valid_prefix(&self, interner: &AttributeInterner) -> bool {
        let mut per_table: BTreeMap<TableId, BTreeSet<u8>> = BTreeMap::new();
        for occ in self.occurrences(interner) {
            per_table.entry(occ.table).or_default().insert(occ.occurrence);
        }
        per_table
            .values()
            .all(|indices| indices.iter().copied().eq(0..indices.len() as u8))
    }
}

/// The attribute interner: dense ids for every `(table, column)` pair,
/// with cached statistics and the declared foreign-key pairs.
///
/// Built once per discovery run and read-only afterwards.
#[derive(Debug)]
pub struct AttributeInterner {
    tables: Vec<String>,
    table_row_counts: Vec<u64>,
    attrs: Vec<Attribute>,
    ids: HashMap<(TableId, String), AttrId>,
    foreign_keys: Vec<(AttrId, AttrId)>,
}

impl AttributeInterner {
    /// Intern the whole schema, caching row counts, distinct counts, and
    /// declared foreign keys in one pass over the inspector.
    pub fn from_inspector(inspector: &dyn Inspector) -> InspectorResult<Self> {
        let table_names = inspector.list_tables()?;

        let mut tables = Vec::with_capacity(table_names.len());
        let mut table_row_counts = Vec::with_capacity(table_names.len());
        let mut table_ids: HashMap<String, TableId> = HashMap::new();
        let mut columns = Vec::new();

        for name in &table_names {
            let id = TableId(tables.len() as u16);
            table_ids.insert(name.clone(), id);
            tables.push(name.clone());
            table_row_counts.push(inspector.row_count(name)?);
            for column in inspector.list_columns(name)? {
                columns.push((id, name.clone(), column));
            }
        }

        // Resolve declared foreign keys before classification so that both
        // endpoints land in the identifier class.
        let mut raw_fks = Vec::new();
        let mut key_columns: HashSet<(TableId, String)> = HashSet::new();
        for name in &table_names {
            let local = table_ids[name];
            for fk in inspector.foreign_keys(name)? {
                let Some(&referenced) = table_ids.get(&fk.referenced_table) else {
                    tracing::debug!(
                        table = %name,
                        referenced = %fk.referenced_table,
                        "skipping foreign key to unknown table"
                    );
                    continue;
                };
                key_columns.insert((local, fk.column.clone()));
                key_columns.insert((referenced, fk.referenced_column.clone()));
                raw_fks.push((local, fk.column, referenced, fk.referenced_column));
            }
        }

        let mut attrs = Vec::with_capacity(columns.len());
        let mut ids = HashMap::with_capacity(columns.len());
        for (table, table_name, column) in columns {
            let id = AttrId(attrs.len() as u32);
            let is_key = column.primary_key || key_columns.contains(&(table, column.name.clone()));
            let ty = ColumnType::classify(&column.declared_type, &column.name, is_key);
            let distinct_count = inspector.distinct_values(&table_name, &column.name)?;
            ids.insert((table, column.name.clone()), id);
            attrs.push(Attribute {
                table,
                column: column.name,
                ty,
                row_count: table_row_counts[table.0 as usize],
                distinct_count,
            });
        }

        let mut foreign_keys = Vec::with_capacity(raw_fks.len());
        for (local_table, local_column, referenced_table, referenced_column) in raw_fks {
            let local = ids.get(&(local_table, local_column));
            let referenced = ids.get(&(referenced_table, referenced_column));
            match (local, referenced) {
                (Some(&l), Some(&r)) => foreign_keys.push((l, r)),
                _ => tracing::debug!("skipping foreign key with unknown column"),
            }
        }

        Ok(Self {
            tables,
            table_row_counts,
            attrs,
            ids,
            foreign_keys,
        })
    }

    pub fn attr(&self, id: AttrId) -> &Attribute {
        &self.attrs[id.0 as usize]
    }

    pub fn attr_count(&self) -> usize {
        self.attrs.len()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table_name(&self, id: TableId) -> &str {
        &self.tables[id.0 as usize]
    }

    pub fn table_row_count(&self, id: TableId) -> u64 {
        self.table_row_counts[id.0 as usize]
    }

    pub fn id_of(&self, table: &str, column: &str) -> Option<AttrId> {
        let table = self
            .tables
            .iter()
            .position(|t| t == table)
            .map(|i| TableId(i as u16))?;
        self.ids.get(&(table, column.to_string())).copied()
    }

    /// Declared foreign-key pairs as `(local, referenced)` attribute ids.
    pub fn foreign_key_pairs(&self) -> &[(AttrId, AttrId)] {
        &self.foreign_keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttrId, &Attribute)> {
        self.attrs
            .iter()
            .enumerate()
            .map(|(i, a)| (AttrId(i as u32), a))
    }

    /// Attribute key in the `<table>___sep___<column>` form used by side
    /// files and rule records.
    pub fn key(&self, id: AttrId) -> String {
        let attr = self.attr(id);
        format!(
            "{}{}{}",
            self.table_name(attr.table),
            ATTR_KEY_SEP,
            attr.column
        )
    }
}
