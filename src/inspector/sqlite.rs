//! SQLite-backed inspector.
//!
//! Schema introspection goes through `sqlite_master` and the `table_info` /
//! `foreign_key_list` pragmas; counts and overlap checks are plain SQL.
//! Match queries are compiled to `COUNT` statements with an `EXISTS`
//! subquery for the existential head pattern.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use super::query::{Equality, MatchQuery, QueryAtom};
use super::{ColumnInfo, ForeignKey, Inspector, InspectorError, InspectorResult};

impl From<rusqlite::Error> for InspectorError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// An inspector over a SQLite database file.
///
/// The connection is behind a mutex so concurrent read calls from
/// parallel discovery runs serialize safely.
pub struct SqliteInspector {
    conn: Mutex<Connection>,
    name: String,
}

impl SqliteInspector {
    /// Open a database file read-only by convention; the inspector never
    /// issues writes.
    pub fn open(path: &Path) -> InspectorResult<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string());
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            name,
        })
    }

    /// Open an in-memory database; used by tests that seed their own schema.
    pub fn open_in_memory(name: impl Into<String>) -> InspectorResult<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            name: name.into(),
        })
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection, name: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            name: name.into(),
        }
    }

    /// Lock the underlying connection, e.g. for seeding fixtures.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_table(&self, table: &str) -> InspectorResult<()> {
        let exists: bool = self.connection().query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(InspectorError::MissingTable(table.to_string()))
        }
    }

    fn ensure_column(&self, table: &str, column: &str) -> InspectorResult<()> {
        if self.list_columns(table)?.iter().any(|c| c.name == column) {
            Ok(())
        } else {
            Err(InspectorError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
        }
    }

    fn count(&self, sql: &str) -> InspectorResult<u64> {
        let n: i64 = self.connection().query_row(sql, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    fn check_query_schema(&self, query: &MatchQuery) -> InspectorResult<()> {
        for atom in &query.atoms {
            self.ensure_table(&atom.table)?;
        }
        for eq in &query.equalities {
            self.ensure_column(&query.atoms[eq.left.atom].table, &eq.left.column)?;
            self.ensure_column(&query.atoms[eq.right.atom].table, &eq.right.column)?;
        }
        Ok(())
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn from_clause<'a>(atoms: impl Iterator<Item = &'a QueryAtom>) -> String {
    atoms
        .map(|a| format!("{} AS {}", quote_ident(&a.table), a.alias))
        .collect::<Vec<_>>()
        .join(", ")
}

fn equality_sql(query: &MatchQuery, eq: &Equality) -> String {
    format!(
        "{}.{} = {}.{}",
        query.atoms[eq.left.atom].alias,
        quote_ident(&eq.left.column),
        query.atoms[eq.right.atom].alias,
        quote_ident(&eq.right.column)
    )
}

/// Head equalities that only touch body atoms apply to the outer query;
/// the rest are correlated into the `EXISTS` subquery.
fn split_head_equalities<'a>(query: &'a MatchQuery) -> (Vec<&'a Equality>, Vec<&'a Equality>) {
    let mut outer = Vec::new();
    let mut inner = Vec::new();
    for eq in query.head_equalities() {
        let touches_head =
            !query.atoms[eq.left.atom].in_body || !query.atoms[eq.right.atom].in_body;
        if touches_head {
            inner.push(eq);
        } else {
            outer.push(eq);
        }
    }
    (outer, inner)
}

fn body_where(query: &MatchQuery) -> Vec<String> {
    query
        .body_equalities()
        .map(|eq| equality_sql(query, eq))
        .collect()
}

/// The `WHERE` conjuncts of a body ∧ head query over the body atoms,
/// including the `EXISTS` subquery when head atoms are present.
fn both_where(query: &MatchQuery) -> Vec<String> {
    let mut conjuncts = body_where(query);
    let (outer, inner) = split_head_equalities(query);
    conjuncts.extend(outer.iter().map(|eq| equality_sql(query, eq)));

    let head_atoms: Vec<&QueryAtom> = query.head_atoms().map(|(_, a)| a).collect();
    if !head_atoms.is_empty() {
        let inner_where = inner
            .iter()
            .map(|eq| equality_sql(query, eq))
            .collect::<Vec<_>>()
            .join(" AND ");
        let mut exists = format!("EXISTS (SELECT 1 FROM {}", from_clause(head_atoms.into_iter()));
        if !inner_where.is_empty() {
            exists.push_str(" WHERE ");
            exists.push_str(&inner_where);
        }
        exists.push(')');
        conjuncts.push(exists);
    }
    conjuncts
}

fn render(select: &str, from: &str, conjuncts: &[String]) -> String {
    let mut sql = format!("SELECT {select} FROM {from}");
    if !conjuncts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conjuncts.join(" AND "));
    }
    sql
}

impl Inspector for SqliteInspector {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    fn list_tables(&self) -> InspectorResult<Vec<String>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn list_columns(&self, table: &str) -> InspectorResult<Vec<ColumnInfo>> {
        self.ensure_table(table)?;
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let conn = self.connection();
        let mut stmt = conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    primary_key: row.get::<_, i64>(5)? > 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn row_count(&self, table: &str) -> InspectorResult<u64> {
        self.ensure_table(table)?;
        self.count(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
    }

    fn distinct_values(&self, table: &str, column: &str) -> InspectorResult<u64> {
        self.ensure_column(table, column)?;
        self.count(&format!(
            "SELECT COUNT(DISTINCT {}) FROM {}",
            quote_ident(column),
            quote_ident(table)
        ))
    }

    fn foreign_keys(&self, table: &str) -> InspectorResult<Vec<ForeignKey>> {
        self.ensure_table(table)?;
        let sql = format!("PRAGMA foreign_key_list({})", quote_ident(table));
        // Scoped so the connection lock is released before the primary-key
        // resolution below re-enters `list_columns`.
        let raw = {
            let conn = self.connection();
            let mut stmt = conn.prepare(&sql)?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(2)?,         // referenced table
                        row.get::<_, String>(3)?,         // local column
                        row.get::<_, Option<String>>(4)?, // referenced column (None = PK)
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            raw
        };

        let mut keys = Vec::with_capacity(raw.len());
        for (referenced_table, column, referenced_column) in raw {
            let referenced_column = match referenced_column {
                Some(c) => c,
                // An implicit reference targets the parent's primary key.
                None => self
                    .list_columns(&referenced_table)?
                    .into_iter()
                    .find(|c| c.primary_key)
                    .map(|c| c.name)
                    .ok_or_else(|| {
                        InspectorError::Backend(format!(
                            "foreign key on {table} references {referenced_table} without a primary key"
                        ))
                    })?,
            };
            keys.push(ForeignKey {
                column,
                referenced_table,
                referenced_column,
            });
        }
        Ok(keys)
    }

    fn overlap_ratio(
        &self,
        left_table: &str,
        left_column: &str,
        right_table: &str,
        right_column: &str,
    ) -> InspectorResult<f64> {
        let left_distinct = self.distinct_values(left_table, left_column)?;
        let right_distinct = self.distinct_values(right_table, right_column)?;
        let min = left_distinct.min(right_distinct);
        if min == 0 {
            return Ok(0.0);
        }
        let common = self.count(&format!(
            "SELECT COUNT(*) FROM (\
               SELECT {lc} AS v FROM {lt} WHERE {lc} IS NOT NULL \
               INTERSECT \
               SELECT {rc} FROM {rt} WHERE {rc} IS NOT NULL)",
            lc = quote_ident(left_column),
            lt = quote_ident(left_table),
            rc = quote_ident(right_column),
            rt = quote_ident(right_table),
        ))?;
        Ok(common as f64 / min as f64)
    }

    fn count_body_matches(&self, query: &MatchQuery) -> InspectorResult<u64> {
        self.check_query_schema(query)?;
        let from = from_clause(query.body_atoms().map(|(_, a)| a));
        let sql = render("COUNT(*)", &from, &body_where(query));
        self.count(&sql)
    }

    fn count_both_matches(&self, query: &MatchQuery) -> InspectorResult<u64> {
        self.check_query_schema(query)?;
        let from = from_clause(query.body_atoms().map(|(_, a)| a));
        let sql = render("COUNT(*)", &from, &both_where(query));
        self.count(&sql)
    }

    fn count_anchor_matches(&self, query: &MatchQuery) -> InspectorResult<u64> {
        self.check_query_schema(query)?;
        let anchor_alias = &query.atoms[query.anchor].alias;
        let select = format!("COUNT(DISTINCT {anchor_alias}.rowid)");
        let sql = if query.atoms[query.anchor].in_body {
            let from = from_clause(query.body_atoms().map(|(_, a)| a));
            render(&select, &from, &both_where(query))
        } else {
            // The anchor is existential: count its rows over the flat join of
            // every atom under all equalities.
            let from = from_clause(query.atoms.iter());
            let conjuncts: Vec<String> = query
                .equalities
                .iter()
                .map(|eq| equality_sql(query, eq))
                .collect();
            render(&select, &from, &conjuncts)
        };
        self.count(&sql)
    }
}
