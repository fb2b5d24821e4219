//! Attribute-compatibility analysis.
//!
//! Decides which attribute pairs may share a variable in a candidate rule,
//! reducing the exponential space of possible joins to the semantically
//! meaningful ones. A pair is compatible iff the coarse type classes agree
//! and there is domain evidence: a declared foreign key in either
//! direction, or a value overlap of at least `tau_overlap` backed by at
//! least `overlap_floor` common values.
//!
//! The result is a symmetric relation. Identical attributes are trivially
//! compatible (self-joins); attributes with zero distinct values are
//! compatible with nothing.

use std::collections::{BTreeMap, HashSet};

use crate::attrs::{AttrId, AttributeInterner};
use crate::config::DiscoveryConfig;
use crate::inspector::{Inspector, InspectorResult};

/// The symmetric compatibility relation over interned attributes.
#[derive(Debug)]
pub struct CompatibilityRelation {
    /// Sorted neighbor lists, excluding the attribute itself.
    adjacency: Vec<Vec<AttrId>>,
    /// Normalized `(min, max)` pairs for O(1) membership tests.
    pairs: HashSet<(AttrId, AttrId)>,
    /// Whether the attribute may be unified with another occurrence of
    /// itself. Identical references are trivially compatible, but the
    /// triviality only counts for attributes that are evidenced join
    /// columns: a column compatible with nothing else gains nothing from
    /// matching itself, and admitting it would turn every table into a
    /// degenerate self-join generator.
    self_compatible: Vec<bool>,
}

impl CompatibilityRelation {
    /// Whether two attributes may share a variable.
    pub fn compatible(&self, a: AttrId, b: AttrId) -> bool {
        if a == b {
            return self.self_compatible[a.0 as usize];
        }
        let key = if a < b { (a, b) } else { (b, a) };
        self.pairs.contains(&key)
    }

    /// Compatible partners of an attribute, in ascending id order.
    pub fn neighbors(&self, a: AttrId) -> &[AttrId] {
        &self.adjacency[a.0 as usize]
    }

    /// Number of distinct compatible pairs (unordered, excluding
    /// self-pairs).
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Export as `{attribute_key: [compatible_attribute_key, …]}`, the
    /// shape of the `compatibility_<db>.json` side file.
    pub fn to_json(&self, interner: &AttributeInterner) -> serde_json::Value {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (id, _) in interner.iter() {
            let partners = self
                .neighbors(id)
                .iter()
                .map(|&other| interner.key(other))
                .collect();
            map.insert(interner.key(id), partners);
        }
        serde_json::json!(map)
    }
}

/// Builds the compatibility relation from schema and data evidence.
pub struct CompatibilityAnalyzer<'a> {
    inspector: &'a dyn Inspector,
    interner: &'a AttributeInterner,
    config: &'a DiscoveryConfig,
}

impl<'a> CompatibilityAnalyzer<'a> {
    pub fn new(
        inspector: &'a dyn Inspector,
        interner: &'a AttributeInterner,
        config: &'a DiscoveryConfig,
    ) -> Self {
        Self {
            inspector,
            interner,
            config,
        }
    }

    /// Analyze every attribute pair. Declared foreign keys short-circuit
    /// the (potentially expensive) overlap probe.
    pub fn analyze(&self) -> InspectorResult<CompatibilityRelation> {
        let n = self.interner.attr_count();

        let fk_pairs: HashSet<(AttrId, AttrId)> = self
            .interner
            .foreign_key_pairs()
            .iter()
            .map(|&(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect();

        let mut pairs = HashSet::new();
        let mut adjacency = vec![Vec::new(); n];

        for i in 0..n {
            let a = AttrId(i as u32);
            let attr_a = self.interner.attr(a);
            if attr_a.distinct_count == 0 {
                continue;
            }
            for j in (i + 1)..n {
                let b = AttrId(j as u32);
                let attr_b = self.interner.attr(b);
                if attr_b.distinct_count == 0 || attr_a.ty != attr_b.ty {
                    continue;
                }
                let compatible = fk_pairs.contains(&(a, b)) || self.overlap_evidence(a, b)?;
                if compatible {
                    pairs.insert((a, b));
                    adjacency[i].push(b);
                    adjacency[j].push(a);
                }
            }
        }

        for list in &mut adjacency {
            list.sort_unstable();
        }

        let self_compatible = self
            .interner
            .iter()
            .map(|(id, attr)| attr.distinct_count > 0 && !adjacency[id.0 as usize].is_empty())
            .collect();

        Ok(CompatibilityRelation {
            adjacency,
            pairs,
            self_compatible,
        })
    }

    /// Overlap test: ratio above `tau_overlap` and enough common values to
    /// rule out tiny-cardinality noise.
    fn overlap_evidence(&self, a: AttrId, b: AttrId) -> InspectorResult<bool> {
        let attr_a = self.interner.attr(a);
        let attr_b = self.interner.attr(b);
        let ratio = self.inspector.overlap_ratio(
            self.interner.table_name(attr_a.table),
            &attr_a.column,
            self.interner.table_name(attr_b.table),
            &attr_b.column,
        )?;
        if ratio < self.config.tau_overlap {
            return Ok(false);
        }
        let min_distinct = attr_a.distinct_count.min(attr_b.distinct_count);
        let common = (ratio * min_distinct as f64).round() as u64;
        Ok(common >= self.config.overlap_floor)
    }
}
