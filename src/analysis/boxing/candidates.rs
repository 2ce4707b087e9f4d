//! Candidate set with taint propagation over merge classes.
//!
//! Box sites that meet at a join point become indistinguishable at run time, so either
//! all of them are eliminated or none is. The set keeps a union-find forest over box
//! sites: [`CandidateSet::merge`] unions two classes, and disqualification taints a whole
//! class at once. A class that is tainted stays tainted; nothing is ever re-admitted.
//!
//! # Example
//!
//! ```rust
//! use boxelide::analysis::boxing::CandidateSet;
//! # use boxelide::assembly::{MethodBuilder, PrimitiveType};
//! # let body = MethodBuilder::new("ids").const_int(1).const_int(2).const_int(3).ret_void().build()?;
//! # let ids: Vec<_> = body.iter().map(|insn| insn.id).collect();
//! # let (a, b, c) = (ids[0], ids[1], ids[2]);
//!
//! let mut candidates = CandidateSet::new();
//! candidates.add(a);
//! candidates.add(b);
//! candidates.add(c);
//! candidates.merge(a, b);
//!
//! candidates.remove(b);
//! assert!(!candidates.contains(a));
//! assert!(candidates.contains(c));
//! # Ok::<(), boxelide::Error>(())
//! ```

use std::collections::HashMap;

use crate::assembly::InsnId;

/// Box sites currently believed safe to eliminate.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Dense index of every site ever seen
    index: HashMap<InsnId, usize>,
    /// Site for each dense index
    sites: Vec<InsnId>,
    /// Union-find parent links
    parent: Vec<usize>,
    /// Union-by-rank heights
    rank: Vec<u8>,
    /// Taint flag, meaningful on class roots only
    tainted: Vec<bool>,
}

impl CandidateSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a newly observed box site.
    ///
    /// A site that is already known keeps its current state, so a site removed earlier
    /// is never re-admitted.
    pub fn add(&mut self, site: InsnId) {
        self.intern(site, false);
    }

    /// Disqualifies `site` and every site ever merged with it.
    pub fn remove(&mut self, site: InsnId) {
        let node = self.intern(site, true);
        let root = self.find_compress(node);
        self.tainted[root] = true;
    }

    /// Records that `a` and `b` met at a join point.
    ///
    /// If either side is not a member, the other side is disqualified with it.
    pub fn merge(&mut self, a: InsnId, b: InsnId) {
        let a = self.intern(a, true);
        let b = self.intern(b, true);
        let (ra, rb) = (self.find_compress(a), self.find_compress(b));
        if ra == rb {
            return;
        }
        let tainted = self.tainted[ra] || self.tainted[rb];
        let root = match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => {
                self.parent[ra] = rb;
                rb
            }
            std::cmp::Ordering::Greater => {
                self.parent[rb] = ra;
                ra
            }
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
                ra
            }
        };
        self.tainted[root] = tainted;
    }

    /// Whether `site` is still a candidate.
    #[must_use]
    pub fn contains(&self, site: InsnId) -> bool {
        self.index
            .get(&site)
            .is_some_and(|&node| !self.tainted[self.find(node)])
    }

    /// Returns `true` if no site is a candidate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Number of current candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Iterates over the current candidates in admission order.
    pub fn iter(&self) -> impl Iterator<Item = InsnId> + '_ {
        (0..self.sites.len())
            .filter(|&node| !self.tainted[self.find(node)])
            .map(|node| self.sites[node])
    }

    /// Returns the dense index of `site`, creating a singleton class if it is new.
    ///
    /// New sites are tainted unless `tainted` is false. Only [`CandidateSet::add`]
    /// creates untainted classes.
    fn intern(&mut self, site: InsnId, tainted: bool) -> usize {
        if let Some(&node) = self.index.get(&site) {
            return node;
        }
        let node = self.sites.len();
        self.index.insert(site, node);
        self.sites.push(site);
        self.parent.push(node);
        self.rank.push(0);
        self.tainted.push(tainted);
        node
    }

    fn find(&self, mut node: usize) -> usize {
        while self.parent[node] != node {
            node = self.parent[node];
        }
        node
    }

    /// Finds the root of `node` and points every node on the way directly at it.
    fn find_compress(&mut self, node: usize) -> usize {
        let root = self.find(node);
        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }
}
