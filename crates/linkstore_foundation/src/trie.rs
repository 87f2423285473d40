//! Persistent slot map with structural sharing.
//!
//! [`SlotTrie`] is a big-endian Patricia trie keyed by `u64` slot numbers.
//! Nodes are reference counted and never mutated: `insert` and `remove`
//! copy only the path from the affected leaf to the root and return a new
//! trie, so every untouched subtree stays physically shared with the
//! original. [`SlotTrie::diff`] relies on that sharing and skips any pair of
//! subtrees that are the same allocation.

use std::fmt;
use std::sync::Arc;

/// Returns the lowest set bit of `x` (0 if `x` is 0).
#[must_use]
pub const fn lowest_bit(x: u64) -> u64 {
    x & x.wrapping_neg()
}

/// Returns the highest set bit of `x` (0 if `x` is 0).
#[must_use]
pub const fn highest_bit(x: u64) -> u64 {
    if x == 0 {
        0
    } else {
        1 << (63 - x.leading_zeros())
    }
}

/// Returns the highest bit at which two keys differ.
#[must_use]
pub const fn branching_bit(p0: u64, p1: u64) -> u64 {
    highest_bit(p0 ^ p1)
}

/// Keeps the bits of `key` strictly above the branching bit `m`.
#[inline]
const fn mask(key: u64, m: u64) -> u64 {
    key & (!(m.wrapping_sub(1)) ^ m)
}

#[inline]
const fn is_zero_at(key: u64, m: u64) -> bool {
    key & m == 0
}

#[inline]
const fn matches_prefix(key: u64, prefix: u64, m: u64) -> bool {
    mask(key, m) == prefix
}

enum Node<V> {
    Leaf {
        key: u64,
        value: V,
    },
    Branch {
        prefix: u64,
        bit: u64,
        left: Arc<Node<V>>,
        right: Arc<Node<V>>,
    },
}

impl<V> Node<V> {
    fn get(&self, key: u64) -> Option<&V> {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { key: k, value } => return (*k == key).then_some(value),
                Node::Branch {
                    prefix,
                    bit,
                    left,
                    right,
                } => {
                    if !matches_prefix(key, *prefix, *bit) {
                        return None;
                    }
                    node = if is_zero_at(key, *bit) { left } else { right };
                }
            }
        }
    }

    fn for_each<'a>(&'a self, f: &mut impl FnMut(u64, &'a V)) {
        match self {
            Node::Leaf { key, value } => f(*key, value),
            Node::Branch { left, right, .. } => {
                left.for_each(f);
                right.for_each(f);
            }
        }
    }

    /// Prefix identifying this subtree (the key itself for a leaf).
    #[cfg(test)]
    fn prefix(&self) -> u64 {
        match self {
            Node::Leaf { key, .. } => *key,
            Node::Branch { prefix, .. } => *prefix,
        }
    }
}

fn join<V>(p0: u64, t0: Arc<Node<V>>, p1: u64, t1: Arc<Node<V>>) -> Arc<Node<V>> {
    let bit = branching_bit(p0, p1);
    let prefix = mask(p0, bit);
    let (left, right) = if is_zero_at(p0, bit) { (t0, t1) } else { (t1, t0) };
    Arc::new(Node::Branch {
        prefix,
        bit,
        left,
        right,
    })
}

/// Returns the new subtree and whether the key was newly added.
fn insert_node<V>(node: &Arc<Node<V>>, key: u64, value: V) -> (Arc<Node<V>>, bool) {
    match &**node {
        Node::Leaf { key: k, .. } if *k == key => (Arc::new(Node::Leaf { key, value }), false),
        Node::Leaf { key: k, .. } => (
            join(key, Arc::new(Node::Leaf { key, value }), *k, Arc::clone(node)),
            true,
        ),
        Node::Branch {
            prefix,
            bit,
            left,
            right,
        } => {
            if !matches_prefix(key, *prefix, *bit) {
                let leaf = Arc::new(Node::Leaf { key, value });
                return (join(key, leaf, *prefix, Arc::clone(node)), true);
            }
            let (left, right, added) = if is_zero_at(key, *bit) {
                let (left, added) = insert_node(left, key, value);
                (left, Arc::clone(right), added)
            } else {
                let (right, added) = insert_node(right, key, value);
                (Arc::clone(left), right, added)
            };
            let branch = Node::Branch {
                prefix: *prefix,
                bit: *bit,
                left,
                right,
            };
            (Arc::new(branch), added)
        }
    }
}

/// Returns `None` when the key is absent, otherwise the replacement subtree
/// (which is itself `None` when the subtree became empty).
#[allow(clippy::option_option)]
fn remove_node<V>(node: &Arc<Node<V>>, key: u64) -> Option<Option<Arc<Node<V>>>> {
    match &**node {
        Node::Leaf { key: k, .. } => (*k == key).then_some(None),
        Node::Branch {
            prefix,
            bit,
            left,
            right,
        } => {
            if !matches_prefix(key, *prefix, *bit) {
                return None;
            }
            let replaced = if is_zero_at(key, *bit) {
                match remove_node(left, key)? {
                    None => Arc::clone(right),
                    Some(left) => Arc::new(Node::Branch {
                        prefix: *prefix,
                        bit: *bit,
                        left,
                        right: Arc::clone(right),
                    }),
                }
            } else {
                match remove_node(right, key)? {
                    None => Arc::clone(left),
                    Some(right) => Arc::new(Node::Branch {
                        prefix: *prefix,
                        bit: *bit,
                        left: Arc::clone(left),
                        right,
                    }),
                }
            };
            Some(Some(replaced))
        }
    }
}

/// One difference reported by [`SlotTrie::diff`].
#[derive(Debug, PartialEq)]
pub enum TrieChange<'a, V> {
    /// Key present only in the newer trie.
    Added(u64, &'a V),
    /// Key present only in the older trie.
    Removed(u64, &'a V),
    /// Key present in both with values that are not the same.
    Changed {
        /// The key.
        key: u64,
        /// Value in the older trie.
        old: &'a V,
        /// Value in the newer trie.
        new: &'a V,
    },
}

impl<V> TrieChange<'_, V> {
    /// Returns the key this change concerns.
    #[must_use]
    pub fn key(&self) -> u64 {
        match self {
            Self::Added(key, _) | Self::Removed(key, _) | Self::Changed { key, .. } => *key,
        }
    }
}

struct DiffSink<'a, 'f, V, F> {
    same: &'f F,
    out: Vec<TrieChange<'a, V>>,
}

impl<'a, V, F: Fn(&V, &V) -> bool> DiffSink<'a, '_, V, F> {
    fn all_added(&mut self, node: &'a Node<V>) {
        node.for_each(&mut |k, v| self.out.push(TrieChange::Added(k, v)));
    }

    fn all_removed(&mut self, node: &'a Node<V>) {
        node.for_each(&mut |k, v| self.out.push(TrieChange::Removed(k, v)));
    }

    fn compare(&mut self, key: u64, old: &'a V, new: &'a V) {
        if !(self.same)(old, new) {
            self.out.push(TrieChange::Changed { key, old, new });
        }
    }

    fn diff(&mut self, a: &'a Arc<Node<V>>, b: &'a Arc<Node<V>>) {
        if Arc::ptr_eq(a, b) {
            return;
        }
        match (&**a, &**b) {
            (Node::Leaf { key: ka, value: va }, Node::Leaf { key: kb, value: vb }) => {
                if ka == kb {
                    self.compare(*ka, va, vb);
                } else {
                    self.out.push(TrieChange::Removed(*ka, va));
                    self.out.push(TrieChange::Added(*kb, vb));
                }
            }
            (Node::Leaf { key, value }, Node::Branch { .. }) => {
                let mut found = false;
                b.for_each(&mut |k, v| {
                    if k == *key {
                        found = true;
                        if !(self.same)(value, v) {
                            self.out.push(TrieChange::Changed {
                                key: k,
                                old: value,
                                new: v,
                            });
                        }
                    } else {
                        self.out.push(TrieChange::Added(k, v));
                    }
                });
                if !found {
                    self.out.push(TrieChange::Removed(*key, value));
                }
            }
            (Node::Branch { .. }, Node::Leaf { key, value }) => {
                let mut found = false;
                a.for_each(&mut |k, v| {
                    if k == *key {
                        found = true;
                        if !(self.same)(v, value) {
                            self.out.push(TrieChange::Changed {
                                key: k,
                                old: v,
                                new: value,
                            });
                        }
                    } else {
                        self.out.push(TrieChange::Removed(k, v));
                    }
                });
                if !found {
                    self.out.push(TrieChange::Added(*key, value));
                }
            }
            (
                Node::Branch {
                    prefix: pa,
                    bit: ma,
                    left: la,
                    right: ra,
                },
                Node::Branch {
                    prefix: pb,
                    bit: mb,
                    left: lb,
                    right: rb,
                },
            ) => {
                if ma == mb && pa == pb {
                    self.diff(la, lb);
                    self.diff(ra, rb);
                } else if ma > mb && matches_prefix(*pb, *pa, *ma) {
                    // `b` lies entirely on one side of `a`.
                    if is_zero_at(*pb, *ma) {
                        self.diff(la, b);
                        self.all_removed(ra);
                    } else {
                        self.all_removed(la);
                        self.diff(ra, b);
                    }
                } else if mb > ma && matches_prefix(*pa, *pb, *mb) {
                    if is_zero_at(*pa, *mb) {
                        self.diff(a, lb);
                        self.all_added(rb);
                    } else {
                        self.all_added(lb);
                        self.diff(a, rb);
                    }
                } else {
                    self.all_removed(a);
                    self.all_added(b);
                }
            }
        }
    }
}

/// Persistent map from slot numbers to values.
///
/// Clone is O(1). `insert` and `remove` are O(log n) in the key width and
/// return a new trie sharing every untouched subtree with the original.
pub struct SlotTrie<V> {
    root: Option<Arc<Node<V>>>,
    len: usize,
}

impl<V> Clone for SlotTrie<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<V> Default for SlotTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SlotTrie<V> {
    /// Creates an empty trie.
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the trie has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Gets the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<&V> {
        self.root.as_deref().and_then(|root| root.get(key))
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: u64) -> bool {
        self.get(key).is_some()
    }

    /// Returns a new trie with `value` stored under `key`.
    #[must_use]
    pub fn insert(&self, key: u64, value: V) -> Self {
        match &self.root {
            None => Self {
                root: Some(Arc::new(Node::Leaf { key, value })),
                len: 1,
            },
            Some(root) => {
                let (root, added) = insert_node(root, key, value);
                Self {
                    root: Some(root),
                    len: self.len + usize::from(added),
                }
            }
        }
    }

    /// Returns a new trie without `key`.
    ///
    /// Removing an absent key returns a trie that still shares its root.
    #[must_use]
    pub fn remove(&self, key: u64) -> Self {
        let Some(root) = &self.root else {
            return self.clone();
        };
        match remove_node(root, key) {
            None => self.clone(),
            Some(root) => Self {
                root,
                len: self.len - 1,
            },
        }
    }

    /// Returns true if both tries share the same root allocation.
    ///
    /// Equal pointers imply equal contents; the converse does not hold.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Iterates over entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            stack: self.root.as_deref().into_iter().collect(),
        }
    }

    /// Iterates over keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Computes the differences from `self` (older) to `newer`.
    ///
    /// Subtrees shared between the two tries are skipped without being
    /// visited, so the cost is proportional to the diverged paths rather
    /// than the size of the tries. Values under the same key are reported
    /// as changed when `same` returns false. Results are sorted by key.
    pub fn diff<'a, F>(&'a self, newer: &'a Self, same: F) -> Vec<TrieChange<'a, V>>
    where
        F: Fn(&V, &V) -> bool,
    {
        let mut sink = DiffSink {
            same: &same,
            out: Vec::new(),
        };
        match (&self.root, &newer.root) {
            (None, None) => {}
            (Some(a), None) => sink.all_removed(a),
            (None, Some(b)) => sink.all_added(b),
            (Some(a), Some(b)) => sink.diff(a, b),
        }
        // Removed sorts before Added for a key that changed occupant.
        sink.out.sort_by_key(|change| {
            (
                change.key(),
                !matches!(change, TrieChange::Removed(..)),
            )
        });
        sink.out
    }

    /// Returns the smallest key, if any.
    #[must_use]
    pub fn first_key(&self) -> Option<u64> {
        self.iter().next().map(|(key, _)| key)
    }

    #[cfg(test)]
    fn root_prefix(&self) -> Option<u64> {
        self.root.as_deref().map(Node::prefix)
    }
}

impl<V: fmt::Debug> fmt::Debug for SlotTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V: PartialEq> PartialEq for SlotTrie<V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.len == other.len && self.iter().eq(other.iter()))
    }
}

impl<V: Eq> Eq for SlotTrie<V> {}

impl<V> FromIterator<(u64, V)> for SlotTrie<V> {
    fn from_iter<I: IntoIterator<Item = (u64, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |trie, (key, value)| trie.insert(key, value))
    }
}

impl<'a, V> IntoIterator for &'a SlotTrie<V> {
    type Item = (u64, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`SlotTrie`] in ascending key order.
pub struct Iter<'a, V> {
    stack: Vec<&'a Node<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (u64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Node::Leaf { key, value } => return Some((*key, value)),
                Node::Branch { left, right, .. } => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
            }
        }
        None
    }
}
