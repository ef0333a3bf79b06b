//! Sparse feature vectors in the solver's index space.

use serde::{Deserialize, Serialize};

/// One non-zero entry of a sparse vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureNode {
    /// 1-based global feature index.
    pub index: u32,
    /// Feature value. Indicator features always carry 1.
    pub value: f64,
}

impl FeatureNode {
    /// Creates a new node.
    #[inline]
    pub const fn new(index: u32, value: f64) -> Self {
        Self { index, value }
    }

    /// Creates an indicator node (`value == 1`).
    #[inline]
    pub const fn indicator(index: u32) -> Self {
        Self { index, value: 1.0 }
    }
}

/// The non-zero entries of one encoded example.
///
/// Vectors produced by [`SparseEncoder`](crate::encode::SparseEncoder) have
/// strictly increasing indices. Vectors assembled by hand can be brought
/// into that form with [`normalize`](Self::normalize).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    nodes: Vec<FeatureNode>,
}

impl SparseVector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Creates an empty vector with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Wraps existing nodes without reordering them.
    pub fn from_nodes(nodes: Vec<FeatureNode>) -> Self {
        Self { nodes }
    }

    /// Appends a node.
    #[inline]
    pub fn push(&mut self, node: FeatureNode) {
        self.nodes.push(node);
    }

    /// Returns the number of non-zero entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if there are no non-zero entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over the nodes in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, FeatureNode> {
        self.nodes.iter()
    }

    /// Returns the nodes.
    pub fn as_slice(&self) -> &[FeatureNode] {
        &self.nodes
    }

    /// Returns the indices in storage order.
    pub fn indices(&self) -> Vec<u32> {
        self.nodes.iter().map(|n| n.index).collect()
    }

    /// Returns the largest index, or 0 for an empty vector.
    pub fn max_index(&self) -> u32 {
        self.nodes.iter().map(|n| n.index).max().unwrap_or(0)
    }

    /// Returns true if indices are strictly increasing.
    pub fn is_strictly_increasing(&self) -> bool {
        self.nodes.windows(2).all(|w| w[0].index < w[1].index)
    }

    /// Sorts by index and drops repeated indices, keeping the first.
    pub fn normalize(&mut self) {
        if self.is_strictly_increasing() {
            return;
        }
        self.nodes.sort_by_key(|n| n.index);
        self.nodes.dedup_by_key(|n| n.index);
    }

    /// Squared L2 norm.
    pub fn norm_squared(&self) -> f64 {
        self.nodes.iter().map(|n| n.value * n.value).sum()
    }

    /// Consumes the vector, returning its nodes.
    pub fn into_nodes(self) -> Vec<FeatureNode> {
        self.nodes
    }
}

impl<'a> IntoIterator for &'a SparseVector {
    type Item = &'a FeatureNode;
    type IntoIter = std::slice::Iter<'a, FeatureNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl FromIterator<FeatureNode> for SparseVector {
    fn from_iter<I: IntoIterator<Item = FeatureNode>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_accessors() {
        let v: SparseVector = [2, 5, 9].into_iter().map(FeatureNode::indicator).collect();
        assert_eq!(v.len(), 3);
        assert_eq!(v.indices(), vec![2, 5, 9]);
        assert_eq!(v.max_index(), 9);
        assert!(v.is_strictly_increasing());
        assert_eq!(v.norm_squared(), 3.0);
        assert_eq!(SparseVector::new().max_index(), 0);
    }

    #[test]
    fn test_normalize() {
        let mut v = SparseVector::from_nodes(vec![
            FeatureNode::indicator(3),
            FeatureNode::indicator(1),
            FeatureNode::new(3, 2.0),
        ]);
        assert!(!v.is_strictly_increasing());
        v.normalize();
        assert_eq!(v.indices(), vec![1, 3]);
        assert_eq!(v.as_slice()[1].value, 1.0);
    }
}
