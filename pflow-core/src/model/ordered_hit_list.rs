//! [`OrderedCaloHitList`]: pseudo-layer → hit ids, in insertion order.

use super::ids::HitId;
use std::collections::BTreeMap;

/// A mapping from pseudo-layer to the (insertion-ordered) hits in that
/// layer. Supports layer-wise iteration and merging.
#[derive(Clone, Debug, Default)]
pub struct OrderedCaloHitList {
    layers: BTreeMap<u32, Vec<HitId>>,
}

impl OrderedCaloHitList {
    /// An empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a hit into the given pseudo-layer, preserving insertion
    /// order within the layer.
    pub fn insert(&mut self, layer: u32, hit: HitId) {
        self.layers.entry(layer).or_default().push(hit);
    }

    /// Remove a hit from the given layer. No-op if absent.
    pub fn remove(&mut self, layer: u32, hit: HitId) {
        if let Some(hits) = self.layers.get_mut(&layer) {
            hits.retain(|&h| h != hit);
            if hits.is_empty() {
                self.layers.remove(&layer);
            }
        }
    }

    /// Merge `other` into `self`, consuming it.
    pub fn merge(&mut self, other: Self) {
        for (layer, hits) in other.layers {
            self.layers.entry(layer).or_default().extend(hits);
        }
    }

    /// Iterate layers in ascending pseudo-layer order.
    pub fn layers(&self) -> impl Iterator<Item = (u32, &[HitId])> {
        self.layers.iter().map(|(&layer, hits)| (layer, hits.as_slice()))
    }

    /// The lowest occupied pseudo-layer, if any.
    #[must_use]
    pub fn inner_layer(&self) -> Option<u32> {
        self.layers.keys().next().copied()
    }

    /// The highest occupied pseudo-layer, if any.
    #[must_use]
    pub fn outer_layer(&self) -> Option<u32> {
        self.layers.keys().next_back().copied()
    }

    /// Hits in a given layer, if any.
    #[must_use]
    pub fn layer(&self, layer: u32) -> &[HitId] {
        self.layers.get(&layer).map_or(&[], Vec::as_slice)
    }

    /// All hits, in ascending layer order (insertion order within layer).
    pub fn iter_all(&self) -> impl Iterator<Item = HitId> + '_ {
        self.layers.values().flatten().copied()
    }

    /// Number of occupied layers.
    #[must_use]
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Total number of hits across all layers.
    #[must_use]
    pub fn n_hits(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    /// True if no hits have been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_preserves_per_layer_order() {
        let mut a = OrderedCaloHitList::new();
        a.insert(1, HitId::from_index(0));
        a.insert(1, HitId::from_index(1));
        let mut b = OrderedCaloHitList::new();
        b.insert(1, HitId::from_index(2));
        a.merge(b);
        assert_eq!(
            a.layer(1),
            &[HitId::from_index(0), HitId::from_index(1), HitId::from_index(2)]
        );
    }

    #[test]
    fn inner_outer_layer() {
        let mut l = OrderedCaloHitList::new();
        l.insert(5, HitId::from_index(0));
        l.insert(2, HitId::from_index(1));
        l.insert(9, HitId::from_index(2));
        assert_eq!(l.inner_layer(), Some(2));
        assert_eq!(l.outer_layer(), Some(9));
    }
}
