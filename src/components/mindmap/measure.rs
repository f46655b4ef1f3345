use std::collections::HashMap;

use super::config::NodeSizes;
use super::geometry::HalfExtent;
use super::graph::NodeGraph;
use super::types::{Node, NodeId};

/// Changes below this many pixels are not worth a re-settle.
const MEASURE_TOLERANCE: f64 = 0.5;

#[derive(Clone, Debug)]
struct Measured {
	label: String,
	half: HalfExtent,
}

/// Side cache of measured node boxes.
///
/// Measurements arrive after the node is drawn; the collision resolver reads
/// this cache before each pass and falls back to the per-kind defaults for
/// nodes not measured yet (or whose label changed since).
#[derive(Clone, Debug, Default)]
pub struct SizeCache {
	measured: HashMap<NodeId, Measured>,
}

impl SizeCache {
	/// Stores a measured `width` x `height` box for `node`. Returns `true` when
	/// the stored extent changed enough to affect layout.
	pub fn record(&mut self, node: &Node, width: f64, height: f64) -> bool {
		if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
			return false;
		}
		let half = HalfExtent::from_size(width, height);
		let changed = match self.measured.get(&node.id) {
			Some(m) => {
				(m.half.w - half.w).abs() > MEASURE_TOLERANCE
					|| (m.half.h - half.h).abs() > MEASURE_TOLERANCE
			}
			None => true,
		};
		self.measured.insert(
			node.id.clone(),
			Measured {
				label: node.label.clone(),
				half,
			},
		);
		changed
	}

	/// Whether `node` has no measurement for its current label.
	pub fn needs_measure(&self, node: &Node) -> bool {
		self.measured
			.get(&node.id)
			.is_none_or(|m| m.label != node.label)
	}

	pub fn half_extent(&self, node: &Node, defaults: &NodeSizes) -> HalfExtent {
		match self.measured.get(&node.id) {
			Some(m) if m.label == node.label => m.half,
			_ => defaults.for_kind(node.kind),
		}
	}

	pub fn forget(&mut self, id: &NodeId) {
		self.measured.remove(id);
	}

	/// Drops measurements of nodes no longer in `graph`.
	pub fn retain_graph(&mut self, graph: &NodeGraph) {
		self.measured.retain(|id, _| graph.contains(id));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::mindmap::types::NodeKind;

	fn leaf(label: &str) -> Node {
		Node {
			id: NodeId::idea("1"),
			kind: NodeKind::Leaf,
			label: label.into(),
			parent: Some(NodeId::root()),
			idea: Some("1".into()),
			color_slot: None,
		}
	}

	#[test]
	fn falls_back_until_measured() {
		let sizes = NodeSizes::default();
		let mut cache = SizeCache::default();
		let node = leaf("Pricing");
		assert_eq!(cache.half_extent(&node, &sizes), sizes.leaf);
		assert!(cache.needs_measure(&node));

		assert!(cache.record(&node, 200.0, 50.0));
		assert_eq!(cache.half_extent(&node, &sizes), HalfExtent::new(100.0, 25.0));
		assert!(!cache.record(&node, 200.2, 50.0));
		assert!(!cache.needs_measure(&node));
	}

	#[test]
	fn relabel_invalidates() {
		let sizes = NodeSizes::default();
		let mut cache = SizeCache::default();
		cache.record(&leaf("Pricing"), 200.0, 50.0);
		let renamed = leaf("Pricing tiers");
		assert!(cache.needs_measure(&renamed));
		assert_eq!(cache.half_extent(&renamed, &sizes), sizes.leaf);
	}

	#[test]
	fn rejects_degenerate_measurements() {
		let mut cache = SizeCache::default();
		let node = leaf("x");
		assert!(!cache.record(&node, f64::NAN, 10.0));
		assert!(!cache.record(&node, 0.0, 10.0));
		assert!(cache.needs_measure(&node));
	}
}
