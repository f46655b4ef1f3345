use log::debug;

use super::config::{CollisionConfig, NodeSizes};
use super::geometry::{HalfExtent, Point};
use super::graph::{NodeGraph, Visibility};
use super::measure::SizeCache;
use super::types::{NodeId, NodeKind, PositionMap};

/// Overlaps at or below this are treated as touching.
const OVERLAP_EPSILON: f64 = 1e-6;

/// Which pairs a resolution run may adjust.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SettleScope<'a> {
	/// Every pair of visible non-root nodes, after a structural change.
	Global,
	/// Only pairs involving the node under the pointer, on every drag update.
	DragLocal(&'a NodeId),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettleReport {
	pub passes: usize,
	pub adjustments: usize,
	/// A full pass made no adjustment before the pass cap was hit.
	pub converged: bool,
}

struct Body {
	id: NodeId,
	center: Point,
	half: HalfExtent,
}

/// Pushes overlapping boxes apart by iterative pairwise relaxation.
///
/// The root never participates and so never moves. Each pass visits pairs in
/// node order and splits the minimum translation evenly between both nodes.
pub fn resolve_overlaps(
	graph: &NodeGraph,
	visibility: &Visibility,
	positions: &mut PositionMap,
	sizes: &SizeCache,
	defaults: &NodeSizes,
	cfg: &CollisionConfig,
	scope: SettleScope<'_>,
) -> SettleReport {
	let mut bodies: Vec<Body> = graph
		.nodes()
		.iter()
		.filter(|n| n.kind != NodeKind::Root && !visibility.is_hidden(&n.id))
		.filter_map(|n| {
			positions.get(&n.id).map(|&center| Body {
				id: n.id.clone(),
				center,
				half: sizes.half_extent(n, defaults),
			})
		})
		.collect();

	let focus = match scope {
		SettleScope::Global => None,
		SettleScope::DragLocal(id) => match bodies.iter().position(|b| b.id == *id) {
			Some(i) => Some(i),
			None => return SettleReport::default(),
		},
	};

	let mut report = SettleReport::default();
	for _ in 0..cfg.max_passes {
		let mut moved = 0;
		for i in 0..bodies.len() {
			for j in (i + 1)..bodies.len() {
				if focus.is_some_and(|f| f != i && f != j) {
					continue;
				}
				let (a, b) = (&bodies[i], &bodies[j]);
				if let Some(shift) = separation(a.center, a.half, b.center, b.half, cfg.padding) {
					bodies[i].center -= shift;
					bodies[j].center += shift;
					moved += 1;
				}
			}
		}
		report.passes += 1;
		report.adjustments += moved;
		if moved == 0 {
			report.converged = true;
			break;
		}
	}

	for body in bodies {
		positions.insert(body.id, body.center);
	}
	if report.adjustments > 0 {
		debug!(
			"collision {:?}: {} adjustments in {} passes (converged: {})",
			scope, report.adjustments, report.passes, report.converged
		);
	}
	report
}

/// Half of the minimum translation separating two boxes, or `None` if they
/// don't overlap. Subtract it from `a` and add it to `b`.
///
/// The smaller overlap axis wins; a zero center delta pushes `b` toward +x/+y.
pub fn separation(a: Point, a_half: HalfExtent, b: Point, b_half: HalfExtent, padding: f64) -> Option<Point> {
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	let overlap_x = a_half.w + b_half.w + padding - dx.abs();
	let overlap_y = a_half.h + b_half.h + padding - dy.abs();
	if overlap_x <= OVERLAP_EPSILON || overlap_y <= OVERLAP_EPSILON {
		return None;
	}
	Some(if overlap_x <= overlap_y {
		Point::new(direction(dx) * overlap_x / 2.0, 0.0)
	} else {
		Point::new(0.0, direction(dy) * overlap_y / 2.0)
	})
}

fn direction(delta: f64) -> f64 {
	if delta < 0.0 { -1.0 } else { 1.0 }
}

/// Whether any two visible non-root nodes still overlap.
#[cfg(test)]
pub fn has_overlap(
	graph: &NodeGraph,
	visibility: &Visibility,
	positions: &PositionMap,
	sizes: &SizeCache,
	defaults: &NodeSizes,
	padding: f64,
) -> bool {
	let boxes: Vec<(Point, HalfExtent)> = graph
		.nodes()
		.iter()
		.filter(|n| n.kind != NodeKind::Root && !visibility.is_hidden(&n.id))
		.filter_map(|n| positions.get(&n.id).map(|&p| (p, sizes.half_extent(n, defaults))))
		.collect();
	boxes.iter().enumerate().any(|(i, &(a, ah))| {
		boxes[i + 1..]
			.iter()
			.any(|&(b, bh)| separation(a, ah, b, bh, padding).is_some())
	})
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;
	use crate::components::mindmap::testing::{branch, idea};

	fn no_padding() -> CollisionConfig {
		CollisionConfig {
			padding: 0.0,
			..CollisionConfig::default()
		}
	}

	#[test]
	fn separates_along_smaller_overlap() {
		// 30px of x overlap, 10px of y overlap.
		let half = HalfExtent::new(50.0, 20.0);
		let shift = separation(Point::new(0.0, 0.0), half, Point::new(70.0, 30.0), half, 0.0);
		assert_eq!(shift, Some(Point::new(0.0, 5.0)));
	}

	#[test]
	fn zero_delta_pushes_positive() {
		let half = HalfExtent::new(10.0, 30.0);
		let shift = separation(Point::ORIGIN, half, Point::ORIGIN, half, 0.0);
		assert_eq!(shift, Some(Point::new(10.0, 0.0)));
	}

	#[test]
	fn touching_boxes_do_not_overlap() {
		let half = HalfExtent::new(10.0, 10.0);
		assert_eq!(separation(Point::ORIGIN, half, Point::new(20.0, 0.0), half, 0.0), None);
		assert!(separation(Point::ORIGIN, half, Point::new(20.0, 0.0), half, 4.0).is_some());
	}

	#[test]
	fn global_settle_moves_both_and_leaves_root() {
		let ideas = [idea("1", None, None), idea("2", None, None)];
		let graph = NodeGraph::project(&ideas, &[], "r");
		let mut pos = PositionMap::new();
		pos.insert(NodeId::root(), Point::new(0.0, 0.0));
		pos.insert(NodeId::idea("1"), Point::new(0.0, 0.0));
		pos.insert(NodeId::idea("2"), Point::new(70.0, 30.0));
		let defaults = NodeSizes {
			leaf: HalfExtent::new(50.0, 20.0),
			..NodeSizes::default()
		};
		let report = resolve_overlaps(
			&graph,
			&Visibility::default(),
			&mut pos,
			&SizeCache::default(),
			&defaults,
			&no_padding(),
			SettleScope::Global,
		);
		assert!(report.converged);
		assert_eq!(report.adjustments, 1);
		assert_eq!(pos[&NodeId::idea("1")], Point::new(0.0, -5.0));
		assert_eq!(pos[&NodeId::idea("2")], Point::new(70.0, 35.0));
		assert_eq!(pos[&NodeId::root()], Point::ORIGIN);
	}

	#[test]
	fn hidden_nodes_are_ignored() {
		let ideas = [idea("1", None, Some("A")), idea("2", None, None)];
		let graph = NodeGraph::project(&ideas, &[branch("A", None)], "r");
		let mut vis = Visibility::default();
		vis.set_collapsed(&graph, &NodeId::branch("A"), true);
		let mut pos = PositionMap::new();
		pos.insert(NodeId::branch("A"), Point::new(0.0, -500.0));
		pos.insert(NodeId::idea("1"), Point::new(3.0, 3.0));
		pos.insert(NodeId::idea("2"), Point::new(0.0, 0.0));
		let report = resolve_overlaps(
			&graph,
			&vis,
			&mut pos,
			&SizeCache::default(),
			&NodeSizes::default(),
			&CollisionConfig::default(),
			SettleScope::Global,
		);
		assert_eq!(report.adjustments, 0);
		assert_eq!(pos[&NodeId::idea("1")], Point::new(3.0, 3.0));
	}

	#[test]
	fn drag_local_only_touches_pairs_with_the_dragged_node() {
		let ideas = [idea("1", None, None), idea("2", None, None), idea("3", None, None)];
		let graph = NodeGraph::project(&ideas, &[], "r");
		let mut pos = PositionMap::new();
		pos.insert(NodeId::idea("1"), Point::new(0.0, 0.0));
		pos.insert(NodeId::idea("2"), Point::new(10.0, 0.0));
		pos.insert(NodeId::idea("3"), Point::new(1000.0, 1000.0));
		let dragged = NodeId::idea("3");
		let report = resolve_overlaps(
			&graph,
			&Visibility::default(),
			&mut pos,
			&SizeCache::default(),
			&NodeSizes::default(),
			&CollisionConfig::default(),
			SettleScope::DragLocal(&dragged),
		);
		assert!(report.converged);
		assert_eq!(report.adjustments, 0);
		assert_eq!(pos[&NodeId::idea("2")], Point::new(10.0, 0.0));

		let dragged = NodeId::idea("1");
		let report = resolve_overlaps(
			&graph,
			&Visibility::default(),
			&mut pos,
			&SizeCache::default(),
			&NodeSizes::default(),
			&CollisionConfig::default(),
			SettleScope::DragLocal(&dragged),
		);
		assert!(report.adjustments > 0);
		assert!(separation(
			pos[&NodeId::idea("1")],
			NodeSizes::default().leaf,
			pos[&NodeId::idea("2")],
			NodeSizes::default().leaf,
			CollisionConfig::default().padding,
		)
		.is_none());
	}

	#[test]
	fn measured_sizes_are_used() {
		let ideas = [idea("1", None, None), idea("2", None, None)];
		let graph = NodeGraph::project(&ideas, &[], "r");
		let mut pos = PositionMap::new();
		pos.insert(NodeId::idea("1"), Point::new(0.0, 0.0));
		pos.insert(NodeId::idea("2"), Point::new(0.0, 200.0));
		let mut sizes = SizeCache::default();
		assert!(!has_overlap(&graph, &Visibility::default(), &pos, &sizes, &NodeSizes::default(), 0.0));
		let tall = graph.get(&NodeId::idea("1")).unwrap();
		sizes.record(tall, 100.0, 500.0);
		assert!(has_overlap(&graph, &Visibility::default(), &pos, &sizes, &NodeSizes::default(), 0.0));
	}

	proptest! {
		#[test]
		fn global_settle_converges_or_hits_the_cap(
			points in prop::collection::vec((-300.0f64..300.0, -300.0f64..300.0), 2..14),
		) {
			let ideas: Vec<_> = (0..points.len()).map(|i| idea(&i.to_string(), None, None)).collect();
			let graph = NodeGraph::project(&ideas, &[], "r");
			let mut pos: PositionMap = points
				.iter()
				.enumerate()
				.map(|(i, &(x, y))| (NodeId::idea(&i.to_string()), Point::new(x, y)))
				.collect();
			let cfg = CollisionConfig { max_passes: 500, ..CollisionConfig::default() };
			let vis = Visibility::default();
			let sizes = SizeCache::default();
			let defaults = NodeSizes::default();
			let report = resolve_overlaps(&graph, &vis, &mut pos, &sizes, &defaults, &cfg, SettleScope::Global);
			prop_assert!(report.passes <= cfg.max_passes);
			if report.converged {
				prop_assert!(!has_overlap(&graph, &vis, &pos, &sizes, &defaults, cfg.padding));
			}
			prop_assert!(pos.values().all(|p| p.is_finite()));
		}
	}
}
