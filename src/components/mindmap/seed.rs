use std::f64::consts::{FRAC_PI_2, TAU};

use super::config::LayoutConfig;
use super::geometry::Point;
use super::graph::NodeGraph;
use super::types::{Node, NodeKind, PositionMap};

/// Gives every node without a position an initial one. Existing entries are
/// never touched, so seeding is idempotent. Returns how many nodes were placed.
pub fn seed_positions(graph: &NodeGraph, positions: &mut PositionMap, cfg: &LayoutConfig) -> usize {
	let root = graph.root();
	let mut seeded = 0;
	if !positions.contains_key(&root.id) {
		positions.insert(root.id.clone(), Point::ORIGIN);
		seeded += 1;
	}

	// Parents always hold a position before their children are visited.
	let mut stack = vec![root];
	while let Some(parent) = stack.pop() {
		if let Some(&center) = positions.get(&parent.id) {
			seeded += seed_children(graph, parent, center, positions, cfg);
		}
		stack.extend(graph.children(&parent.id));
	}
	seeded
}

fn seed_children(
	graph: &NodeGraph,
	parent: &Node,
	center: Point,
	positions: &mut PositionMap,
	cfg: &LayoutConfig,
) -> usize {
	let branches: Vec<&Node> = graph
		.children(&parent.id)
		.filter(|n| n.kind == NodeKind::Branch)
		.collect();
	let leaves: Vec<&Node> = graph
		.children(&parent.id)
		.filter(|n| n.kind == NodeKind::Leaf)
		.collect();
	let branch_radius = match parent.kind {
		NodeKind::Root => cfg.root_branch_radius,
		_ => cfg.sub_branch_radius,
	};

	let mut seeded = 0;
	for (i, node) in branches.iter().enumerate() {
		if !positions.contains_key(&node.id) {
			let at = circle_slot(center, branch_radius, i, branches.len());
			positions.insert(node.id.clone(), at);
			seeded += 1;
		}
	}
	for (i, node) in leaves.iter().enumerate() {
		if !positions.contains_key(&node.id) {
			let at = match parent.kind {
				NodeKind::Leaf => circle_slot(center, cfg.idea_child_radius, i, leaves.len()),
				NodeKind::Root | NodeKind::Branch => ring_slot(center, i, cfg),
			};
			positions.insert(node.id.clone(), at);
			seeded += 1;
		}
	}
	seeded
}

/// Slot `index` of `total` evenly spaced on a circle, starting at the top.
pub fn circle_slot(center: Point, radius: f64, index: usize, total: usize) -> Point {
	let angle = TAU * index as f64 / total.max(1) as f64 - FRAC_PI_2;
	Point::polar(center, radius, angle)
}

/// Slot `index` in concentric rings of `ring_capacity` around `center`.
pub fn ring_slot(center: Point, index: usize, cfg: &LayoutConfig) -> Point {
	let capacity = cfg.ring_capacity.max(1);
	let ring = index / capacity;
	let angle = TAU * (index % capacity) as f64 / capacity as f64 - FRAC_PI_2
		+ ring as f64 * cfg.ring_angle_offset;
	let radius = cfg.ring_base_radius + ring as f64 * cfg.ring_spacing;
	Point::polar(center, radius, angle)
}
