use std::collections::HashSet;

use log::{info, warn};

use super::collision::{self, SettleReport, SettleScope};
use super::config::MindmapConfig;
use super::error::{BranchError, RelinkError};
use super::geometry::Point;
use super::graph::{NodeGraph, Visibility};
use super::measure::SizeCache;
use super::persist::{BranchChange, CommitBatch, ParentUpdate, PositionUpdate};
use super::seed::seed_positions;
use super::types::{Branch, Idea, MindmapData, Node, NodeId, NodeKind, PositionMap};
use super::viewport::Viewport;

/// Positions closer than this to the confirmed value are not re-sent.
const POSITION_EPSILON: f64 = 1e-6;

/// Everything the layout engine knows about one mindmap.
///
/// Sole owner of the position map: positions change only through the methods
/// here, called from gesture callbacks or after a structural change. Writes to
/// the store are taken as snapshots (`PositionUpdate` values), never as
/// references into the map.
#[derive(Debug)]
pub struct Scene {
	config: MindmapConfig,
	root_label: String,
	ideas: Vec<Idea>,
	branches: Vec<Branch>,
	graph: NodeGraph,
	visibility: Visibility,
	positions: PositionMap,
	/// Last position the store acknowledged, per node.
	confirmed: PositionMap,
	sizes: SizeCache,
	viewport: Viewport,
	needs_settle: bool,
}

impl Scene {
	pub fn new(config: MindmapConfig, width: f64, height: f64) -> Self {
		let viewport = Viewport::new(config.viewport.clone(), width, height);
		let mut scene = Self {
			config,
			root_label: String::new(),
			ideas: Vec::new(),
			branches: Vec::new(),
			graph: NodeGraph::project(&[], &[], ""),
			visibility: Visibility::default(),
			positions: PositionMap::new(),
			confirmed: PositionMap::new(),
			sizes: SizeCache::default(),
			viewport,
			needs_settle: false,
		};
		scene.reproject();
		scene
	}

	pub fn config(&self) -> &MindmapConfig {
		&self.config
	}

	pub fn graph(&self) -> &NodeGraph {
		&self.graph
	}

	pub fn visibility(&self) -> &Visibility {
		&self.visibility
	}

	pub fn positions(&self) -> &PositionMap {
		&self.positions
	}

	pub fn position(&self, id: &NodeId) -> Option<Point> {
		self.positions.get(id).copied()
	}

	pub fn sizes(&self) -> &SizeCache {
		&self.sizes
	}

	pub fn viewport(&self) -> &Viewport {
		&self.viewport
	}

	pub fn viewport_mut(&mut self) -> &mut Viewport {
		&mut self.viewport
	}

	pub fn branches(&self) -> &[Branch] {
		&self.branches
	}

	/// Visible nodes in drawing order (later ones on top).
	pub fn visible_nodes(&self) -> impl Iterator<Item = &Node> {
		self.graph
			.nodes()
			.iter()
			.filter(|n| !self.visibility.is_hidden(&n.id))
	}

	/// Replaces the host data. Positions already held in memory win over the
	/// ones carried by ideas; the carried ones count as confirmed.
	pub fn set_domain(&mut self, data: MindmapData) {
		for idea in &data.ideas {
			if let Some(at) = idea.position() {
				let id = NodeId::idea(&idea.id);
				self.positions.entry(id.clone()).or_insert(at);
				self.confirmed.insert(id, at);
			}
		}
		self.root_label = data.root_label;
		self.ideas = data.ideas;
		self.branches = data.branches;
		self.reproject();
	}

	fn visible_set(&self) -> HashSet<NodeId> {
		self.visible_nodes().map(|n| n.id.clone()).collect()
	}

	/// Rebuilds the tree from the domain lists, drops state of vanished nodes,
	/// seeds new ones and settles if anything appeared, vanished or was hidden.
	fn reproject(&mut self) {
		let before = self.visible_set();
		self.graph = NodeGraph::project(&self.ideas, &self.branches, &self.root_label);
		self.visibility.refresh(&self.graph);

		let graph = &self.graph;
		self.positions.retain(|id, _| graph.contains(id));
		self.confirmed.retain(|id, _| graph.contains(id));
		self.sizes.retain_graph(graph);

		let seeded = seed_positions(&self.graph, &mut self.positions, &self.config.layout);
		if seeded > 0 || before != self.visible_set() {
			self.settle();
		}
		info!("projected {} nodes ({} newly placed)", self.graph.len(), seeded);
	}

	/// Global settle: every visible non-root node may move.
	pub fn settle(&mut self) -> SettleReport {
		self.needs_settle = false;
		collision::resolve_overlaps(
			&self.graph,
			&self.visibility,
			&mut self.positions,
			&self.sizes,
			&self.config.sizes,
			&self.config.collision,
			SettleScope::Global,
		)
	}

	/// Settles once if a measurement changed since the last settle.
	pub fn settle_if_needed(&mut self) -> Option<SettleReport> {
		if !self.needs_settle {
			return None;
		}
		Some(self.settle())
	}

	/// Feeds a measured box into the size cache. Positions are left alone
	/// until the next settle.
	pub fn record_measurement(&mut self, id: &NodeId, width: f64, height: f64) {
		if let Some(node) = self.graph.get(id) {
			if self.sizes.record(node, width, height) {
				self.needs_settle = true;
			}
		}
	}

	/// Topmost visible node whose box contains the screen point.
	pub fn node_at(&self, screen: Point) -> Option<NodeId> {
		let world = self.viewport.world_from_screen(screen);
		let nodes: Vec<&Node> = self.visible_nodes().collect();
		nodes.into_iter().rev().find_map(|n| {
			let center = self.position(&n.id)?;
			self.sizes
				.half_extent(n, &self.config.sizes)
				.contains(center, world)
				.then(|| n.id.clone())
		})
	}

	/// Puts a dragged node at `pending` and pushes its neighbours away. Returns
	/// the node's resolved position.
	pub fn drag_to(&mut self, node: &NodeId, pending: Point) -> Option<Point> {
		if node.is_root() || !self.graph.contains(node) || !pending.is_finite() {
			return self.position(node);
		}
		self.positions.insert(node.clone(), pending);
		collision::resolve_overlaps(
			&self.graph,
			&self.visibility,
			&mut self.positions,
			&self.sizes,
			&self.config.sizes,
			&self.config.collision,
			SettleScope::DragLocal(node),
		);
		self.position(node)
	}

	/// Moves `child` under `parent` after checking the tree stays a tree.
	pub fn relink(&mut self, child: &NodeId, parent: &NodeId) -> Result<ParentUpdate, RelinkError> {
		self.graph.check_relink(child, parent)?;
		self.rewrite_parent(child, parent);
		self.reproject();
		info!("relinked {child} under {parent}");
		Ok(ParentUpdate {
			node: child.clone(),
			parent: parent.clone(),
		})
	}

	/// Rewrites the domain entry behind `child` so projection yields `parent`.
	fn rewrite_parent(&mut self, child: &NodeId, parent: &NodeId) {
		if let Some(name) = child.branch_name() {
			if let Some(branch) = self.branches.iter_mut().find(|b| b.name == name) {
				branch.parent_link = (!parent.is_root()).then(|| parent.clone());
			}
		} else if let Some(id) = child.idea_id() {
			if let Some(idea) = self.ideas.iter_mut().find(|i| i.id == id) {
				if let Some(parent_idea) = parent.idea_id() {
					idea.parent_idea_id = Some(parent_idea.to_string());
				} else {
					idea.parent_idea_id = None;
					idea.branch_label = parent.branch_name().map(str::to_string);
				}
			}
		}
	}

	/// Nearest visible branch to `at`, other than `exclude`.
	pub fn nearest_branch(&self, at: Point, exclude: &NodeId) -> Option<(&Node, f64)> {
		self.visible_nodes()
			.filter(|n| n.kind == NodeKind::Branch && n.id != *exclude)
			.filter_map(|n| Some((n, self.position(&n.id)?.distance(at))))
			.min_by(|a, b| a.1.total_cmp(&b.1))
	}

	/// Moves a dropped leaf into the nearest branch if it landed within the
	/// capture radius of one other than its current branch, and strictly
	/// closer to it than to the current one.
	pub fn reassign_by_proximity(&mut self, node: &NodeId) -> Option<ParentUpdate> {
		if self.graph.get(node)?.kind != NodeKind::Leaf {
			return None;
		}
		let at = self.position(node)?;
		let current = self.graph.enclosing_branch(node).map(|b| b.id.clone());
		let (target, distance) = self.nearest_branch(at, node)?;
		if distance > self.config.interaction.capture_radius || Some(&target.id) == current.as_ref() {
			return None;
		}
		let current_distance = current.as_ref().and_then(|id| self.position(id)).map(|c| c.distance(at));
		if current_distance.is_some_and(|d| d <= distance) {
			return None;
		}
		let target = target.id.clone();
		self.relink(node, &target)
			.inspect_err(|e| warn!("proximity reassignment of {node} skipped: {e}"))
			.ok()
	}

	/// Every non-root node whose position differs from its confirmed one.
	pub fn position_snapshot(&self) -> Vec<PositionUpdate> {
		self.graph
			.nodes()
			.iter()
			.filter(|n| n.kind != NodeKind::Root)
			.filter_map(|n| {
				let at = self.position(&n.id)?;
				let dirty = self
					.confirmed
					.get(&n.id)
					.is_none_or(|c| !c.approx_eq(at, POSITION_EPSILON));
				dirty.then(|| PositionUpdate::new(n.id.clone(), at))
			})
			.collect()
	}

	/// Marks store-acknowledged positions as confirmed.
	pub fn confirm(&mut self, saved: &[PositionUpdate]) {
		for update in saved {
			if self.graph.contains(&update.node) {
				self.confirmed.insert(update.node.clone(), update.point());
			}
		}
	}

	/// Collapses or expands a branch and its whole subtree, then settles.
	pub fn toggle_collapse(&mut self, branch: &NodeId) -> Option<bool> {
		let collapsed = self.visibility.toggle(&self.graph, branch)?;
		info!(
			"{} {branch} ({} hidden)",
			if collapsed { "collapsed" } else { "expanded" },
			self.visibility.hidden().len()
		);
		self.settle();
		Some(collapsed)
	}

	pub fn reset_view(&mut self) {
		let root = self.position(&NodeId::root()).unwrap_or(Point::ORIGIN);
		self.viewport.reset(root);
	}

	fn validate_new_name(&self, name: &str) -> Result<String, BranchError> {
		let name = name.trim();
		if name.is_empty() {
			return Err(BranchError::EmptyName);
		}
		if self.branches.iter().any(|b| b.name == name) {
			return Err(BranchError::Duplicate(name.to_string()));
		}
		Ok(name.to_string())
	}

	fn batch_with(&self, change: BranchChange, parents: Vec<ParentUpdate>) -> CommitBatch {
		CommitBatch {
			positions: self.position_snapshot(),
			parents,
			branches: vec![change],
		}
	}

	/// Adds a branch under `parent` (the root when `None`).
	pub fn create_branch(&mut self, name: &str, parent: Option<NodeId>) -> Result<CommitBatch, BranchError> {
		let name = self.validate_new_name(name)?;
		let parent = parent.filter(|p| !p.is_root());
		if let Some(p) = &parent {
			if !self.graph.contains(p) {
				return Err(RelinkError::UnknownNode(p.clone()).into());
			}
		}
		self.branches.push(Branch {
			name: name.clone(),
			parent_link: parent.clone(),
			color_slot: None,
		});
		self.reproject();
		info!("created branch {name:?}");
		Ok(self.batch_with(BranchChange::Create { name, parent }, Vec::new()))
	}

	/// Renames a branch, carrying its position, collapsed state and members.
	pub fn rename_branch(&mut self, from: &str, to: &str) -> Result<CommitBatch, BranchError> {
		if !self.branches.iter().any(|b| b.name == from) {
			return Err(BranchError::Unknown(from.to_string()));
		}
		if to.trim() == from {
			return Ok(CommitBatch::default());
		}
		let to = self.validate_new_name(to)?;
		let (old_id, new_id) = (NodeId::branch(from), NodeId::branch(&to));

		let mut parents = Vec::new();
		for child in self.graph.children(&old_id) {
			parents.push(ParentUpdate {
				node: child.id.clone(),
				parent: new_id.clone(),
			});
		}
		for branch in &mut self.branches {
			if branch.name == from {
				branch.name = to.clone();
			}
			if branch.parent_link.as_ref() == Some(&old_id) {
				branch.parent_link = Some(new_id.clone());
			}
		}
		for idea in &mut self.ideas {
			if idea.branch_label.as_deref() == Some(from) {
				idea.branch_label = Some(to.clone());
			}
		}
		for map in [&mut self.positions, &mut self.confirmed] {
			if let Some(at) = map.remove(&old_id) {
				map.insert(new_id.clone(), at);
			}
		}
		self.sizes.forget(&old_id);
		self.visibility.rename(&old_id, new_id);
		self.reproject();
		info!("renamed branch {from:?} to {to:?}");
		Ok(self.batch_with(
			BranchChange::Rename {
				from: from.to_string(),
				to,
			},
			parents,
		))
	}

	/// Deletes a branch; its children move to the branch's own parent.
	pub fn delete_branch(&mut self, name: &str) -> Result<CommitBatch, BranchError> {
		let id = NodeId::branch(name);
		if !self.branches.iter().any(|b| b.name == name) {
			return Err(BranchError::Unknown(name.to_string()));
		}
		let heir = self
			.graph
			.parent_of(&id)
			.map(|p| p.id.clone())
			.unwrap_or_else(NodeId::root);
		let children: Vec<NodeId> = self.graph.children(&id).map(|c| c.id.clone()).collect();

		self.branches.retain(|b| b.name != name);
		for child in &children {
			self.rewrite_parent(child, &heir);
		}
		let heir_label = heir.branch_name().map(str::to_string);
		for idea in &mut self.ideas {
			if idea.branch_label.as_deref() == Some(name) {
				idea.branch_label = heir_label.clone();
			}
		}
		self.reproject();
		info!("deleted branch {name:?}, {} children moved to {heir}", children.len());

		let parents = children
			.into_iter()
			.map(|node| ParentUpdate {
				node,
				parent: heir.clone(),
			})
			.collect();
		Ok(self.batch_with(BranchChange::Delete { name: name.to_string() }, parents))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::mindmap::collision::has_overlap;
	use crate::components::mindmap::testing::{branch, idea};

	fn scene(ideas: Vec<Idea>, branches: Vec<Branch>) -> Scene {
		let mut scene = Scene::new(MindmapConfig::default(), 800.0, 600.0);
		scene.set_domain(MindmapData {
			root_label: "Launch".into(),
			ideas,
			branches,
		});
		scene
	}

	fn parent_of(scene: &Scene, id: &NodeId) -> NodeId {
		scene.graph().parent_of(id).unwrap().id.clone()
	}

	fn settle_fully(scene: &mut Scene) {
		for _ in 0..100 {
			if scene.settle().converged {
				break;
			}
		}
	}

	fn overlapping(scene: &Scene) -> bool {
		has_overlap(
			scene.graph(),
			scene.visibility(),
			scene.positions(),
			scene.sizes(),
			&scene.config().sizes,
			scene.config().collision.padding,
		)
	}

	#[test]
	fn domain_is_seeded_and_settled() {
		let ideas = (0..12).map(|i| idea(&i.to_string(), None, Some("A"))).collect();
		let mut s = scene(ideas, vec![branch("A", None), branch("B", None)]);
		assert_eq!(s.positions().len(), s.graph().len());
		settle_fully(&mut s);
		assert_eq!(s.position(&NodeId::root()), Some(Point::ORIGIN));
		assert!(!overlapping(&s));
	}

	#[test]
	fn carried_positions_are_kept_and_confirmed() {
		let mut placed = idea("1", None, None);
		placed.x = Some(900.0);
		placed.y = Some(900.0);
		let s = scene(vec![placed], vec![]);
		assert_eq!(s.position(&NodeId::idea("1")), Some(Point::new(900.0, 900.0)));
		assert!(s.position_snapshot().is_empty());
	}

	#[test]
	fn removed_nodes_are_pruned() {
		let mut s = scene(vec![idea("1", None, Some("A")), idea("2", Some("1"), None)], vec![branch("A", None)]);
		s.set_domain(MindmapData {
			root_label: "Launch".into(),
			ideas: vec![idea("2", Some("1"), Some("A"))],
			branches: vec![branch("A", None)],
		});
		assert!(s.position(&NodeId::idea("1")).is_none());
		assert_eq!(parent_of(&s, &NodeId::idea("2")), NodeId::branch("A"));
		assert_eq!(s.positions().len(), 3);
	}

	#[test]
	fn relink_rewrites_domain() {
		let mut s = scene(
			vec![idea("1", None, Some("A")), idea("2", None, None)],
			vec![branch("A", None), branch("B", None)],
		);
		let update = s.relink(&NodeId::idea("2"), &NodeId::idea("1")).unwrap();
		assert_eq!(update.parent, NodeId::idea("1"));
		assert_eq!(parent_of(&s, &NodeId::idea("2")), NodeId::idea("1"));

		s.relink(&NodeId::idea("2"), &NodeId::branch("B")).unwrap();
		assert_eq!(parent_of(&s, &NodeId::idea("2")), NodeId::branch("B"));

		s.relink(&NodeId::branch("B"), &NodeId::branch("A")).unwrap();
		assert_eq!(parent_of(&s, &NodeId::branch("B")), NodeId::branch("A"));
		assert!(matches!(
			s.relink(&NodeId::branch("A"), &NodeId::idea("2")),
			Err(RelinkError::Cycle { .. })
		));
		assert_eq!(parent_of(&s, &NodeId::branch("A")), NodeId::root());
	}

	#[test]
	fn proximity_moves_leaf_into_near_branch() {
		let mut s = scene(vec![idea("1", None, Some("A"))], vec![branch("A", None), branch("B", None)]);
		let b = s.position(&NodeId::branch("B")).unwrap();
		s.positions.insert(NodeId::idea("1"), b + Point::new(0.0, 100.0));
		let update = s.reassign_by_proximity(&NodeId::idea("1")).unwrap();
		assert_eq!(update.parent, NodeId::branch("B"));
		assert_eq!(parent_of(&s, &NodeId::idea("1")), NodeId::branch("B"));
		assert!(s.reassign_by_proximity(&NodeId::idea("1")).is_none());

		s.positions.insert(NodeId::idea("1"), Point::new(5000.0, 5000.0));
		assert!(s.reassign_by_proximity(&NodeId::idea("1")).is_none());
	}

	#[test]
	fn equidistant_leaf_stays_in_its_branch() {
		let mut s = scene(
			vec![idea("1", None, Some("A"))],
			vec![branch("A", None), branch("Sub", Some(NodeId::branch("A")))],
		);
		s.positions.insert(NodeId::branch("A"), Point::new(-100.0, 0.0));
		s.positions.insert(NodeId::branch("Sub"), Point::new(100.0, 0.0));
		s.positions.insert(NodeId::idea("1"), Point::new(0.0, 50.0));
		assert!(s.reassign_by_proximity(&NodeId::idea("1")).is_none());
		assert_eq!(parent_of(&s, &NodeId::idea("1")), NodeId::branch("A"));

		s.positions.insert(NodeId::idea("1"), Point::new(60.0, 50.0));
		let update = s.reassign_by_proximity(&NodeId::idea("1")).unwrap();
		assert_eq!(update.parent, NodeId::branch("Sub"));
	}

	#[test]
	fn confirm_clears_dirty_positions() {
		let mut s = scene(vec![idea("1", None, None)], vec![]);
		let snapshot = s.position_snapshot();
		assert_eq!(snapshot.len(), 1);
		s.confirm(&snapshot);
		assert!(s.position_snapshot().is_empty());
		s.drag_to(&NodeId::idea("1"), Point::new(400.0, 400.0));
		assert_eq!(s.position_snapshot()[0].point(), Point::new(400.0, 400.0));
	}

	#[test]
	fn collapse_settles_only_visible_nodes() {
		let ideas = (0..6).map(|i| idea(&i.to_string(), None, Some("A"))).collect();
		let mut s = scene(ideas, vec![branch("A", None)]);
		assert_eq!(s.toggle_collapse(&NodeId::branch("A")), Some(true));
		assert_eq!(s.visible_nodes().count(), 2);
		assert_eq!(s.toggle_collapse(&NodeId::branch("A")), Some(false));
		assert_eq!(s.visible_nodes().count(), 8);
		assert_eq!(s.toggle_collapse(&NodeId::root()), None);
	}

	#[test]
	fn measurement_defers_to_next_settle() {
		let mut s = scene(vec![idea("1", None, None), idea("2", None, None)], vec![]);
		let before = s.positions().clone();
		s.record_measurement(&NodeId::idea("1"), 600.0, 400.0);
		assert_eq!(s.positions(), &before);
		assert!(s.settle_if_needed().is_some());
		assert!(s.settle_if_needed().is_none());
		assert!(!overlapping(&s));
	}

	#[test]
	fn hit_testing_prefers_topmost() {
		let s = scene(vec![idea("1", None, None)], vec![]);
		let at = s.viewport().screen_from_world(s.position(&NodeId::idea("1")).unwrap());
		assert_eq!(s.node_at(at), Some(NodeId::idea("1")));
		let root = s.viewport().screen_from_world(Point::ORIGIN);
		assert_eq!(s.node_at(root), Some(NodeId::root()));
		assert_eq!(s.node_at(Point::new(-5000.0, -5000.0)), None);
	}

	#[test]
	fn branch_lifecycle() {
		let mut s = scene(
			vec![idea("1", None, Some("A")), idea("2", Some("1"), Some("A"))],
			vec![branch("A", None), branch("Sub", Some(NodeId::branch("A")))],
		);

		assert_eq!(s.create_branch("  ", None), Err(BranchError::EmptyName));
		assert_eq!(s.create_branch("A", None), Err(BranchError::Duplicate("A".into())));
		let batch = s.create_branch("C", Some(NodeId::branch("A"))).unwrap();
		assert!(batch.positions.iter().any(|p| p.node == NodeId::branch("C")));
		assert!(s.position(&NodeId::branch("C")).is_some());

		s.toggle_collapse(&NodeId::branch("A"));
		let at = s.position(&NodeId::branch("A")).unwrap();
		let batch = s.rename_branch("A", "Alpha").unwrap();
		let alpha = NodeId::branch("Alpha");
		assert_eq!(
			batch.branches,
			vec![BranchChange::Rename {
				from: "A".into(),
				to: "Alpha".into()
			}]
		);
		assert_eq!(s.position(&alpha), Some(at));
		assert!(s.visibility().is_collapsed(&alpha));
		assert_eq!(parent_of(&s, &NodeId::idea("1")), alpha);
		assert_eq!(parent_of(&s, &NodeId::branch("Sub")), alpha);
		// Direct children only: idea 2 hangs off idea 1 and keeps its parent.
		assert_eq!(batch.parents.len(), 3);
		assert!(batch.parents.iter().all(|p| p.parent == alpha));
		assert!(!batch.parents.iter().any(|p| p.node == NodeId::idea("2")));
		s.toggle_collapse(&alpha);

		let batch = s.delete_branch("Alpha").unwrap();
		assert_eq!(batch.parents.len(), 3);
		assert!(batch.parents.iter().all(|p| p.parent == NodeId::root()));
		assert_eq!(parent_of(&s, &NodeId::idea("1")), NodeId::root());
		assert_eq!(parent_of(&s, &NodeId::idea("2")), NodeId::idea("1"));
		assert_eq!(parent_of(&s, &NodeId::branch("Sub")), NodeId::root());
		assert!(s.position(&alpha).is_none());
		assert_eq!(s.delete_branch("Alpha"), Err(BranchError::Unknown("Alpha".into())));
	}

	#[test]
	fn deleting_nested_branch_hands_children_up() {
		let mut s = scene(
			vec![idea("1", None, Some("Sub"))],
			vec![branch("A", None), branch("Sub", Some(NodeId::branch("A")))],
		);
		s.delete_branch("Sub").unwrap();
		assert_eq!(parent_of(&s, &NodeId::idea("1")), NodeId::branch("A"));
	}
}
