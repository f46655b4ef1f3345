use log::{debug, warn};

use super::error::RelinkError;
use super::geometry::Point;
use super::graph::NodeGraph;
use super::persist::CommitBatch;
use super::scene::Scene;
use super::types::NodeId;

pub type PointerId = i32;

/// Screen pixels a press may travel and still count as a click.
const CLICK_SLOP: f64 = 3.0;

/// What a click on a node does while linking is armed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkMode {
	/// The clicked node becomes the parent of `child`.
	ParentOf { child: NodeId },
	/// The clicked node becomes a child of `parent`.
	ChildOf { parent: NodeId },
}

impl LinkMode {
	/// The node the link was armed from.
	pub fn source(&self) -> &NodeId {
		match self {
			LinkMode::ParentOf { child } => child,
			LinkMode::ChildOf { parent } => parent,
		}
	}

	/// `(child, parent)` for a click on `target`.
	pub fn relink_for(&self, target: &NodeId) -> (NodeId, NodeId) {
		match self {
			LinkMode::ParentOf { child } => (child.clone(), target.clone()),
			LinkMode::ChildOf { parent } => (target.clone(), parent.clone()),
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Gesture {
	#[default]
	Idle,
	Panning {
		pointer: PointerId,
		last: Point,
	},
	Dragging {
		pointer: PointerId,
		node: NodeId,
		/// Screen position of the press.
		origin: Point,
		last: Point,
		/// Where the pointer alone would put the node, before collisions.
		pending: Point,
	},
	Linking(LinkMode),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerInput {
	pub pointer: PointerId,
	/// Canvas-relative screen position.
	pub screen: Point,
}

/// Side effects the host must carry out after a pointer event.
#[derive(Debug, Default, PartialEq)]
pub struct PointerEffects {
	pub capture: Option<PointerId>,
	pub release: Option<PointerId>,
	pub commit: Option<CommitBatch>,
	pub rejected: Option<RelinkError>,
}

/// Pointer gesture state machine: one gesture at a time, owned by the pointer
/// that started it.
#[derive(Clone, Debug, Default)]
pub struct InteractionController {
	gesture: Gesture,
	selected: Option<NodeId>,
}

impl InteractionController {
	pub fn gesture(&self) -> &Gesture {
		&self.gesture
	}

	pub fn selected(&self) -> Option<&NodeId> {
		self.selected.as_ref()
	}

	pub fn dragged(&self) -> Option<&NodeId> {
		match &self.gesture {
			Gesture::Dragging { node, .. } => Some(node),
			_ => None,
		}
	}

	pub fn link_mode(&self) -> Option<&LinkMode> {
		match &self.gesture {
			Gesture::Linking(mode) => Some(mode),
			_ => None,
		}
	}

	pub fn select(&mut self, node: Option<NodeId>) {
		self.selected = node;
	}

	/// Drops references to nodes no longer in `graph`. A drag whose node
	/// vanished is abandoned; the returned pointer should be released.
	pub fn retain(&mut self, graph: &NodeGraph) -> Option<PointerId> {
		if self.selected.as_ref().is_some_and(|id| !graph.contains(id)) {
			self.selected = None;
		}
		match &self.gesture {
			Gesture::Dragging { pointer, node, .. } if !graph.contains(node) => {
				let pointer = *pointer;
				debug!("drag abandoned: {node} removed");
				self.gesture = Gesture::Idle;
				Some(pointer)
			}
			Gesture::Linking(mode) if !graph.contains(mode.source()) => {
				self.gesture = Gesture::Idle;
				None
			}
			_ => None,
		}
	}

	fn active_pointer(&self) -> Option<PointerId> {
		match self.gesture {
			Gesture::Panning { pointer, .. } | Gesture::Dragging { pointer, .. } => Some(pointer),
			_ => None,
		}
	}

	/// Arms linking. Refused while a pointer gesture is in progress.
	pub fn arm_link(&mut self, mode: LinkMode) -> bool {
		if self.active_pointer().is_some() {
			return false;
		}
		debug!("linking armed: {mode:?}");
		self.gesture = Gesture::Linking(mode);
		true
	}

	pub fn cancel_link(&mut self) -> bool {
		if self.link_mode().is_none() {
			return false;
		}
		debug!("linking cancelled");
		self.gesture = Gesture::Idle;
		true
	}

	pub fn pointer_down(&mut self, scene: &mut Scene, input: PointerInput) -> PointerEffects {
		let mut effects = PointerEffects::default();
		if self.active_pointer().is_some() {
			return effects;
		}
		scene.viewport_mut().track_pointer(input.screen);

		let Some(node) = scene.node_at(input.screen) else {
			self.cancel_link();
			self.selected = None;
			self.gesture = Gesture::Panning {
				pointer: input.pointer,
				last: input.screen,
			};
			effects.capture = Some(input.pointer);
			return effects;
		};

		if let Some(mode) = self.link_mode().cloned() {
			self.gesture = Gesture::Idle;
			let (child, parent) = mode.relink_for(&node);
			match scene.relink(&child, &parent) {
				Ok(update) => {
					effects.commit = Some(CommitBatch {
						positions: scene.position_snapshot(),
						parents: vec![update],
						branches: Vec::new(),
					});
				}
				Err(e) => {
					warn!("link rejected: {e}");
					effects.rejected = Some(e);
				}
			}
			return effects;
		}

		let pending = scene
			.position(&node)
			.unwrap_or_else(|| scene.viewport().world_from_screen(input.screen));
		debug!("drag start {node}");
		self.selected = Some(node.clone());
		self.gesture = Gesture::Dragging {
			pointer: input.pointer,
			node,
			origin: input.screen,
			last: input.screen,
			pending,
		};
		effects.capture = Some(input.pointer);
		effects
	}

	/// Returns `true` if the move belonged to the active gesture.
	pub fn pointer_move(&mut self, scene: &mut Scene, input: PointerInput) -> bool {
		scene.viewport_mut().track_pointer(input.screen);
		match &mut self.gesture {
			Gesture::Dragging {
				pointer,
				node,
				last,
				pending,
				..
			} if *pointer == input.pointer => {
				*pending += (input.screen - *last) / scene.viewport().zoom();
				*last = input.screen;
				scene.drag_to(node, *pending);
				true
			}
			Gesture::Panning { pointer, last } if *pointer == input.pointer => {
				// Grab semantics: the world follows the pointer.
				scene.viewport_mut().pan_by(*last - input.screen);
				*last = input.screen;
				true
			}
			_ => false,
		}
	}

	pub fn pointer_up(&mut self, scene: &mut Scene, input: PointerInput) -> PointerEffects {
		let mut effects = PointerEffects::default();
		match std::mem::take(&mut self.gesture) {
			Gesture::Dragging {
				pointer,
				node,
				origin,
				last,
				..
			} if pointer == input.pointer => {
				effects.release = Some(pointer);
				if origin.distance(last) <= CLICK_SLOP {
					debug!("click on {node}");
					return effects;
				}
				let mut batch = CommitBatch::default();
				batch.parents.extend(scene.reassign_by_proximity(&node));
				batch.positions = scene.position_snapshot();
				debug!("drag end {node}: {} writes", batch.len());
				effects.commit = (!batch.is_empty()).then_some(batch);
			}
			Gesture::Panning { pointer, .. } if pointer == input.pointer => {
				effects.release = Some(pointer);
			}
			other => self.gesture = other,
		}
		effects
	}

	/// A cancelled pointer ends its gesture the same way a release does.
	pub fn pointer_cancel(&mut self, scene: &mut Scene, input: PointerInput) -> PointerEffects {
		self.pointer_up(scene, input)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::mindmap::config::MindmapConfig;
	use crate::components::mindmap::testing::{branch, idea};
	use crate::components::mindmap::types::{Idea, MindmapData};

	fn scene(ideas: Vec<Idea>) -> Scene {
		let mut scene = Scene::new(MindmapConfig::default(), 800.0, 600.0);
		scene.set_domain(MindmapData {
			root_label: "Launch".into(),
			ideas,
			branches: vec![branch("A", None), branch("B", None)],
		});
		scene
	}

	fn at(scene: &Scene, id: &NodeId, pointer: PointerId) -> PointerInput {
		PointerInput {
			pointer,
			screen: scene.viewport().screen_from_world(scene.position(id).unwrap()),
		}
	}

	fn empty(pointer: PointerId) -> PointerInput {
		PointerInput {
			pointer,
			screen: Point::new(5.0, 5.0),
		}
	}

	#[test]
	fn canvas_press_pans_and_clears_selection() {
		let mut s = scene(vec![idea("1", None, Some("A"))]);
		let mut ctl = InteractionController::default();
		let press = at(&s, &NodeId::idea("1"), 1);
		ctl.pointer_down(&mut s, press);
		ctl.pointer_up(&mut s, press);
		assert_eq!(ctl.selected(), Some(&NodeId::idea("1")));

		let fx = ctl.pointer_down(&mut s, empty(1));
		assert_eq!(fx.capture, Some(1));
		assert_eq!(ctl.selected(), None);
		let pan = s.viewport().pan();
		ctl.pointer_move(&mut s, PointerInput {
			pointer: 1,
			screen: Point::new(25.0, 15.0),
		});
		assert!(s.viewport().pan().approx_eq(pan + Point::new(20.0, 10.0), 1e-9));
		let fx = ctl.pointer_up(&mut s, empty(1));
		assert_eq!(fx.release, Some(1));
		assert!(fx.commit.is_none());
		assert_eq!(ctl.gesture(), &Gesture::Idle);
	}

	#[test]
	fn only_the_capturing_pointer_drives_the_gesture() {
		let mut s = scene(vec![idea("1", None, Some("A"))]);
		let mut ctl = InteractionController::default();
		ctl.pointer_down(&mut s, empty(1));
		let press = at(&s, &NodeId::idea("1"), 2);
		let fx = ctl.pointer_down(&mut s, press);
		assert_eq!(fx, PointerEffects::default());
		assert!(!ctl.pointer_move(&mut s, empty(2)));
		assert_eq!(ctl.pointer_up(&mut s, empty(2)).release, None);
		assert!(matches!(ctl.gesture(), Gesture::Panning { pointer: 1, .. }));
	}

	#[test]
	fn drag_commits_the_resolved_position() {
		let mut s = scene(vec![idea("1", None, Some("A")), idea("2", None, Some("A"))]);
		let batch = s.position_snapshot();
		s.confirm(&batch);

		let mut ctl = InteractionController::default();
		let dragged = NodeId::idea("1");
		let start = at(&s, &dragged, 7);
		ctl.pointer_down(&mut s, start);
		assert_eq!(ctl.dragged(), Some(&dragged));

		// Drop it straight onto idea 2 so collisions have to push them apart.
		let target = at(&s, &NodeId::idea("2"), 7);
		ctl.pointer_move(&mut s, target);
		let live = s.position(&dragged).unwrap();
		let fx = ctl.pointer_up(&mut s, target);

		assert_eq!(fx.release, Some(7));
		let commit = fx.commit.unwrap();
		let sent = commit.positions.iter().find(|p| p.node == dragged).unwrap();
		assert_eq!(sent.point(), live);
		assert_eq!(sent.point(), s.position(&dragged).unwrap());
		assert!(commit.positions.iter().any(|p| p.node == NodeId::idea("2")));
		assert!(commit.parents.is_empty());
		assert_eq!(ctl.dragged(), None);
	}

	#[test]
	fn drag_scales_screen_delta_by_zoom() {
		let mut s = scene(vec![idea("1", None, None)]);
		s.viewport_mut().zoom_at_point(-120.0, Point::new(400.0, 300.0));
		let zoom = s.viewport().zoom();
		let mut ctl = InteractionController::default();
		let id = NodeId::idea("1");
		let start = s.position(&id).unwrap();
		let press = at(&s, &id, 1);
		ctl.pointer_down(&mut s, press);
		ctl.pointer_move(&mut s, PointerInput {
			pointer: 1,
			screen: press.screen + Point::new(-33.0, 0.0),
		});
		let moved = s.position(&id).unwrap();
		assert!(moved.approx_eq(start + Point::new(-33.0 / zoom, 0.0), 1e-9));
	}

	#[test]
	fn drop_near_other_branch_reassigns() {
		let mut s = scene(vec![idea("1", None, Some("A"))]);
		let mut ctl = InteractionController::default();
		let id = NodeId::idea("1");
		let press = at(&s, &id, 1);
		ctl.pointer_down(&mut s, press);
		let near_b = s.position(&NodeId::branch("B")).unwrap() + Point::new(140.0, 0.0);
		let drop = PointerInput {
			pointer: 1,
			screen: s.viewport().screen_from_world(near_b),
		};
		ctl.pointer_move(&mut s, drop);
		let fx = ctl.pointer_up(&mut s, drop);
		let commit = fx.commit.unwrap();
		assert_eq!(commit.parents.len(), 1);
		assert_eq!(commit.parents[0].parent, NodeId::branch("B"));
		assert_eq!(s.graph().parent_of(&id).unwrap().id, NodeId::branch("B"));
	}

	#[test]
	fn click_on_leaf_near_sub_branch_keeps_its_parent() {
		let branches = vec![branch("A", None), branch("Sub", Some(NodeId::branch("A")))];
		let mut layout = Scene::new(MindmapConfig::default(), 800.0, 600.0);
		layout.set_domain(MindmapData {
			root_label: "Launch".into(),
			ideas: vec![],
			branches: branches.clone(),
		});
		let sub = layout.position(&NodeId::branch("Sub")).unwrap();

		let mut placed = idea("1", None, Some("A"));
		placed.x = Some(sub.x + 40.0);
		placed.y = Some(sub.y);
		let mut s = Scene::new(MindmapConfig::default(), 800.0, 600.0);
		s.set_domain(MindmapData {
			root_label: "Launch".into(),
			ideas: vec![placed],
			branches,
		});
		let id = NodeId::idea("1");
		let mut ctl = InteractionController::default();
		let press = at(&s, &id, 1);
		ctl.pointer_down(&mut s, press);
		let jitter = PointerInput {
			pointer: 1,
			screen: press.screen + Point::new(1.0, 1.0),
		};
		ctl.pointer_move(&mut s, jitter);
		let fx = ctl.pointer_up(&mut s, jitter);

		assert_eq!(fx.release, Some(1));
		assert!(fx.commit.is_none());
		assert_eq!(s.graph().parent_of(&id).unwrap().id, NodeId::branch("A"));
		assert_eq!(ctl.selected(), Some(&id));
		assert_eq!(ctl.gesture(), &Gesture::Idle);
	}

	#[test]
	fn cancelled_drag_commits_like_a_release() {
		let mut s = scene(vec![idea("1", None, Some("A"))]);
		let mut ctl = InteractionController::default();
		let id = NodeId::idea("1");
		let press = at(&s, &id, 2);
		ctl.pointer_down(&mut s, press);
		let moved = PointerInput {
			pointer: 2,
			screen: press.screen + Point::new(0.0, 40.0),
		};
		ctl.pointer_move(&mut s, moved);
		let live = s.position(&id).unwrap();

		let fx = ctl.pointer_cancel(&mut s, moved);
		assert_eq!(fx.release, Some(2));
		let commit = fx.commit.unwrap();
		let sent = commit.positions.iter().find(|p| p.node == id).unwrap();
		assert_eq!(sent.point(), live);
		assert_eq!(ctl.gesture(), &Gesture::Idle);
	}

	#[test]
	fn cancelled_pan_releases_without_commit() {
		let mut s = scene(vec![]);
		let mut ctl = InteractionController::default();
		ctl.pointer_down(&mut s, empty(6));
		assert_eq!(ctl.pointer_cancel(&mut s, empty(9)), PointerEffects::default());
		let fx = ctl.pointer_cancel(&mut s, empty(6));
		assert_eq!(fx.release, Some(6));
		assert!(fx.commit.is_none());
		assert_eq!(ctl.gesture(), &Gesture::Idle);
	}

	#[test]
	fn linking_applies_to_clicked_node() {
		let mut s = scene(vec![idea("1", None, Some("A")), idea("2", None, Some("B"))]);
		let mut ctl = InteractionController::default();
		assert!(ctl.arm_link(LinkMode::ParentOf {
			child: NodeId::idea("2"),
		}));
		let press = at(&s, &NodeId::idea("1"), 1);
		let fx = ctl.pointer_down(&mut s, press);
		let commit = fx.commit.unwrap();
		assert_eq!(commit.parents[0].node, NodeId::idea("2"));
		assert_eq!(commit.parents[0].parent, NodeId::idea("1"));
		assert_eq!(fx.capture, None);
		assert_eq!(ctl.gesture(), &Gesture::Idle);

		ctl.arm_link(LinkMode::ChildOf {
			parent: NodeId::idea("2"),
		});
		let press = at(&s, &NodeId::idea("1"), 1);
		let fx = ctl.pointer_down(&mut s, press);
		assert!(matches!(fx.rejected, Some(RelinkError::Cycle { .. })));
		assert!(fx.commit.is_none());
		assert_eq!(ctl.gesture(), &Gesture::Idle);
	}

	#[test]
	fn self_link_is_rejected_locally() {
		let mut s = scene(vec![idea("1", None, Some("A"))]);
		let mut ctl = InteractionController::default();
		ctl.arm_link(LinkMode::ParentOf {
			child: NodeId::idea("1"),
		});
		let press = at(&s, &NodeId::idea("1"), 1);
		let fx = ctl.pointer_down(&mut s, press);
		assert_eq!(fx.rejected, Some(RelinkError::SelfLink(NodeId::idea("1"))));
		assert!(fx.commit.is_none());
	}

	#[test]
	fn canvas_click_cancels_linking() {
		let mut s = scene(vec![]);
		let mut ctl = InteractionController::default();
		ctl.arm_link(LinkMode::ChildOf {
			parent: NodeId::branch("A"),
		});
		ctl.pointer_down(&mut s, empty(3));
		assert!(ctl.link_mode().is_none());
		assert!(matches!(ctl.gesture(), Gesture::Panning { .. }));
		assert!(!ctl.arm_link(LinkMode::ChildOf {
			parent: NodeId::branch("A"),
		}));
		ctl.pointer_up(&mut s, empty(3));
		assert!(ctl.arm_link(LinkMode::ChildOf {
			parent: NodeId::branch("A"),
		}));
		assert!(ctl.cancel_link());
		assert!(!ctl.cancel_link());
	}

	#[test]
	fn vanished_drag_target_is_abandoned() {
		let mut s = scene(vec![idea("1", None, Some("A"))]);
		let mut ctl = InteractionController::default();
		let press = at(&s, &NodeId::idea("1"), 4);
		ctl.pointer_down(&mut s, press);
		s.set_domain(MindmapData {
			root_label: "Launch".into(),
			ideas: vec![],
			branches: vec![branch("A", None)],
		});
		assert_eq!(ctl.retain(s.graph()), Some(4));
		assert_eq!(ctl.gesture(), &Gesture::Idle);
		assert_eq!(ctl.selected(), None);
	}
}
