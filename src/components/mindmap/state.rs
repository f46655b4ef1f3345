use std::collections::HashSet;

use log::info;

use super::config::MindmapConfig;
use super::error::BranchError;
use super::geometry::Point;
use super::interaction::{InteractionController, LinkMode, PointerEffects, PointerId, PointerInput};
use super::persist::{CommitBatch, FlushReport, SaveStatus};
use super::scene::Scene;
use super::types::{MindmapData, NodeId, NodeKind};
use super::viewport::ScrollInput;

const COLORS: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

const ROOT_COLOR: &str = "#f0f0f0";

/// Seconds a settled status stays on screen.
const BANNER_SECONDS: f64 = 2.5;
const ERROR_BANNER_SECONDS: f64 = 5.0;

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<NodeId>,
	pub neighbors: HashSet<NodeId>,
	pub highlight_t: f64,
	pub prev_node: Option<NodeId>,
	pub prev_neighbors: HashSet<NodeId>,
	delay_t: f64,
}

/// Save indicator with its remaining display time.
#[derive(Clone, Debug, Default)]
pub struct StatusBanner {
	pub status: SaveStatus,
	remaining: f64,
}

impl StatusBanner {
	pub fn show(&mut self, status: SaveStatus) {
		self.remaining = match status {
			SaveStatus::Saving(_) => f64::INFINITY,
			ref s if s.is_error() => ERROR_BANNER_SECONDS,
			_ => BANNER_SECONDS,
		};
		self.status = status;
	}

	pub fn tick(&mut self, dt: f64) {
		if self.status == SaveStatus::Idle {
			return;
		}
		self.remaining -= dt;
		if self.remaining <= 0.0 {
			self.status = SaveStatus::Idle;
		}
	}

	/// Fades out over the last half second.
	pub fn alpha(&self) -> f64 {
		self.remaining.clamp(0.0, 0.5) * 2.0
	}
}

/// Everything the canvas component keeps between frames.
pub struct MindmapState {
	pub scene: Scene,
	pub interaction: InteractionController,
	pub hover: HoverState,
	pub banner: StatusBanner,
	pub flow_time: f64,
	saves_in_flight: usize,
}

impl MindmapState {
	pub fn new(config: MindmapConfig, data: MindmapData, width: f64, height: f64) -> Self {
		let mut scene = Scene::new(config, width, height);
		scene.set_domain(data);
		Self {
			scene,
			interaction: InteractionController::default(),
			hover: HoverState::default(),
			banner: StatusBanner::default(),
			flow_time: 0.0,
			saves_in_flight: 0,
		}
	}

	/// Takes new host data. Returns a pointer to release if the dragged node
	/// disappeared.
	pub fn set_domain(&mut self, data: MindmapData) -> Option<PointerId> {
		self.scene.set_domain(data);
		self.after_structure_change()
	}

	fn after_structure_change(&mut self) -> Option<PointerId> {
		let graph = self.scene.graph();
		if self.hover.node.as_ref().is_some_and(|id| !graph.contains(id)) {
			self.set_hover(None);
		} else {
			self.refresh_hover_neighbors();
		}
		self.interaction.retain(self.scene.graph())
	}

	pub fn color_of(&self, id: &NodeId) -> &'static str {
		let graph = self.scene.graph();
		let Some(node) = graph.get(id) else {
			return COLORS[0];
		};
		if node.kind == NodeKind::Root {
			return ROOT_COLOR;
		}
		let slot = node.color_slot.or_else(|| {
			let branch = if node.kind == NodeKind::Branch {
				Some(node)
			} else {
				graph.enclosing_branch(id)
			}?;
			let index = self
				.scene
				.branches()
				.iter()
				.position(|b| branch.id.branch_name() == Some(b.name.as_str()))?;
			Some(index as u32)
		});
		COLORS[slot.unwrap_or(0) as usize % COLORS.len()]
	}

	pub fn pointer_down(&mut self, input: PointerInput) -> PointerEffects {
		let effects = self.interaction.pointer_down(&mut self.scene, input);
		if let Some(e) = &effects.rejected {
			self.banner.show(SaveStatus::Rejected(e.to_string()));
		}
		if effects.commit.is_some() {
			self.after_structure_change();
		}
		effects
	}

	pub fn pointer_move(&mut self, input: PointerInput) {
		if !self.interaction.pointer_move(&mut self.scene, input) {
			let hovered = self.scene.node_at(input.screen);
			self.set_hover(hovered);
		}
	}

	pub fn pointer_up(&mut self, input: PointerInput) -> PointerEffects {
		let effects = self.interaction.pointer_up(&mut self.scene, input);
		self.after_drop(&effects);
		effects
	}

	pub fn pointer_cancel(&mut self, input: PointerInput) -> PointerEffects {
		let effects = self.interaction.pointer_cancel(&mut self.scene, input);
		self.after_drop(&effects);
		effects
	}

	/// A drop that reassigned a parent changed the tree under the hover.
	fn after_drop(&mut self, effects: &PointerEffects) {
		if effects.commit.as_ref().is_some_and(|c| !c.parents.is_empty()) {
			self.after_structure_change();
		}
	}

	pub fn pointer_leave(&mut self) {
		self.set_hover(None);
	}

	pub fn scroll(&mut self, input: &ScrollInput) {
		self.scene.viewport_mut().apply_scroll(input);
	}

	pub fn zoom_step(&mut self, zoom_in: bool) {
		self.scene.viewport_mut().zoom_step(zoom_in);
	}

	pub fn reset_view(&mut self) {
		self.scene.reset_view();
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.scene.viewport_mut().resize(width, height);
	}

	/// Double-click: collapses or expands the branch under the pointer.
	pub fn toggle_collapse_at(&mut self, screen: Point) -> Option<bool> {
		let node = self.scene.node_at(screen)?;
		let collapsed = self.scene.toggle_collapse(&node)?;
		self.set_hover(None);
		Some(collapsed)
	}

	/// Arms linking from the selected node.
	pub fn arm_link(&mut self, mode: impl FnOnce(NodeId) -> LinkMode) -> bool {
		let Some(source) = self.interaction.selected().cloned() else {
			return false;
		};
		self.interaction.arm_link(mode(source))
	}

	pub fn cancel_link(&mut self) -> bool {
		self.interaction.cancel_link()
	}

	/// Name of the selected node if it is a branch.
	pub fn selected_branch(&self) -> Option<String> {
		self.interaction
			.selected()
			.and_then(NodeId::branch_name)
			.map(str::to_string)
	}

	/// Creates a branch under the selected branch, or under the root.
	pub fn create_branch(&mut self, name: &str) -> Result<CommitBatch, BranchError> {
		let parent = self.selected_branch().map(|b| NodeId::branch(&b));
		let batch = self.scene.create_branch(name, parent);
		self.report_branch_result(batch)
	}

	pub fn rename_selected(&mut self, to: &str) -> Result<CommitBatch, BranchError> {
		let from = self.selected_branch().ok_or(BranchError::NoneSelected)?;
		let batch = self.scene.rename_branch(&from, to);
		if batch.is_ok() {
			self.interaction.select(Some(NodeId::branch(to.trim())));
		}
		self.report_branch_result(batch)
	}

	pub fn delete_selected(&mut self) -> Result<CommitBatch, BranchError> {
		let name = self.selected_branch().ok_or(BranchError::NoneSelected)?;
		let batch = self.scene.delete_branch(&name);
		self.report_branch_result(batch)
	}

	fn report_branch_result(
		&mut self,
		result: Result<CommitBatch, BranchError>,
	) -> Result<CommitBatch, BranchError> {
		match &result {
			Ok(_) => {
				self.after_structure_change();
			}
			Err(e) => self.banner.show(SaveStatus::Rejected(e.to_string())),
		}
		result
	}

	/// Marks a batch as sent.
	pub fn begin_save(&mut self, batch: &CommitBatch) {
		self.saves_in_flight += 1;
		self.banner.show(SaveStatus::Saving(batch.len()));
	}

	/// Confirms acknowledged positions and reports the outcome.
	pub fn finish_save(&mut self, report: &FlushReport) {
		self.saves_in_flight = self.saves_in_flight.saturating_sub(1);
		self.scene.confirm(&report.saved_positions);
		let status = report.status();
		// A later batch still in flight keeps the saving banner unless this one failed.
		if self.saves_in_flight == 0 || status.is_error() {
			self.banner.show(status);
		}
		info!("save finished: {}/{} ok", report.attempted - report.failures.len(), report.attempted);
	}

	pub fn set_hover(&mut self, node: Option<NodeId>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// Keep the old highlight around so it can fade out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		if node.is_some() && !was_hovering {
			self.hover.delay_t = 0.0;
		}
		self.hover.node = node;
		self.refresh_hover_neighbors();
	}

	/// Parent and children of the hovered node, as the tree stands now.
	fn refresh_hover_neighbors(&mut self) {
		self.hover.neighbors.clear();
		let Some(id) = &self.hover.node else {
			return;
		};
		let graph = self.scene.graph();
		self.hover.neighbors.extend(graph.parent_of(id).map(|p| p.id.clone()));
		self.hover.neighbors.extend(graph.children(id).map(|c| c.id.clone()));
	}

	pub fn is_highlighted(&self, id: &NodeId) -> bool {
		self.hover.node.as_ref() == Some(id)
			|| self.hover.neighbors.contains(id)
			|| self.hover.prev_node.as_ref() == Some(id)
			|| self.hover.prev_neighbors.contains(id)
	}

	pub fn is_hovered(&self, id: &NodeId) -> bool {
		self.hover.node.as_ref() == Some(id) || self.hover.prev_node.as_ref() == Some(id)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	pub fn tick(&mut self, dt: f64) {
		self.flow_time += dt;
		self.banner.tick(dt);
		self.scene.settle_if_needed();

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}
}
