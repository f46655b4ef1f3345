use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use log::{info, warn};

use super::error::StoreError;
use super::geometry::Point;
use super::types::NodeId;

#[derive(Clone, Debug, PartialEq)]
pub struct PositionUpdate {
	pub node: NodeId,
	pub x: f64,
	pub y: f64,
}

impl PositionUpdate {
	pub fn new(node: NodeId, at: Point) -> Self {
		Self {
			node,
			x: at.x,
			y: at.y,
		}
	}

	pub fn point(&self) -> Point {
		Point::new(self.x, self.y)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentUpdate {
	pub node: NodeId,
	pub parent: NodeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchChange {
	Create { name: String, parent: Option<NodeId> },
	Rename { from: String, to: String },
	Delete { name: String },
}

/// Writes captured at one point in time, sent together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommitBatch {
	pub positions: Vec<PositionUpdate>,
	pub parents: Vec<ParentUpdate>,
	pub branches: Vec<BranchChange>,
}

impl CommitBatch {
	pub fn is_empty(&self) -> bool {
		self.positions.is_empty() && self.parents.is_empty() && self.branches.is_empty()
	}

	pub fn len(&self) -> usize {
		self.positions.len() + self.parents.len() + self.branches.len()
	}
}

/// The host application's persistence calls. Each call stands alone; position
/// writes are idempotent and the last write for a node wins.
pub trait MindmapStore {
	fn save_position(&self, update: &PositionUpdate) -> LocalBoxFuture<'static, Result<(), StoreError>>;
	fn save_parent(&self, update: &ParentUpdate) -> LocalBoxFuture<'static, Result<(), StoreError>>;
	fn save_branch(&self, change: &BranchChange) -> LocalBoxFuture<'static, Result<(), StoreError>>;
}

/// Outcome of one flush.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlushReport {
	/// Positions the store acknowledged; only these become confirmed.
	pub saved_positions: Vec<PositionUpdate>,
	pub failures: Vec<StoreError>,
	pub attempted: usize,
}

impl FlushReport {
	pub fn status(&self) -> SaveStatus {
		match self.failures.first() {
			None => SaveStatus::Saved(self.attempted),
			Some(first) => SaveStatus::Failed {
				failed: self.failures.len(),
				message: first.to_string(),
			},
		}
	}
}

/// Sends every write in `batch` concurrently. Failures are logged and
/// collected; nothing is rolled back.
pub async fn flush(store: Rc<dyn MindmapStore>, batch: CommitBatch) -> FlushReport {
	let attempted = batch.len();
	let positions = join_all(batch.positions.iter().map(|u| store.save_position(u)));
	let parents = join_all(batch.parents.iter().map(|u| store.save_parent(u)));
	let branches = join_all(batch.branches.iter().map(|c| store.save_branch(c)));
	let (positions, parents, branches) = futures::join!(positions, parents, branches);

	let mut report = FlushReport {
		attempted,
		..FlushReport::default()
	};
	for (update, result) in batch.positions.into_iter().zip(positions) {
		match result {
			Ok(()) => report.saved_positions.push(update),
			Err(e) => report.failures.push(e),
		}
	}
	report
		.failures
		.extend(parents.into_iter().chain(branches).filter_map(Result::err));

	for failure in &report.failures {
		warn!("mindmap save failed: {failure}");
	}
	report
}

/// Transient save indicator shown on the canvas.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SaveStatus {
	#[default]
	Idle,
	Saving(usize),
	Saved(usize),
	Failed { failed: usize, message: String },
	/// A change rejected before reaching the store.
	Rejected(String),
}

impl SaveStatus {
	pub fn label(&self) -> Option<String> {
		match self {
			SaveStatus::Idle => None,
			SaveStatus::Saving(n) => Some(format!("Saving {n} change(s)…")),
			SaveStatus::Saved(n) => Some(format!("Saved {n} change(s)")),
			SaveStatus::Failed { failed, message } => Some(format!("{failed} change(s) not saved: {message}")),
			SaveStatus::Rejected(message) => Some(message.clone()),
		}
	}

	pub fn is_error(&self) -> bool {
		matches!(self, SaveStatus::Failed { .. } | SaveStatus::Rejected(_))
	}
}

/// In-memory store that logs every call. Position writes can be made to fail
/// for a given node.
#[derive(Debug, Default)]
pub struct MemoryStore {
	positions: RefCell<HashMap<NodeId, Point>>,
	parents: RefCell<Vec<ParentUpdate>>,
	branches: RefCell<Vec<BranchChange>>,
	failing: RefCell<Vec<NodeId>>,
}

#[cfg(test)]
impl MemoryStore {
	pub fn fail_positions_of(&self, node: NodeId) {
		self.failing.borrow_mut().push(node);
	}

	pub fn position(&self, node: &NodeId) -> Option<Point> {
		self.positions.borrow().get(node).copied()
	}

	pub fn parents(&self) -> Vec<ParentUpdate> {
		self.parents.borrow().clone()
	}

	pub fn branches(&self) -> Vec<BranchChange> {
		self.branches.borrow().clone()
	}
}

impl MindmapStore for MemoryStore {
	fn save_position(&self, update: &PositionUpdate) -> LocalBoxFuture<'static, Result<(), StoreError>> {
		let result = if self.failing.borrow().contains(&update.node) {
			Err(StoreError::new("save position", &update.node, "rejected by store"))
		} else {
			info!("position {} -> ({:.1}, {:.1})", update.node, update.x, update.y);
			self.positions.borrow_mut().insert(update.node.clone(), update.point());
			Ok(())
		};
		async move { result }.boxed_local()
	}

	fn save_parent(&self, update: &ParentUpdate) -> LocalBoxFuture<'static, Result<(), StoreError>> {
		info!("parent {} -> {}", update.node, update.parent);
		self.parents.borrow_mut().push(update.clone());
		async { Ok(()) }.boxed_local()
	}

	fn save_branch(&self, change: &BranchChange) -> LocalBoxFuture<'static, Result<(), StoreError>> {
		info!("branch {change:?}");
		self.branches.borrow_mut().push(change.clone());
		async { Ok(()) }.boxed_local()
	}
}
