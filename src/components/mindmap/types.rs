use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::Point;

/// World position per node. At most one entry per id.
pub type PositionMap = HashMap<NodeId, Point>;

const BRANCH_PREFIX: &str = "branch:";
const IDEA_PREFIX: &str = "idea:";

/// Identifier of a node in the projected tree.
///
/// Branch and idea ids are namespaced (`branch:<name>`, `idea:<id>`) so a branch
/// named like an idea id never collides with it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
	pub fn root() -> Self {
		Self("root".into())
	}

	pub fn branch(name: &str) -> Self {
		Self(format!("{BRANCH_PREFIX}{name}"))
	}

	pub fn idea(id: &str) -> Self {
		Self(format!("{IDEA_PREFIX}{id}"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn is_root(&self) -> bool {
		self.0 == "root"
	}

	pub fn branch_name(&self) -> Option<&str> {
		self.0.strip_prefix(BRANCH_PREFIX)
	}

	pub fn idea_id(&self) -> Option<&str> {
		self.0.strip_prefix(IDEA_PREFIX)
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Root,
	Branch,
	Leaf,
}

/// A projected node. `parent` is `None` only for the root.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	pub id: NodeId,
	pub kind: NodeKind,
	pub label: String,
	pub parent: Option<NodeId>,
	/// Backing idea id for leaves.
	pub idea: Option<String>,
	pub color_slot: Option<u32>,
}

/// An idea as supplied by the host application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
	pub id: String,
	pub title: String,
	#[serde(default)]
	pub parent_idea_id: Option<String>,
	#[serde(default)]
	pub branch_label: Option<String>,
	#[serde(default)]
	pub x: Option<f64>,
	#[serde(default)]
	pub y: Option<f64>,
}

impl Idea {
	/// Saved position, if both coordinates are present and finite.
	pub fn position(&self) -> Option<Point> {
		match (self.x, self.y) {
			(Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(Point::new(x, y)),
			_ => None,
		}
	}
}

/// A named grouping as supplied by the host application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
	pub name: String,
	#[serde(default)]
	pub parent_link: Option<NodeId>,
	#[serde(default)]
	pub color_slot: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindmapData {
	pub root_label: String,
	#[serde(default)]
	pub ideas: Vec<Idea>,
	#[serde(default)]
	pub branches: Vec<Branch>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_namespaced() {
		assert_eq!(NodeId::branch("42").branch_name(), Some("42"));
		assert_eq!(NodeId::idea("42").idea_id(), Some("42"));
		assert_ne!(NodeId::branch("42"), NodeId::idea("42"));
		assert!(NodeId::root().is_root());
	}

	#[test]
	fn deserializes_host_payload() {
		let data: MindmapData = serde_json::from_str(
			r#"{
				"rootLabel": "Launch",
				"ideas": [{"id": "1", "title": "Pricing", "branchLabel": "Market", "x": 10.0, "y": 20.0}],
				"branches": [{"name": "Market", "parentLink": "root", "colorSlot": 2}]
			}"#,
		)
		.unwrap();
		assert_eq!(data.ideas[0].position(), Some(Point::new(10.0, 20.0)));
		assert_eq!(data.branches[0].parent_link, Some(NodeId::root()));
		assert_eq!(data.ideas[0].parent_idea_id, None);
	}
}
