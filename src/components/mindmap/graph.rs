use std::collections::{HashMap, HashSet};

use log::debug;

use super::error::RelinkError;
use super::types::{Branch, Idea, Node, NodeId, NodeKind};

/// Parent-pointer tree projected from the host's idea and branch lists.
///
/// Node order is stable: root first, then branches, then ideas, each in input
/// order. Seeding and collision resolution iterate in this order, which keeps
/// both deterministic.
#[derive(Clone, Debug)]
pub struct NodeGraph {
	nodes: Vec<Node>,
	index: HashMap<NodeId, usize>,
	children: Vec<Vec<usize>>,
}

/// Parent candidates for one node, in precedence order.
struct ParentChoice {
	preferred: Option<NodeId>,
	fallback: Option<NodeId>,
}

impl NodeGraph {
	pub fn project(ideas: &[Idea], branches: &[Branch], root_label: &str) -> Self {
		let root = NodeId::root();
		let mut nodes = vec![Node {
			id: root.clone(),
			kind: NodeKind::Root,
			label: root_label.to_string(),
			parent: None,
			idea: None,
			color_slot: None,
		}];
		let mut index = HashMap::from([(root.clone(), 0)]);
		let mut links: Vec<(Option<&NodeId>, Option<&str>, Option<&str>)> = vec![(None, None, None)];

		for branch in branches {
			let id = NodeId::branch(&branch.name);
			if index.contains_key(&id) {
				continue;
			}
			index.insert(id.clone(), nodes.len());
			links.push((branch.parent_link.as_ref(), None, None));
			nodes.push(Node {
				id,
				kind: NodeKind::Branch,
				label: branch.name.clone(),
				parent: None,
				idea: None,
				color_slot: branch.color_slot,
			});
		}

		for idea in ideas {
			let id = NodeId::idea(&idea.id);
			if index.contains_key(&id) {
				continue;
			}
			index.insert(id.clone(), nodes.len());
			links.push((
				None,
				idea.parent_idea_id.as_deref(),
				idea.branch_label.as_deref(),
			));
			nodes.push(Node {
				id,
				kind: NodeKind::Leaf,
				label: idea.title.clone(),
				parent: None,
				idea: Some(idea.id.clone()),
				color_slot: None,
			});
		}

		let present = |id: NodeId, own: &NodeId| (id != *own && index.contains_key(&id)).then_some(id);
		let choices: Vec<ParentChoice> = nodes
			.iter()
			.zip(&links)
			.map(|(node, &(link, parent_idea, branch_label))| match node.kind {
				NodeKind::Root => ParentChoice {
					preferred: None,
					fallback: None,
				},
				NodeKind::Branch => ParentChoice {
					preferred: link.and_then(|l| present(l.clone(), &node.id)),
					fallback: None,
				},
				NodeKind::Leaf => ParentChoice {
					preferred: parent_idea.and_then(|p| present(NodeId::idea(p), &node.id)),
					fallback: branch_label.and_then(|b| present(NodeId::branch(b), &node.id)),
				},
			})
			.collect();

		for (node, choice) in nodes.iter_mut().zip(&choices).skip(1) {
			node.parent = choice
				.preferred
				.clone()
				.or_else(|| choice.fallback.clone())
				.or_else(|| Some(root.clone()));
		}

		// Collaborator data may carry cyclic references. The first node of each
		// cycle (in node order) drops to its fallback parent, then to the root.
		for i in 1..nodes.len() {
			if !reaches(&nodes, &index, i) {
				continue;
			}
			let fallback = choices[i].fallback.clone();
			debug!("breaking parent cycle at {}", nodes[i].id);
			if fallback.is_some() && nodes[i].parent != fallback {
				nodes[i].parent = fallback;
				if !reaches(&nodes, &index, i) {
					continue;
				}
			}
			nodes[i].parent = Some(root.clone());
		}

		let mut children = vec![Vec::new(); nodes.len()];
		for (i, node) in nodes.iter().enumerate() {
			if let Some(p) = node.parent.as_ref().and_then(|p| index.get(p)) {
				children[*p].push(i);
			}
		}

		Self {
			nodes,
			index,
			children,
		}
	}

	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn root(&self) -> &Node {
		&self.nodes[0]
	}

	pub fn get(&self, id: &NodeId) -> Option<&Node> {
		self.index.get(id).map(|&i| &self.nodes[i])
	}

	pub fn contains(&self, id: &NodeId) -> bool {
		self.index.contains_key(id)
	}

	pub fn parent_of(&self, id: &NodeId) -> Option<&Node> {
		self.get(id)?.parent.as_ref().and_then(|p| self.get(p))
	}

	/// Direct children in node order.
	pub fn children(&self, id: &NodeId) -> impl Iterator<Item = &Node> {
		self.index
			.get(id)
			.map(|&i| self.children[i].as_slice())
			.unwrap_or_default()
			.iter()
			.map(|&c| &self.nodes[c])
	}

	/// `(parent, child)` for every non-root node.
	pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node)> {
		self.nodes
			.iter()
			.filter_map(|n| self.parent_of(&n.id).map(|p| (p, n)))
	}

	/// Strict ancestors, nearest first.
	pub fn ancestors(&self, id: &NodeId) -> impl Iterator<Item = &Node> {
		let mut next = self.parent_of(id);
		let mut remaining = self.nodes.len();
		std::iter::from_fn(move || {
			let current = next.filter(|_| remaining > 0)?;
			remaining -= 1;
			next = self.parent_of(&current.id);
			Some(current)
		})
	}

	/// Strict descendants in depth-first order.
	pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack: Vec<usize> = match self.index.get(id) {
			Some(&i) => self.children[i].iter().rev().copied().collect(),
			None => return out,
		};
		while let Some(i) = stack.pop() {
			out.push(self.nodes[i].id.clone());
			stack.extend(self.children[i].iter().rev());
		}
		out
	}

	/// The node itself if it is a branch, else its nearest branch ancestor.
	pub fn enclosing_branch(&self, id: &NodeId) -> Option<&Node> {
		let node = self.get(id)?;
		if node.kind == NodeKind::Branch {
			return Some(node);
		}
		self.ancestors(id).find(|n| n.kind == NodeKind::Branch)
	}

	/// Checks that `child` may be placed under `parent` without breaking the tree.
	pub fn check_relink(&self, child: &NodeId, parent: &NodeId) -> Result<(), RelinkError> {
		if child == parent {
			return Err(RelinkError::SelfLink(child.clone()));
		}
		for id in [child, parent] {
			if !self.contains(id) {
				return Err(RelinkError::UnknownNode(id.clone()));
			}
		}
		if child.is_root() {
			return Err(RelinkError::RootIsFixed);
		}
		if self.ancestors(parent).any(|a| a.id == *child) {
			return Err(RelinkError::Cycle {
				node: child.clone(),
				parent: parent.clone(),
			});
		}
		Ok(())
	}
}

/// Whether walking up from node `start` leads back to it.
fn reaches(nodes: &[Node], index: &HashMap<NodeId, usize>, start: usize) -> bool {
	let mut cursor = nodes[start].parent.as_ref();
	for _ in 0..nodes.len() {
		let Some(&i) = cursor.and_then(|p| index.get(p)) else {
			return false;
		};
		if i == start {
			return true;
		}
		cursor = nodes[i].parent.as_ref();
	}
	false
}

/// Collapsed branches and the set of nodes they hide.
#[derive(Clone, Debug, Default)]
pub struct Visibility {
	collapsed: HashSet<NodeId>,
	hidden: HashSet<NodeId>,
}

impl Visibility {
	pub fn is_hidden(&self, id: &NodeId) -> bool {
		self.hidden.contains(id)
	}

	pub fn is_collapsed(&self, id: &NodeId) -> bool {
		self.collapsed.contains(id)
	}

	pub fn hidden(&self) -> &HashSet<NodeId> {
		&self.hidden
	}

	/// Collapses or expands `branch` together with every branch below it.
	/// Returns `None` if `branch` is not a branch node.
	pub fn set_collapsed(&mut self, graph: &NodeGraph, branch: &NodeId, collapsed: bool) -> Option<()> {
		if graph.get(branch)?.kind != NodeKind::Branch {
			return None;
		}
		let closure = std::iter::once(branch.clone()).chain(
			graph
				.descendants(branch)
				.into_iter()
				.filter(|id| graph.get(id).is_some_and(|n| n.kind == NodeKind::Branch)),
		);
		if collapsed {
			self.collapsed.extend(closure);
		} else {
			for id in closure {
				self.collapsed.remove(&id);
			}
		}
		self.refresh(graph);
		Some(())
	}

	/// Flips `branch`. Returns the new collapsed state.
	pub fn toggle(&mut self, graph: &NodeGraph, branch: &NodeId) -> Option<bool> {
		let collapse = !self.is_collapsed(branch);
		self.set_collapsed(graph, branch, collapse)?;
		Some(collapse)
	}

	/// Recomputes the hidden set after the graph changed, forgetting marks on
	/// branches that no longer exist.
	pub fn refresh(&mut self, graph: &NodeGraph) {
		self.collapsed
			.retain(|id| graph.get(id).is_some_and(|n| n.kind == NodeKind::Branch));
		self.hidden = graph
			.nodes()
			.iter()
			.filter(|n| graph.ancestors(&n.id).any(|a| self.collapsed.contains(&a.id)))
			.map(|n| n.id.clone())
			.collect();
	}

	/// Moves a collapsed mark to a renamed branch.
	pub fn rename(&mut self, from: &NodeId, to: NodeId) {
		if self.collapsed.remove(from) {
			self.collapsed.insert(to);
		}
	}
}
