//! Fixture builders shared by the engine tests.

use super::types::{Branch, Idea, NodeId};

pub fn idea(id: &str, parent: Option<&str>, branch: Option<&str>) -> Idea {
	Idea {
		id: id.into(),
		title: format!("Idea {id}"),
		parent_idea_id: parent.map(Into::into),
		branch_label: branch.map(Into::into),
		x: None,
		y: None,
	}
}

pub fn branch(name: &str, parent: Option<NodeId>) -> Branch {
	Branch {
		name: name.into(),
		parent_link: parent,
		color_slot: None,
	}
}
