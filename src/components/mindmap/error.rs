use thiserror::Error;

use super::types::NodeId;

/// A parent change rejected locally, before any store call is made.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RelinkError {
	#[error("cannot link {0} to itself")]
	SelfLink(NodeId),
	#[error("unknown node {0}")]
	UnknownNode(NodeId),
	#[error("the root node cannot be given a parent")]
	RootIsFixed,
	#[error("linking {node} under {parent} would create a cycle")]
	Cycle { node: NodeId, parent: NodeId },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BranchError {
	#[error("branch name must not be empty")]
	EmptyName,
	#[error("a branch named {0:?} already exists")]
	Duplicate(String),
	#[error("no branch named {0:?}")]
	Unknown(String),
	#[error("select a branch first")]
	NoneSelected,
	#[error(transparent)]
	Relink(#[from] RelinkError),
}

/// A collaborator call that did not succeed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{operation} failed for {target}: {reason}")]
pub struct StoreError {
	pub operation: &'static str,
	pub target: String,
	pub reason: String,
}

impl StoreError {
	pub fn new(operation: &'static str, target: impl ToString, reason: impl ToString) -> Self {
		Self {
			operation,
			target: target.to_string(),
			reason: reason.to_string(),
		}
	}
}
