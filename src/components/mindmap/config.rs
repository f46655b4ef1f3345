use std::f64::consts::PI;

use serde::Deserialize;

use super::geometry::HalfExtent;
use super::types::NodeKind;

/// Tunables for the whole mindmap engine. Every section falls back to its
/// defaults when omitted from a JSON override.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MindmapConfig {
	pub layout: LayoutConfig,
	pub sizes: NodeSizes,
	pub collision: CollisionConfig,
	pub viewport: ViewportConfig,
	pub interaction: InteractionConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
	/// Circle radius for branches attached to the root.
	pub root_branch_radius: f64,
	/// Circle radius for branches nested in another branch.
	pub sub_branch_radius: f64,
	/// Leaves per ring around a branch.
	pub ring_capacity: usize,
	pub ring_base_radius: f64,
	pub ring_spacing: f64,
	/// Angular stagger added per ring.
	pub ring_angle_offset: f64,
	/// Circle radius for ideas placed around their parent idea.
	pub idea_child_radius: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			root_branch_radius: 320.0,
			sub_branch_radius: 180.0,
			ring_capacity: 5,
			ring_base_radius: 140.0,
			ring_spacing: 90.0,
			ring_angle_offset: PI / 5.0,
			idea_child_radius: 110.0,
		}
	}
}

/// Fallback half-extents used until a node has been measured.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeSizes {
	pub root: HalfExtent,
	pub branch: HalfExtent,
	pub leaf: HalfExtent,
}

impl NodeSizes {
	pub fn for_kind(&self, kind: NodeKind) -> HalfExtent {
		match kind {
			NodeKind::Root => self.root,
			NodeKind::Branch => self.branch,
			NodeKind::Leaf => self.leaf,
		}
	}
}

impl Default for NodeSizes {
	fn default() -> Self {
		Self {
			root: HalfExtent::new(90.0, 32.0),
			branch: HalfExtent::new(75.0, 24.0),
			leaf: HalfExtent::new(65.0, 20.0),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
	/// Extra gap kept between boxes, split across both nodes of a pair.
	pub padding: f64,
	pub max_passes: usize,
}

impl Default for CollisionConfig {
	fn default() -> Self {
		Self {
			padding: 12.0,
			max_passes: 12,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
	pub zoom_min: f64,
	pub zoom_max: f64,
	/// Largest zoom change a single wheel event or button press can make.
	pub zoom_step: f64,
	/// Raw wheel delta at which the full `zoom_step` is applied.
	pub wheel_delta_cap: f64,
}

impl Default for ViewportConfig {
	fn default() -> Self {
		Self {
			zoom_min: 0.2,
			zoom_max: 3.0,
			zoom_step: 0.1,
			wheel_delta_cap: 120.0,
		}
	}
}

impl ViewportConfig {
	/// Replaces unusable values with defaults and orders the zoom bounds, so
	/// that `zoom_min <= zoom_max` and every field is finite and positive.
	pub fn normalized(self) -> Self {
		let defaults = Self::default();
		let zoom_min = positive_or(self.zoom_min, defaults.zoom_min);
		let zoom_max = positive_or(self.zoom_max, defaults.zoom_max);
		Self {
			zoom_min: zoom_min.min(zoom_max),
			zoom_max: zoom_min.max(zoom_max),
			zoom_step: positive_or(self.zoom_step, defaults.zoom_step),
			wheel_delta_cap: positive_or(self.wheel_delta_cap, defaults.wheel_delta_cap),
		}
	}
}

fn positive_or(value: f64, fallback: f64) -> f64 {
	if value.is_finite() && value > 0.0 { value } else { fallback }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
	/// World distance within which a dropped leaf joins the nearest branch.
	pub capture_radius: f64,
}

impl Default for InteractionConfig {
	fn default() -> Self {
		Self {
			capture_radius: 160.0,
		}
	}
}
