use super::config::ViewportConfig;
use super::geometry::Point;

/// A scroll or wheel event, already in canvas-relative screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollInput {
	pub delta: Point,
	/// Pointer location of the event, if the platform reported one.
	pub position: Option<Point>,
	pub ctrl: bool,
	pub meta: bool,
	/// Explicit pinch signal from a gesture API.
	pub pinch: bool,
}

/// Unit of a raw wheel delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeltaUnit {
	#[default]
	Pixel,
	Line,
	Page,
}

/// Pixels per line for line-based wheel deltas.
const LINE_HEIGHT: f64 = 16.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollGesture {
	Pan(Point),
	Zoom { delta: f64, anchor: Point },
}

/// Zoom and pan over the world. A world point `p` lands on screen at
/// `(p + pan) * zoom`.
#[derive(Clone, Debug)]
pub struct Viewport {
	cfg: ViewportConfig,
	zoom: f64,
	pan: Point,
	width: f64,
	height: f64,
	last_pointer: Option<Point>,
}

impl Viewport {
	/// Starts at zoom 1 with the world origin centered. Unusable zoom bounds
	/// are repaired first.
	pub fn new(cfg: ViewportConfig, width: f64, height: f64) -> Self {
		let cfg = cfg.normalized();
		let mut viewport = Self {
			zoom: 1.0_f64.clamp(cfg.zoom_min, cfg.zoom_max),
			cfg,
			pan: Point::ORIGIN,
			width,
			height,
			last_pointer: None,
		};
		viewport.center_on(Point::ORIGIN);
		viewport
	}

	pub fn zoom(&self) -> f64 {
		self.zoom
	}

	pub fn pan(&self) -> Point {
		self.pan
	}

	pub fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	pub fn screen_center(&self) -> Point {
		Point::new(self.width / 2.0, self.height / 2.0)
	}

	/// Keeps the world point at the old center in the middle after a resize.
	pub fn resize(&mut self, width: f64, height: f64) {
		let center = self.world_from_screen(self.screen_center());
		self.width = width;
		self.height = height;
		self.center_on(center);
	}

	/// Converts a wheel delta to screen pixels. A page is one viewport.
	pub fn delta_in_pixels(&self, delta: Point, unit: DeltaUnit) -> Point {
		match unit {
			DeltaUnit::Pixel => delta,
			DeltaUnit::Line => delta * LINE_HEIGHT,
			DeltaUnit::Page => Point::new(delta.x * self.width, delta.y * self.height),
		}
	}

	pub fn screen_from_world(&self, world: Point) -> Point {
		(world + self.pan) * self.zoom
	}

	pub fn world_from_screen(&self, screen: Point) -> Point {
		screen / self.zoom - self.pan
	}

	/// Remembers where the pointer last was, for anchoring button zooms.
	pub fn track_pointer(&mut self, screen: Point) {
		if screen.is_finite() {
			self.last_pointer = Some(screen);
		}
	}

	/// Last known pointer location, else the viewport center.
	pub fn fallback_anchor(&self) -> Point {
		self.last_pointer.unwrap_or_else(|| self.screen_center())
	}

	/// Zoom change for a raw wheel delta: grows with `|raw|` but flattens out,
	/// reaching `zoom_step` at `wheel_delta_cap` and never exceeding it.
	pub fn zoom_magnitude(&self, raw: f64) -> f64 {
		let cap = self.cfg.wheel_delta_cap.max(f64::EPSILON);
		self.cfg.zoom_step * (raw.abs().min(cap) / cap).sqrt()
	}

	/// Zooms by a raw wheel delta (negative zooms in) while keeping the world
	/// point under `anchor` fixed on screen.
	pub fn zoom_at_point(&mut self, raw: f64, anchor: Point) {
		if !raw.is_finite() || raw == 0.0 || !anchor.is_finite() {
			return;
		}
		let world_at_anchor = self.world_from_screen(anchor);
		let sign = -raw.signum();
		self.zoom = (self.zoom + sign * self.zoom_magnitude(raw)).clamp(self.cfg.zoom_min, self.cfg.zoom_max);
		self.pan = anchor / self.zoom - world_at_anchor;
	}

	/// One full zoom step, anchored at the last pointer location.
	pub fn zoom_step(&mut self, zoom_in: bool) {
		let raw = if zoom_in { -self.cfg.wheel_delta_cap } else { self.cfg.wheel_delta_cap };
		self.zoom_at_point(raw, self.fallback_anchor());
	}

	/// Moves the view by a screen-space delta.
	pub fn pan_by(&mut self, screen_delta: Point) {
		if screen_delta.is_finite() {
			self.pan -= screen_delta / self.zoom;
		}
	}

	/// Places `world` at the center of the viewport.
	pub fn center_on(&mut self, world: Point) {
		self.pan = self.screen_center() / self.zoom - world;
	}

	/// Back to zoom 1 with `world` centered.
	pub fn reset(&mut self, world: Point) {
		self.zoom = 1.0_f64.clamp(self.cfg.zoom_min, self.cfg.zoom_max);
		self.center_on(world);
	}

	/// Two-axis scrolling pans; ctrl/meta or a pinch zooms.
	pub fn classify(&self, input: &ScrollInput) -> ScrollGesture {
		if input.ctrl || input.meta || input.pinch {
			ScrollGesture::Zoom {
				delta: input.delta.y,
				anchor: input.position.unwrap_or_else(|| self.fallback_anchor()),
			}
		} else {
			ScrollGesture::Pan(input.delta)
		}
	}

	pub fn apply_scroll(&mut self, input: &ScrollInput) -> ScrollGesture {
		if let Some(position) = input.position {
			self.track_pointer(position);
		}
		let gesture = self.classify(input);
		match gesture {
			ScrollGesture::Pan(delta) => self.pan_by(delta),
			ScrollGesture::Zoom { delta, anchor } => self.zoom_at_point(delta, anchor),
		}
		gesture
	}
}
