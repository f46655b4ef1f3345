use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// A 2D vector, used for both world and screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	/// Point at `radius` from `center`, `angle` radians clockwise from +x (screen y grows down).
	pub fn polar(center: Point, radius: f64, angle: f64) -> Self {
		Self {
			x: center.x + radius * angle.cos(),
			y: center.y + radius * angle.sin(),
		}
	}

	pub fn distance(self, other: Point) -> f64 {
		let (dx, dy) = (other.x - self.x, other.y - self.y);
		(dx * dx + dy * dy).sqrt()
	}

	pub fn is_finite(self) -> bool {
		self.x.is_finite() && self.y.is_finite()
	}

	pub fn approx_eq(self, other: Point, eps: f64) -> bool {
		(self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
	}
}

impl Add for Point {
	type Output = Point;
	fn add(self, rhs: Point) -> Point {
		Point::new(self.x + rhs.x, self.y + rhs.y)
	}
}

impl Sub for Point {
	type Output = Point;
	fn sub(self, rhs: Point) -> Point {
		Point::new(self.x - rhs.x, self.y - rhs.y)
	}
}

impl Mul<f64> for Point {
	type Output = Point;
	fn mul(self, k: f64) -> Point {
		Point::new(self.x * k, self.y * k)
	}
}

impl Div<f64> for Point {
	type Output = Point;
	fn div(self, k: f64) -> Point {
		Point::new(self.x / k, self.y / k)
	}
}

impl Neg for Point {
	type Output = Point;
	fn neg(self) -> Point {
		Point::new(-self.x, -self.y)
	}
}

impl AddAssign for Point {
	fn add_assign(&mut self, rhs: Point) {
		self.x += rhs.x;
		self.y += rhs.y;
	}
}

impl SubAssign for Point {
	fn sub_assign(&mut self, rhs: Point) {
		self.x -= rhs.x;
		self.y -= rhs.y;
	}
}

/// Half the width/height of a node's bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HalfExtent {
	pub w: f64,
	pub h: f64,
}

impl HalfExtent {
	pub const fn new(w: f64, h: f64) -> Self {
		Self { w, h }
	}

	pub fn from_size(width: f64, height: f64) -> Self {
		Self::new(width / 2.0, height / 2.0)
	}

	/// Whether `point` lies inside the box of this extent centered on `center`.
	pub fn contains(self, center: Point, point: Point) -> bool {
		(point.x - center.x).abs() <= self.w && (point.y - center.y).abs() <= self.h
	}
}
