use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::geometry::Point;
use super::state::MindmapState;
use super::types::{Node, NodeKind};

const BACKGROUND: &str = "#1a1a2e";
const LABEL_PAD_X: f64 = 12.0;
const LABEL_PAD_Y: f64 = 8.0;

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

fn font_size(kind: NodeKind) -> f64 {
	match kind {
		NodeKind::Root => 16.0,
		NodeKind::Branch => 14.0,
		NodeKind::Leaf => 12.0,
	}
}

fn font(kind: NodeKind) -> String {
	match kind {
		NodeKind::Root => format!("bold {}px sans-serif", font_size(kind)),
		_ => format!("{}px sans-serif", font_size(kind)),
	}
}

/// Measures labels that changed since they were last drawn and feeds the
/// boxes back to the layout. World units equal canvas pixels at zoom 1.
pub fn measure_labels(state: &mut MindmapState, ctx: &CanvasRenderingContext2d) {
	let pending: Vec<(Node, f64)> = state
		.scene
		.visible_nodes()
		.filter(|n| state.scene.sizes().needs_measure(n))
		.filter_map(|n| {
			ctx.set_font(&font(n.kind));
			let metrics = ctx.measure_text(&n.label).ok()?;
			Some((n.clone(), metrics.width()))
		})
		.collect();
	for (node, text_width) in pending {
		let width = text_width + 2.0 * LABEL_PAD_X;
		let height = font_size(node.kind) + 2.0 * LABEL_PAD_Y;
		state.scene.record_measurement(&node.id, width, height);
	}
}

pub fn render(state: &MindmapState, ctx: &CanvasRenderingContext2d) {
	let viewport = state.scene.viewport();
	let (width, height) = viewport.size();
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, width, height);
	ctx.save();
	let _ = ctx.scale(viewport.zoom(), viewport.zoom());
	let _ = ctx.translate(viewport.pan().x, viewport.pan().y);
	draw_edges(state, ctx);
	draw_link_preview(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
	draw_banner(state, ctx);
}

fn draw_edges(state: &MindmapState, ctx: &CanvasRenderingContext2d) {
	let scene = &state.scene;
	let k = scene.viewport().zoom();
	let (line_width, dash, gap) = (1.5 / k, 8.0 / k, 4.0 / k);
	let dash_offset = -(state.flow_time * 30.0) % (dash + gap);
	let t = ease_out_cubic(state.hover.highlight_t);
	let _ = ctx.set_line_dash(&js_sys::Array::of2(
		&JsValue::from_f64(dash),
		&JsValue::from_f64(gap),
	));
	ctx.set_line_dash_offset(dash_offset);

	for (parent, child) in scene.graph().edges() {
		if scene.visibility().is_hidden(&child.id) {
			continue;
		}
		let (Some(a), Some(b)) = (scene.position(&parent.id), scene.position(&child.id)) else {
			continue;
		};
		if a.distance(b) < 0.001 {
			continue;
		}

		let is_highlighted = state.is_highlighted(&parent.id) && state.is_highlighted(&child.id);
		// t=0: every edge at 0.6; t=1: highlighted at 0.9, the rest at 0.15
		let (alpha, width) = if is_highlighted {
			(0.6 + 0.3 * t, line_width * (1.0 + 0.3 * t))
		} else {
			(0.6 - 0.45 * t, line_width * (1.0 - 0.3 * t))
		};
		ctx.set_stroke_style_str(&format!("rgba(100, 180, 255, {alpha})"));
		ctx.set_line_width(width);
		ctx.begin_path();
		ctx.move_to(a.x, a.y);
		ctx.line_to(b.x, b.y);
		ctx.stroke();
	}
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_link_preview(state: &MindmapState, ctx: &CanvasRenderingContext2d) {
	let Some(mode) = state.interaction.link_mode() else {
		return;
	};
	let scene = &state.scene;
	let Some(from) = scene.position(mode.source()) else {
		return;
	};
	let viewport = scene.viewport();
	let to = viewport.world_from_screen(viewport.fallback_anchor());
	let k = viewport.zoom();
	let _ = ctx.set_line_dash(&js_sys::Array::of2(
		&JsValue::from_f64(4.0 / k),
		&JsValue::from_f64(4.0 / k),
	));
	ctx.set_stroke_style_str("rgba(255, 220, 120, 0.9)");
	ctx.set_line_width(2.0 / k);
	ctx.begin_path();
	ctx.move_to(from.x, from.y);
	ctx.line_to(to.x, to.y);
	ctx.stroke();
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_nodes(state: &MindmapState, ctx: &CanvasRenderingContext2d) {
	let scene = &state.scene;
	let (has_highlight, t, k) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
		scene.viewport().zoom(),
	);
	let selected = state.interaction.selected();
	let link_source = state.interaction.link_mode().map(|m| m.source());

	for node in scene.visible_nodes() {
		let Some(center) = scene.position(&node.id) else {
			continue;
		};
		let half = scene.sizes().half_extent(node, &scene.config().sizes);
		let (x, y) = (center.x - half.w, center.y - half.h);
		let (w, h) = (half.w * 2.0, half.h * 2.0);
		let alpha = if has_highlight && !state.is_highlighted(&node.id) {
			1.0 - 0.7 * t
		} else {
			1.0
		};

		ctx.set_global_alpha(alpha);
		ctx.set_fill_style_str(BACKGROUND);
		ctx.fill_rect(x, y, w, h);
		ctx.set_stroke_style_str(state.color_of(&node.id));
		ctx.set_line_width(match node.kind {
			NodeKind::Root => 2.5,
			NodeKind::Branch => 2.0,
			NodeKind::Leaf => 1.0,
		});
		ctx.stroke_rect(x, y, w, h);

		if state.is_hovered(&node.id) && t > 0.01 {
			ctx.set_stroke_style_str(&format!("rgba(255, 255, 255, {})", 0.7 * t));
			ctx.set_line_width(1.5 / k);
			let pad = 3.0 / k;
			ctx.stroke_rect(x - pad, y - pad, w + 2.0 * pad, h + 2.0 * pad);
		}
		if selected == Some(&node.id) || link_source == Some(&node.id) {
			ctx.set_stroke_style_str("rgba(255, 220, 120, 0.9)");
			ctx.set_line_width(2.0 / k);
			let pad = 6.0 / k;
			ctx.stroke_rect(x - pad, y - pad, w + 2.0 * pad, h + 2.0 * pad);
		}

		ctx.set_fill_style_str("white");
		ctx.set_font(&font(node.kind));
		ctx.set_text_align("center");
		ctx.set_text_baseline("middle");
		let _ = ctx.fill_text(&node.label, center.x, center.y);

		if scene.visibility().is_collapsed(&node.id) {
			draw_collapsed_badge(ctx, Point::new(x + w, y), k);
		}
		ctx.set_global_alpha(1.0);
	}
}

fn draw_collapsed_badge(ctx: &CanvasRenderingContext2d, at: Point, k: f64) {
	let r = 7.0 / k.max(0.5);
	ctx.begin_path();
	let _ = ctx.arc(at.x, at.y, r, 0.0, std::f64::consts::TAU);
	ctx.set_fill_style_str("#ff7f0e");
	ctx.fill();
	ctx.set_fill_style_str("white");
	ctx.set_font(&format!("bold {}px sans-serif", r * 1.6));
	let _ = ctx.fill_text("+", at.x, at.y);
}

fn draw_banner(state: &MindmapState, ctx: &CanvasRenderingContext2d) {
	let Some(text) = state.banner.status.label() else {
		return;
	};
	let (width, _) = state.scene.viewport().size();
	ctx.set_global_alpha(state.banner.alpha());
	ctx.set_font("13px sans-serif");
	let text_width = ctx.measure_text(&text).map(|m| m.width()).unwrap_or(200.0);
	let (w, h) = (text_width + 24.0, 28.0);
	let x = (width - w) / 2.0;
	ctx.set_fill_style_str(if state.banner.status.is_error() {
		"rgba(180, 40, 40, 0.9)"
	} else {
		"rgba(30, 60, 100, 0.9)"
	});
	ctx.fill_rect(x, 12.0, w, h);
	ctx.set_fill_style_str("white");
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	let _ = ctx.fill_text(&text, width / 2.0, 12.0 + h / 2.0);
	ctx.set_global_alpha(1.0);
}
