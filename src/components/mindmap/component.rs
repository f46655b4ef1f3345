use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{
	CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent, MouseEvent, PointerEvent, WheelEvent,
	Window,
};

use super::config::MindmapConfig;
use super::geometry::Point;
use super::interaction::{LinkMode, PointerEffects, PointerInput};
use super::persist::{CommitBatch, MindmapStore, flush};
use super::render;
use super::state::MindmapState;
use super::types::MindmapData;
use super::viewport::{DeltaUnit, ScrollInput};

type SharedState = Rc<RefCell<Option<MindmapState>>>;

/// Canvas-relative position of a mouse-like event.
fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<Point> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some(Point::new(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

fn pointer_input(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &PointerEvent) -> Option<PointerInput> {
	Some(PointerInput {
		pointer: ev.pointer_id(),
		screen: local_point(canvas_ref, ev)?,
	})
}

fn window_size(window: &Window) -> Option<(f64, f64)> {
	Some((
		window.inner_width().ok()?.as_f64()?,
		window.inner_height().ok()?.as_f64()?,
	))
}

/// Sends `batch` to the store in the background and reports back into `state`.
fn spawn_flush(state: SharedState, store: Rc<dyn MindmapStore>, batch: CommitBatch) {
	if batch.is_empty() {
		return;
	}
	if let Some(ref mut s) = *state.borrow_mut() {
		s.begin_save(&batch);
	}
	spawn_local(async move {
		let report = flush(store, batch).await;
		if let Some(ref mut s) = *state.borrow_mut() {
			s.finish_save(&report);
		}
	});
}

/// Applies capture changes and starts the save a pointer event asked for.
fn apply_effects(
	canvas_ref: NodeRef<leptos::html::Canvas>,
	state: &SharedState,
	store: &Rc<dyn MindmapStore>,
	effects: PointerEffects,
) {
	if let Some(canvas) = canvas_ref.get() {
		let canvas: HtmlCanvasElement = canvas.into();
		if let Some(id) = effects.capture {
			let _ = canvas.set_pointer_capture(id);
		}
		if let Some(id) = effects.release {
			let _ = canvas.release_pointer_capture(id);
		}
	}
	if let Some(batch) = effects.commit {
		spawn_flush(state.clone(), store.clone(), batch);
	}
}

#[component]
pub fn MindmapCanvas(
	#[prop(into)] data: Signal<MindmapData>,
	store: Rc<dyn MindmapStore>,
	#[prop(optional)] config: Option<MindmapConfig>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (state_init, animate_init, resize_cb_init) =
		(state.clone(), animate.clone(), resize_cb.clone());
	let config = config.unwrap_or_default();

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if state_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window).unwrap_or((800.0, 600.0))
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			warn!("2d canvas context unavailable");
			return;
		};
		*state_init.borrow_mut() = Some(MindmapState::new(
			config.clone(),
			data.get_untracked(),
			w,
			h,
		));

		if fullscreen {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some((nw, nh)) = web_sys::window().as_ref().and_then(window_size) else {
					return;
				};
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, animate_inner) = (state_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				render::measure_labels(s, &ctx);
				s.tick(0.016);
				render::render(s, &ctx);
			}
			if let (Some(cb), Some(win)) = (&*animate_inner.borrow(), web_sys::window()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	// Host data changes after mount
	let state_data = state.clone();
	Effect::new(move |_| {
		let next = data.get();
		let release = match *state_data.borrow_mut() {
			Some(ref mut s) => s.set_domain(next),
			None => return,
		};
		if let (Some(id), Some(canvas)) = (release, canvas_ref.get()) {
			let canvas: HtmlCanvasElement = canvas.into();
			let _ = canvas.release_pointer_capture(id);
		}
	});

	let (state_pd, store_pd) = (state.clone(), store.clone());
	let on_pointerdown = move |ev: PointerEvent| {
		let Some(input) = pointer_input(canvas_ref, &ev) else {
			return;
		};
		let effects = match *state_pd.borrow_mut() {
			Some(ref mut s) => s.pointer_down(input),
			None => return,
		};
		apply_effects(canvas_ref, &state_pd, &store_pd, effects);
	};

	let state_pm = state.clone();
	let on_pointermove = move |ev: PointerEvent| {
		let Some(input) = pointer_input(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_pm.borrow_mut() {
			s.pointer_move(input);
		}
	};

	let (state_pu, store_pu) = (state.clone(), store.clone());
	let on_pointerup = move |ev: PointerEvent| {
		let Some(input) = pointer_input(canvas_ref, &ev) else {
			return;
		};
		let effects = match *state_pu.borrow_mut() {
			Some(ref mut s) => s.pointer_up(input),
			None => return,
		};
		apply_effects(canvas_ref, &state_pu, &store_pu, effects);
	};

	let (state_pc, store_pc) = (state.clone(), store.clone());
	let on_pointercancel = move |ev: PointerEvent| {
		let Some(input) = pointer_input(canvas_ref, &ev) else {
			return;
		};
		let effects = match *state_pc.borrow_mut() {
			Some(ref mut s) => s.pointer_cancel(input),
			None => return,
		};
		apply_effects(canvas_ref, &state_pc, &store_pc, effects);
	};

	let state_pl = state.clone();
	let on_pointerleave = move |_: PointerEvent| {
		if let Some(ref mut s) = *state_pl.borrow_mut() {
			s.pointer_leave();
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let unit = match ev.delta_mode() {
			WheelEvent::DOM_DELTA_LINE => DeltaUnit::Line,
			WheelEvent::DOM_DELTA_PAGE => DeltaUnit::Page,
			_ => DeltaUnit::Pixel,
		};
		let raw = Point::new(ev.delta_x(), ev.delta_y());
		let position = local_point(canvas_ref, &ev);
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			let input = ScrollInput {
				delta: s.scene.viewport().delta_in_pixels(raw, unit),
				position,
				ctrl: ev.ctrl_key(),
				meta: ev.meta_key(),
				pinch: false,
			};
			s.scroll(&input);
		}
	};

	let state_dc = state.clone();
	let on_dblclick = move |ev: MouseEvent| {
		let Some(at) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_dc.borrow_mut() {
			s.toggle_collapse_at(at);
		}
	};

	let (state_kd, store_kd) = (state.clone(), store.clone());
	let on_keydown = move |ev: KeyboardEvent| {
		let key = ev.key();
		let batch = {
			let mut guard = state_kd.borrow_mut();
			let Some(s) = guard.as_mut() else {
				return;
			};
			match key.as_str() {
				"Escape" => {
					s.cancel_link();
					None
				}
				"+" | "=" => {
					s.zoom_step(true);
					None
				}
				"-" | "_" => {
					s.zoom_step(false);
					None
				}
				"0" => {
					s.reset_view();
					None
				}
				"l" => {
					s.arm_link(|child| LinkMode::ParentOf { child });
					None
				}
				"k" => {
					s.arm_link(|parent| LinkMode::ChildOf { parent });
					None
				}
				"n" => prompt("New branch name", "").and_then(|name| s.create_branch(&name).ok()),
				"r" => {
					let current = s.selected_branch().unwrap_or_default();
					prompt("Rename branch", &current).and_then(|name| s.rename_selected(&name).ok())
				}
				"Delete" | "Backspace" => s.delete_selected().ok(),
				_ => return,
			}
		};
		ev.prevent_default();
		debug!("key {key}");
		if let Some(batch) = batch {
			spawn_flush(state_kd.clone(), store_kd.clone(), batch);
		}
	};

	let state_zi = state.clone();
	let on_zoom_in = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_zi.borrow_mut() {
			s.zoom_step(true);
		}
	};
	let state_zo = state.clone();
	let on_zoom_out = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_zo.borrow_mut() {
			s.zoom_step(false);
		}
	};
	let state_rv = state.clone();
	let on_reset = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_rv.borrow_mut() {
			s.reset_view();
		}
	};

	view! {
		<div class="mindmap" style="position: relative;">
			<canvas
				node_ref=canvas_ref
				class="mindmap-canvas"
				tabindex="0"
				on:pointerdown=on_pointerdown
				on:pointermove=on_pointermove
				on:pointerup=on_pointerup
				on:pointercancel=on_pointercancel
				on:pointerleave=on_pointerleave
				on:wheel=on_wheel
				on:dblclick=on_dblclick
				on:keydown=on_keydown
				style="display: block; cursor: grab; touch-action: none; outline: none;"
			/>
			<div class="mindmap-controls">
				<button on:click=on_zoom_in title="Zoom in">"+"</button>
				<button on:click=on_zoom_out title="Zoom out">"−"</button>
				<button on:click=on_reset title="Reset view">"⟲"</button>
			</div>
		</div>
	}
}

/// Asks the user for a line of text. `None` if dismissed or blank.
fn prompt(message: &str, default: &str) -> Option<String> {
	let window = web_sys::window()?;
	let answer = window
		.prompt_with_message_and_default(message, default)
		.ok()
		.flatten()?;
	let answer = answer.trim();
	(!answer.is_empty()).then(|| answer.to_string())
}
