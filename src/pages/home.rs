use std::rc::Rc;

use leptos::prelude::*;

use crate::components::mindmap::{MemoryStore, MindmapCanvas, MindmapData, MindmapStore};

const SAMPLE: &str = include_str!("sample_mindmap.json");

/// Bundled demo mindmap. Falls back to an empty map if it fails to parse.
fn sample_data() -> MindmapData {
	serde_json::from_str(SAMPLE).unwrap_or_else(|e| {
		log::warn!("sample mindmap unreadable: {e}");
		MindmapData {
			root_label: "Mindmap".into(),
			..MindmapData::default()
		}
	})
}

/// Demo persistence: writes land in memory only.
fn demo_store() -> Rc<dyn MindmapStore> {
	Rc::new(MemoryStore::default())
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let data = Signal::derive(sample_data);

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<MindmapCanvas data=data store=demo_store() fullscreen=true />
				<div class="graph-overlay">
					<h1>"Mindmap"</h1>
					<p class="subtitle">
						"Drag ideas between branches. Scroll to pan, ctrl+scroll to zoom. Double-click a branch to collapse it."
					</p>
					<p class="subtitle">
						"Select a node, then press l (pick its parent) or k (pick a child). n new branch, r rename, Delete removes."
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
