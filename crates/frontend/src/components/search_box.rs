use dioxus::prelude::*;
use gloo_timers::future::TimeoutFuture;
use vma_shared::map_state::CameraPatch;
use vma_shared::search::{SearchResult, SearchSession, SearchStart, SEARCH_DEBOUNCE_MS};

use crate::api;
use crate::hooks::{use_app_state, use_search};

/// Camera move that frames a search hit.
fn result_patch(result: &SearchResult) -> Option<CameraPatch> {
    let [longitude, latitude] = result.lon_lat()?;
    Some(CameraPatch {
        zoom: Some(result.zoom_hint()),
        ..CameraPatch::center(longitude, latitude)
    })
}

/// Start a lookup. Typing waits out the debounce; submitting does not.
fn lookup(search: SearchSession, query: &str, debounce: bool) {
    let SearchStart::Pending(pending) = search.begin(query) else {
        return;
    };
    spawn(async move {
        if debounce {
            TimeoutFuture::new(SEARCH_DEBOUNCE_MS).await;
            if !search.is_current(&pending) {
                return;
            }
        }
        let result = api::search_places(&pending.query).await;
        if let Err(e) = &result {
            tracing::warn!(query = %pending.query, "place search failed: {e}");
        }
        search.finish(pending, result);
    });
}

#[component]
pub fn SearchBox(on_navigate: EventHandler<()>) -> Element {
    let state = use_app_state();
    let search_state = use_search(&state);
    let current = search_state.read().clone();

    let search_input = state.search.clone();
    let search_submit = state.search.clone();
    let search_clear = state.search.clone();
    let submit_query = current.query.clone();

    rsx! {
        div { class: "panel search-box",
            form {
                class: "row",
                onsubmit: move |evt: Event<FormData>| {
                    evt.prevent_default();
                    lookup(search_submit.clone(), &submit_query, false);
                },
                input {
                    r#type: "search",
                    placeholder: "Search places...",
                    "aria-label": "Search places",
                    value: "{current.query}",
                    oninput: move |evt: Event<FormData>| lookup(search_input.clone(), &evt.value(), true),
                }
                if !current.query.is_empty() {
                    button {
                        r#type: "button",
                        class: "icon",
                        title: "Clear search",
                        onclick: move |_| search_clear.clear(),
                        "✕"
                    }
                }
            }
            if current.loading {
                p { class: "hint", "Searching..." }
            }
            if let Some(error) = current.error.clone() {
                p { class: "error", "Search failed: {error}" }
            }
            if !current.loading && current.error.is_none() && !current.query.trim().is_empty() && current.results.is_empty() {
                p { class: "hint", "No places found" }
            }
            ul { class: "search-results",
                for result in current.results.clone() {
                    li {
                        key: "{result.place_id}",
                        onclick: {
                            let camera = state.camera.clone();
                            let search = state.search.clone();
                            let result = result.clone();
                            move |_| {
                                if let Some(patch) = result_patch(&result) {
                                    camera.set_view(patch);
                                    search.clear();
                                    on_navigate.call(());
                                }
                            }
                        },
                        span { class: "name", "{result.display_name}" }
                        if !result.kind.is_empty() {
                            span { class: "kind", "{result.kind}" }
                        }
                    }
                }
            }
        }
    }
}
