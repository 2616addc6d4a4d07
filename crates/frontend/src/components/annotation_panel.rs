use dioxus::prelude::*;
use serde_json::Value;

use crate::api;
use crate::browser::copy_to_clipboard;
use crate::components::map_view::MapTool;
use crate::hooks::{use_annotation_revision, use_app_state};

fn set_title(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        "Annotations".to_string()
    } else {
        title.to_string()
    }
}

/// Pasted text accepted for import: a GeoJSON FeatureCollection.
fn parse_collection(text: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    (value.get("type").and_then(Value::as_str) == Some("FeatureCollection")).then_some(value)
}

#[component]
pub fn AnnotationPanel(mut tool: Signal<MapTool>) -> Element {
    let state = use_app_state();
    // Re-render on every layer change.
    let _revision = use_annotation_revision(&state);
    let mut title = use_signal(String::new);
    let mut load_id = use_signal(String::new);
    let mut paste = use_signal(String::new);
    let mut busy = use_signal(|| false);

    let editor = state.annotations.clone();
    let summaries = editor.summaries();
    let selected = editor.selected_id();
    let can_undo = editor.can_undo();
    let can_redo = editor.can_redo();
    let has_features = !summaries.is_empty();
    let set_id = editor.set_id();
    let annotating = *tool.read() == MapTool::Annotate;

    let ed_undo = editor.clone();
    let ed_redo = editor.clone();
    let ed_clear = editor.clone();
    let ed_export = editor.clone();
    let st_save = state.clone();
    let st_load = state.clone();
    let st_import = state.clone();

    rsx! {
        div { class: "panel annotation-panel",
            h3 { "Annotations" }
            div { class: "row",
                button {
                    class: if annotating { "active" } else { "" },
                    onclick: move |_| {
                        let next = if annotating { MapTool::Browse } else { MapTool::Annotate };
                        tool.set(next);
                    },
                    if annotating { "Done placing" } else { "Place markers" }
                }
                button {
                    class: "secondary",
                    disabled: !can_undo,
                    onclick: move |_| { ed_undo.undo(); },
                    "Undo"
                }
                button {
                    class: "secondary",
                    disabled: !can_redo,
                    onclick: move |_| { ed_redo.redo(); },
                    "Redo"
                }
            }
            if annotating {
                p { class: "hint", "Click the map to drop a marker. Right-click a marker to remove it." }
            }

            ul { class: "annotation-list",
                for item in summaries {
                    li {
                        key: "{item.id}",
                        class: if selected.as_deref() == Some(item.id.as_str()) { "selected" } else { "" },
                        span {
                            class: "swatch",
                            style: "background: {item.color};",
                            onclick: {
                                let editor = editor.clone();
                                let id = item.id.clone();
                                move |_| editor.select(Some(&id))
                            },
                        }
                        input {
                            r#type: "text",
                            value: "{item.label}",
                            onchange: {
                                let editor = editor.clone();
                                let id = item.id.clone();
                                move |evt: Event<FormData>| { editor.set_label(&id, &evt.value()); }
                            },
                        }
                        span { class: "kind", "{item.kind}" }
                        if item.kind == "Point" {
                            button {
                                class: "icon",
                                title: "Move to map center",
                                onclick: {
                                    let editor = editor.clone();
                                    let camera = state.camera.clone();
                                    let id = item.id.clone();
                                    move |_| {
                                        let cam = camera.get();
                                        editor.move_point(&id, [cam.longitude, cam.latitude]);
                                    }
                                },
                                "⌖"
                            }
                        }
                        button {
                            class: "icon",
                            title: if item.hidden { "Show" } else { "Hide" },
                            onclick: {
                                let editor = editor.clone();
                                let id = item.id.clone();
                                move |_| { editor.toggle_hidden(&id); }
                            },
                            if item.hidden { "◌" } else { "●" }
                        }
                        button {
                            class: "icon danger",
                            title: "Remove",
                            onclick: {
                                let editor = editor.clone();
                                let id = item.id.clone();
                                move |_| { editor.remove(&id); }
                            },
                            "✕"
                        }
                    }
                }
            }

            if has_features {
                div { class: "row",
                    button {
                        class: "secondary",
                        onclick: move |_| copy_to_clipboard(ed_export.feature_collection().to_string()),
                        "Copy GeoJSON"
                    }
                    button {
                        class: "secondary danger",
                        onclick: move |_| { ed_clear.clear(); },
                        "Clear all"
                    }
                }
            }

            div { class: "row",
                input {
                    r#type: "text",
                    placeholder: "Set title...",
                    value: "{title}",
                    oninput: move |evt: Event<FormData>| title.set(evt.value()),
                }
                button {
                    disabled: *busy.read() || !has_features,
                    onclick: move |_| {
                        let state = st_save.clone();
                        let name = set_title(&title.read());
                        let map_id = state.camera.get().active_overlay_id;
                        let variables = api::build_annotation_set_variables(
                            state.annotations.set_id().as_deref(),
                            &name,
                            map_id.as_deref(),
                            &state.user_id,
                            &state.annotations.layer(),
                        );
                        busy.set(true);
                        spawn(async move {
                            match api::save_annotation_set(variables).await {
                                Ok(saved) => {
                                    tracing::info!("saved annotation set {}", saved.id);
                                    state.notices.add_success(format!("Saved \"{}\"", saved.title));
                                    state.annotations.remember_set_id(saved.id);
                                }
                                Err(e) => {
                                    tracing::warn!("saving annotations failed: {e}");
                                    state.notices.add_error("Could not save annotations");
                                }
                            }
                            busy.set(false);
                        });
                    },
                    "Save"
                }
            }
            if let Some(id) = set_id {
                p { class: "set-id", "Set id: {id}" }
            }

            div { class: "row",
                input {
                    r#type: "text",
                    placeholder: "Load set by id...",
                    value: "{load_id}",
                    oninput: move |evt: Event<FormData>| load_id.set(evt.value()),
                }
                button {
                    class: "secondary",
                    disabled: *busy.read() || load_id.read().trim().is_empty(),
                    onclick: move |_| {
                        let state = st_load.clone();
                        let id = load_id.read().trim().to_string();
                        busy.set(true);
                        spawn(async move {
                            match api::fetch_annotation_set(&id).await {
                                Ok(Some(set)) => {
                                    state.annotations.load(&set);
                                    title.set(set.title.clone());
                                    load_id.set(String::new());
                                }
                                Ok(None) => {
                                    state.notices.add_warning(format!("No annotation set {id}"));
                                }
                                Err(e) => {
                                    tracing::warn!("loading annotations failed: {e}");
                                    state.notices.add_error("Could not load annotations");
                                }
                            }
                            busy.set(false);
                        });
                    },
                    "Load"
                }
            }

            textarea {
                placeholder: "Paste a GeoJSON FeatureCollection...",
                value: "{paste}",
                oninput: move |evt: Event<FormData>| paste.set(evt.value()),
            }
            button {
                class: "secondary",
                disabled: paste.read().trim().is_empty(),
                onclick: move |_| {
                    let parsed = parse_collection(&paste.read());
                    match parsed {
                        Some(collection) => {
                            if st_import.annotations.import(&collection) {
                                paste.set(String::new());
                            } else {
                                st_import.notices.add_warning("No usable features in that GeoJSON");
                            }
                        }
                        None => {
                            st_import.notices.add_warning("That is not a GeoJSON FeatureCollection");
                        }
                    }
                },
                "Import"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_title_falls_back() {
        assert_eq!(set_title("  "), "Annotations");
        assert_eq!(set_title(" Landmarks "), "Landmarks");
    }

    #[test]
    fn test_parse_collection_requires_feature_collection() {
        assert!(parse_collection(r#" {"type":"FeatureCollection","features":[]} "#).is_some());
        assert!(parse_collection(r#"{"type":"Feature"}"#).is_none());
        assert!(parse_collection("not json").is_none());
    }
}
