use dioxus::prelude::*;
use vma_shared::map_state::CameraPatch;
use vma_shared::models::{Interaction, Region, StoryMode, StoryPoint};
use vma_shared::story::{PointUpdate, StoryUpdate};

use crate::api;
use crate::browser::{copy_to_clipboard, current_origin};
use crate::components::map_view::MapTool;
use crate::hooks::{use_app_state, use_library};

const INTERACTIONS: [(Interaction, &str, &str); 3] = [
    (Interaction::Proximity, "proximity", "Walk up"),
    (Interaction::Qr, "qr", "Scan code"),
    (Interaction::Camera, "camera", "Photo"),
];

fn interaction_key(interaction: Interaction) -> &'static str {
    INTERACTIONS
        .iter()
        .find(|(i, _, _)| *i == interaction)
        .map_or("proximity", |(_, key, _)| key)
}

fn interaction_from_key(key: &str) -> Interaction {
    INTERACTIONS
        .iter()
        .find(|(_, k, _)| *k == key)
        .map_or(Interaction::Proximity, |(i, _, _)| *i)
}

/// Trigger radius in meters from a text field.
fn parse_radius(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite() && *r > 0.0)
}

fn optional_text(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn point_label(point: &StoryPoint) -> String {
    if point.title.trim().is_empty() {
        format!("Stop {}", point.order + 1)
    } else {
        point.title.clone()
    }
}

#[component]
pub fn StoryPanel(mut story_id: Signal<Option<String>>, mut tool: Signal<MapTool>) -> Element {
    let state = use_app_state();
    let library = use_library(&state);
    let mut new_title = use_signal(String::new);
    let mut share_url = use_signal(|| None::<String>);

    let stories = library.read().stories.clone();
    let selected_id = story_id.read().clone();
    let selected = selected_id
        .as_deref()
        .and_then(|id| stories.iter().find(|s| s.id == id).cloned());
    let placing = *tool.read() == MapTool::StoryPoint;

    let st_create = state.clone();

    let editor = selected.map(|story| {
        let sid = story.id.clone();
        let is_adventure = story.mode == StoryMode::Adventure;
        let st_title = state.clone();
        let st_desc = state.clone();
        let st_mode = state.clone();
        let st_public = state.clone();
        let st_region = state.clone();
        let st_center = state.clone();
        let st_delete = state.clone();
        let (id_title, id_desc, id_mode, id_public, id_region, id_center, id_delete, id_share, id_hunt) = (
            sid.clone(),
            sid.clone(),
            sid.clone(),
            sid.clone(),
            sid.clone(),
            sid.clone(),
            sid.clone(),
            sid.clone(),
            sid.clone(),
        );
        let points = story.points.clone();
        let point_count = points.len();

        rsx! {
            div { class: "story-editor",
                input {
                    r#type: "text",
                    value: "{story.title}",
                    onchange: move |evt: Event<FormData>| {
                        st_title.library.update_story(&id_title, StoryUpdate {
                            title: Some(evt.value()),
                            ..Default::default()
                        });
                    },
                }
                textarea {
                    placeholder: "Description...",
                    value: "{story.description}",
                    onchange: move |evt: Event<FormData>| {
                        st_desc.library.update_story(&id_desc, StoryUpdate {
                            description: Some(evt.value()),
                            ..Default::default()
                        });
                    },
                }
                div { class: "row",
                    select {
                        "aria-label": "Story mode",
                        onchange: move |evt: Event<FormData>| {
                            let mode = if evt.value() == "adventure" { StoryMode::Adventure } else { StoryMode::Guided };
                            st_mode.library.update_story(&id_mode, StoryUpdate {
                                mode: Some(mode),
                                ..Default::default()
                            });
                        },
                        option { value: "guided", selected: !is_adventure, "Guided" }
                        option { value: "adventure", selected: is_adventure, "Adventure" }
                    }
                    label {
                        input {
                            r#type: "checkbox",
                            checked: story.is_public,
                            onchange: move |evt: Event<FormData>| {
                                st_public.library.update_story(&id_public, StoryUpdate {
                                    is_public: Some(evt.checked()),
                                    ..Default::default()
                                });
                            },
                        }
                        "Public"
                    }
                }
                div { class: "row",
                    button {
                        class: "secondary",
                        title: "Use the current view as the story's starting region",
                        onclick: move |_| {
                            let cam = st_region.camera.get();
                            st_region.library.update_story(&id_region, StoryUpdate {
                                region: Some(Some(Region {
                                    center: [cam.longitude, cam.latitude],
                                    zoom: cam.zoom,
                                })),
                                ..Default::default()
                            });
                        },
                        "Set region"
                    }
                    button {
                        class: if placing { "active" } else { "" },
                        onclick: move |_| {
                            let next = if placing { MapTool::Browse } else { MapTool::StoryPoint };
                            tool.set(next);
                        },
                        if placing { "Done placing" } else { "Place stops" }
                    }
                    button {
                        class: "secondary",
                        onclick: move |_| {
                            let cam = st_center.camera.get();
                            st_center.library.add_point(&id_center, [cam.longitude, cam.latitude]);
                        },
                        "Add at center"
                    }
                }

                ol { class: "point-list",
                    for (i, point) in points.into_iter().enumerate() {
                        li { key: "{point.id}",
                            div { class: "row",
                                input {
                                    r#type: "text",
                                    placeholder: point_label(&point),
                                    value: "{point.title}",
                                    onchange: {
                                        let library = state.library.clone();
                                        let (sid, pid) = (sid.clone(), point.id.clone());
                                        move |evt: Event<FormData>| {
                                            library.update_point(&sid, &pid, PointUpdate {
                                                title: Some(evt.value()),
                                                ..Default::default()
                                            });
                                        }
                                    },
                                }
                                button {
                                    class: "icon",
                                    title: "Fly to",
                                    onclick: {
                                        let camera = state.camera.clone();
                                        let [lon, lat] = point.coordinates;
                                        move |_| camera.set_view(CameraPatch::center(lon, lat))
                                    },
                                    "⌖"
                                }
                                button {
                                    class: "icon",
                                    title: "Move up",
                                    disabled: i == 0,
                                    onclick: {
                                        let library = state.library.clone();
                                        let sid = sid.clone();
                                        move |_| { library.reorder_points(&sid, i, i.saturating_sub(1)); }
                                    },
                                    "↑"
                                }
                                button {
                                    class: "icon danger",
                                    title: "Remove stop",
                                    onclick: {
                                        let library = state.library.clone();
                                        let (sid, pid) = (sid.clone(), point.id.clone());
                                        move |_| { library.remove_point(&sid, &pid); }
                                    },
                                    "✕"
                                }
                            }
                            div { class: "row",
                                select {
                                    "aria-label": "How this stop is completed",
                                    onchange: {
                                        let library = state.library.clone();
                                        let (sid, pid) = (sid.clone(), point.id.clone());
                                        move |evt: Event<FormData>| {
                                            library.update_point(&sid, &pid, PointUpdate {
                                                interaction: Some(interaction_from_key(&evt.value())),
                                                ..Default::default()
                                            });
                                        }
                                    },
                                    for (interaction, key, label) in INTERACTIONS {
                                        option {
                                            value: key,
                                            selected: interaction_key(point.interaction) == key,
                                            "{label}"
                                        }
                                    }
                                }
                                input {
                                    r#type: "number",
                                    class: "radius",
                                    title: "Trigger radius (m)",
                                    min: "1",
                                    value: "{point.trigger_radius}",
                                    onchange: {
                                        let library = state.library.clone();
                                        let (sid, pid) = (sid.clone(), point.id.clone());
                                        move |evt: Event<FormData>| {
                                            if let Some(radius) = parse_radius(&evt.value()) {
                                                library.update_point(&sid, &pid, PointUpdate {
                                                    trigger_radius: Some(radius),
                                                    ..Default::default()
                                                });
                                            }
                                        }
                                    },
                                }
                                if point.interaction == Interaction::Qr {
                                    input {
                                        r#type: "text",
                                        placeholder: "Code text...",
                                        value: point.qr_payload.clone().unwrap_or_default(),
                                        onchange: {
                                            let library = state.library.clone();
                                            let (sid, pid) = (sid.clone(), point.id.clone());
                                            move |evt: Event<FormData>| {
                                                library.update_point(&sid, &pid, PointUpdate {
                                                    qr_payload: Some(optional_text(&evt.value())),
                                                    ..Default::default()
                                                });
                                            }
                                        },
                                    }
                                }
                            }
                        }
                    }
                }
                if point_count == 0 {
                    p { class: "hint", "No stops yet. Place them on the map or add one at the center." }
                }

                div { class: "row",
                    button {
                        class: "secondary",
                        onclick: move |_| {
                            let origin = current_origin().unwrap_or_default();
                            let url = api::build_story_url(&origin, &id_share, false);
                            copy_to_clipboard(url.clone());
                            share_url.set(Some(url));
                        },
                        "Share story"
                    }
                    button {
                        class: "secondary",
                        onclick: move |_| {
                            let origin = current_origin().unwrap_or_default();
                            let url = api::build_story_url(&origin, &id_hunt, true);
                            copy_to_clipboard(url.clone());
                            share_url.set(Some(url));
                        },
                        "Share hunt"
                    }
                    button {
                        class: "secondary danger",
                        onclick: move |_| {
                            if st_delete.library.delete_story(&id_delete) {
                                story_id.set(None);
                                share_url.set(None);
                            }
                        },
                        "Delete"
                    }
                }
                if let Some(url) = share_url.read().clone() {
                    div { class: "plan-url",
                        input { r#type: "text", readonly: true, value: "{url}" }
                        span { class: "hint", "Copied" }
                    }
                }
            }
        }
    });

    rsx! {
        div { class: "panel story-panel",
            h3 { "Stories" }
            div { class: "row",
                input {
                    r#type: "text",
                    placeholder: "New story title...",
                    value: "{new_title}",
                    oninput: move |evt: Event<FormData>| new_title.set(evt.value()),
                }
                button {
                    onclick: move |_| {
                        let id = st_create.library.create_story(&new_title.read(), "");
                        new_title.set(String::new());
                        share_url.set(None);
                        story_id.set(Some(id));
                    },
                    "Create"
                }
            }
            select {
                "aria-label": "Select story",
                onchange: move |evt: Event<FormData>| {
                    share_url.set(None);
                    story_id.set(optional_text(&evt.value()));
                },
                option { value: "", selected: selected_id.is_none(), "-- Choose a story --" }
                for story in stories.iter() {
                    option {
                        key: "{story.id}",
                        value: "{story.id}",
                        selected: selected_id.as_deref() == Some(story.id.as_str()),
                        "{story.title}"
                    }
                }
            }
            {editor}
        }
    }
}
