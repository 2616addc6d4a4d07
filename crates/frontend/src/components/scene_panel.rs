use dioxus::prelude::*;
use vma_shared::scenes::{clamp_story_delay, Direction};

use crate::hooks::{use_app_state, use_scene_deck};

fn scene_class(active: bool, hidden: bool) -> &'static str {
    match (active, hidden) {
        (true, _) => "scene active",
        (false, true) => "scene hidden",
        _ => "scene",
    }
}

#[component]
pub fn ScenePanel(on_navigate: EventHandler<()>) -> Element {
    let state = use_app_state();
    let deck = use_scene_deck(&state);
    let mut title = use_signal(String::new);

    let snapshot = deck.read().clone();
    let active = snapshot.active_scene_index;
    let count = snapshot.scenes.len();
    let presenting = snapshot.presenting;
    let autoplay = snapshot.autoplay;
    let autoplay_label = if autoplay { "Pause" } else { "Autoplay" };

    let st_capture = state.clone();
    let st_prev = state.clone();
    let st_next = state.clone();
    let st_auto = state.clone();
    let st_present = state.clone();

    rsx! {
        div { class: "panel scene-panel",
            h3 { "Scenes" }
            div { class: "row",
                input {
                    r#type: "text",
                    placeholder: "Scene title...",
                    value: "{title}",
                    oninput: move |evt: Event<FormData>| title.set(evt.value()),
                }
                button {
                    onclick: move |_| {
                        let name = title.read().trim().to_string();
                        let name = if name.is_empty() { format!("Scene {}", count + 1) } else { name };
                        st_capture.capture_scene(&name);
                        title.set(String::new());
                    },
                    "Capture view"
                }
            }

            if count > 0 {
                div { class: "row scene-nav",
                    button {
                        class: "secondary",
                        onclick: move |_| {
                            st_prev.step_scene(Direction::Backward);
                            on_navigate.call(());
                        },
                        "◀"
                    }
                    button {
                        class: if autoplay { "active" } else { "" },
                        onclick: move |_| st_auto.toggle_autoplay(),
                        "{autoplay_label}"
                    }
                    button {
                        class: "secondary",
                        onclick: move |_| {
                            st_next.step_scene(Direction::Forward);
                            on_navigate.call(());
                        },
                        "▶"
                    }
                    button {
                        class: "secondary",
                        onclick: move |_| st_present.set_presenting(!presenting),
                        if presenting { "Exit" } else { "Present" }
                    }
                }
            }

            ol { class: "scene-list",
                for (i, scene) in snapshot.scenes.iter().cloned().enumerate() {
                    li {
                        key: "{scene.id}",
                        class: scene_class(i == active, scene.hidden),
                        span {
                            class: "scene-title",
                            onclick: {
                                let state = state.clone();
                                move |_| {
                                    state.show_scene(i);
                                    on_navigate.call(());
                                }
                            },
                            "{scene.title}"
                        }
                        input {
                            r#type: "number",
                            class: "delay",
                            title: "Seconds before autoplay advances",
                            min: "1",
                            max: "60",
                            value: "{scene.delay}",
                            onchange: {
                                let state = state.clone();
                                let scene = scene.clone();
                                move |evt: Event<FormData>| {
                                    if let Ok(delay) = evt.value().parse::<f64>() {
                                        let mut updated = scene.clone();
                                        updated.delay = clamp_story_delay(delay);
                                        state.scenes.update_scene(i, updated);
                                    }
                                }
                            },
                        }
                        button {
                            class: "icon",
                            title: "Move up",
                            disabled: i == 0,
                            onclick: {
                                let scenes = state.scenes.clone();
                                move |_| scenes.move_scene(i, i.saturating_sub(1))
                            },
                            "↑"
                        }
                        button {
                            class: "icon",
                            title: if scene.hidden { "Show in presentation" } else { "Hide from presentation" },
                            onclick: {
                                let scenes = state.scenes.clone();
                                move |_| scenes.toggle_visibility(i)
                            },
                            if scene.hidden { "◌" } else { "●" }
                        }
                        button {
                            class: "icon",
                            title: "Duplicate",
                            onclick: {
                                let scenes = state.scenes.clone();
                                move |_| scenes.duplicate_scene(i)
                            },
                            "⧉"
                        }
                        button {
                            class: "icon danger",
                            title: "Delete",
                            onclick: {
                                let scenes = state.scenes.clone();
                                move |_| scenes.remove_scene(i)
                            },
                            "✕"
                        }
                    }
                }
            }
        }
    }
}
