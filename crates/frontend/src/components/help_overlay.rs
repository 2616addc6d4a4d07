use dioxus::prelude::*;

/// Viewer-wide keyboard actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    NextScene,
    PreviousScene,
    ToggleAutoplay,
    Undo,
    Redo,
    /// Leave presentation, drop the active map tool, close help.
    Escape,
    ToggleHelp,
    ResetView,
}

pub fn shortcut_for(key: &Key, ctrl: bool, shift: bool) -> Option<Shortcut> {
    match key {
        Key::ArrowRight | Key::PageDown => Some(Shortcut::NextScene),
        Key::ArrowLeft | Key::PageUp => Some(Shortcut::PreviousScene),
        Key::Escape => Some(Shortcut::Escape),
        Key::Character(c) => match (c.to_lowercase().as_str(), ctrl) {
            ("z", true) if shift => Some(Shortcut::Redo),
            ("z", true) => Some(Shortcut::Undo),
            ("y", true) => Some(Shortcut::Redo),
            (" ", false) => Some(Shortcut::ToggleAutoplay),
            ("h" | "?", false) => Some(Shortcut::ToggleHelp),
            ("r", false) => Some(Shortcut::ResetView),
            _ => None,
        },
        _ => None,
    }
}

#[component]
pub fn HelpOverlay(mut show: Signal<bool>) -> Element {
    if !*show.read() {
        return rsx! {};
    }

    rsx! {
        div {
            class: "help-overlay-backdrop",
            onclick: move |_| show.set(false),

            div {
                class: "help-overlay",
                onclick: move |evt: Event<MouseData>| evt.stop_propagation(),

                h2 { "Help" }

                div { class: "shortcut-section",
                    h3 { "Scenes" }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "→" } " / " kbd { "PgDn" } }
                        span { "Next visible scene" }
                    }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "←" } " / " kbd { "PgUp" } }
                        span { "Previous visible scene" }
                    }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "Space" } }
                        span { "Start or pause autoplay" }
                    }
                }

                div { class: "shortcut-section",
                    h3 { "Annotations" }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "Ctrl" } "+" kbd { "Z" } }
                        span { "Undo" }
                    }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "Ctrl" } "+" kbd { "Shift" } "+" kbd { "Z" } " / " kbd { "Ctrl" } "+" kbd { "Y" } }
                        span { "Redo" }
                    }
                }

                div { class: "shortcut-section",
                    h3 { "View" }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "R" } }
                        span { "Reset view mode, split and lens" }
                    }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "Esc" } }
                        span { "Exit presentation / stop placing / close help" }
                    }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "H" } " / " kbd { "?" } }
                        span { "Toggle this help" }
                    }
                }

                div { class: "help-divider" }

                h2 { class: "help-section-title", "Using the Archive" }

                div { class: "help-info-section",
                    h3 { "Comparing maps" }
                    p { "Pick a historical map, then choose how it sits over today's basemap. Split modes have a draggable divider and the spy lens follows its handle. The address bar always holds the current view, so copying it shares exactly what you see." }
                }

                div { class: "help-info-section",
                    h3 { "Stories and hunts" }
                    p { "A story is an ordered list of stops. Play it as a hunt to walk between them. Most stops complete once you are inside their radius. Some ask for the code posted on site or for a photo instead. Progress is kept on this device and synced when the server is reachable." }
                }

                div { class: "help-info-section",
                    h3 { "Map interactions" }
                    p { "Drag to pan, scroll or pinch to zoom, double-click to zoom in. While placing, a click drops a marker or story stop and a right-click removes the nearest marker." }
                }

                button {
                    class: "close-help",
                    onclick: move |_| show.set(false),
                    "Close"
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(c: &str) -> Key {
        Key::Character(c.to_string())
    }

    #[test]
    fn test_scene_navigation_keys() {
        assert_eq!(shortcut_for(&Key::ArrowRight, false, false), Some(Shortcut::NextScene));
        assert_eq!(shortcut_for(&Key::PageUp, false, false), Some(Shortcut::PreviousScene));
        assert_eq!(shortcut_for(&ch(" "), false, false), Some(Shortcut::ToggleAutoplay));
    }

    #[test]
    fn test_undo_redo_need_ctrl() {
        assert_eq!(shortcut_for(&ch("z"), true, false), Some(Shortcut::Undo));
        assert_eq!(shortcut_for(&ch("Z"), true, true), Some(Shortcut::Redo));
        assert_eq!(shortcut_for(&ch("y"), true, false), Some(Shortcut::Redo));
        assert_eq!(shortcut_for(&ch("z"), false, false), None);
    }

    #[test]
    fn test_plain_letters() {
        assert_eq!(shortcut_for(&ch("H"), false, false), Some(Shortcut::ToggleHelp));
        assert_eq!(shortcut_for(&ch("?"), false, true), Some(Shortcut::ToggleHelp));
        assert_eq!(shortcut_for(&ch("r"), false, false), Some(Shortcut::ResetView));
        assert_eq!(shortcut_for(&ch("r"), true, false), None);
        assert_eq!(shortcut_for(&Key::Escape, false, false), Some(Shortcut::Escape));
    }
}
