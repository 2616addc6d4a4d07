use dioxus::prelude::*;
use vma_shared::models::{ViewMode, LENS_RADIUS_MIN};

use crate::hooks::{use_app_state, use_layers};

/// Selectable basemaps as `(key, label)`.
pub const BASEMAPS: [(&str, &str); 4] = [
    ("g-streets", "Google Streets"),
    ("g-satellite", "Google Satellite"),
    ("esri-imagery", "ESRI World Imagery"),
    ("hcmc-planning", "HCMC Planning"),
];

fn parse_slider(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[component]
pub fn ViewModeControls() -> Element {
    let state = use_app_state();
    let layers = use_layers(&state);
    let prefs = layers.read().clone();
    let mode = prefs.view.mode;
    let opacity_pct = (prefs.view.opacity * 100.0).round();
    let ratio_pct = (prefs.view.side_ratio * 100.0).round();
    let lens_label = format!("{:.0}", prefs.view.lens_radius);
    let max_lens = state
        .layers
        .viewport()
        .map(|(w, h)| vma_shared::clip::max_lens_radius(w, h).max(LENS_RADIUS_MIN))
        .unwrap_or(400.0);

    let st_basemap = state.clone();
    let st_visible = state.clone();
    let st_opacity = state.clone();
    let st_ratio = state.clone();
    let st_lens = state.clone();
    let st_reset = state.clone();

    rsx! {
        div { class: "panel view-controls",
            h3 { "View" }
            div { class: "mode-buttons",
                for m in ViewMode::ALL {
                    button {
                        key: "{m}",
                        class: if m == mode { "active" } else { "" },
                        onclick: {
                            let layers = state.layers.clone();
                            move |_| layers.set_mode(m)
                        },
                        "{m}"
                    }
                }
            }

            label { class: "row",
                "Basemap"
                select {
                    "aria-label": "Select basemap",
                    value: "{prefs.basemap}",
                    onchange: move |evt: Event<FormData>| st_basemap.layers.set_basemap(evt.value()),
                    for (key, label) in BASEMAPS {
                        option { value: "{key}", selected: prefs.basemap == key, "{label}" }
                    }
                }
            }

            label { class: "row",
                input {
                    r#type: "checkbox",
                    checked: prefs.overlay_visible,
                    onchange: move |evt: Event<FormData>| st_visible.layers.set_overlay_visible(evt.checked()),
                }
                "Show historical map"
            }

            label { class: "row",
                "Opacity {opacity_pct}%"
                input {
                    r#type: "range",
                    min: "0",
                    max: "100",
                    value: "{opacity_pct}",
                    oninput: move |evt: Event<FormData>| {
                        if let Some(v) = parse_slider(&evt.value()) {
                            st_opacity.layers.set_opacity(v / 100.0);
                        }
                    },
                }
            }

            if matches!(mode, ViewMode::SideX | ViewMode::SideY) {
                label { class: "row",
                    "Split {ratio_pct}%"
                    input {
                        r#type: "range",
                        min: "1",
                        max: "99",
                        value: "{ratio_pct}",
                        oninput: move |evt: Event<FormData>| {
                            if let Some(v) = parse_slider(&evt.value()) {
                                st_ratio.layers.set_side_ratio(v / 100.0);
                            }
                        },
                    }
                }
            }

            if mode == ViewMode::Spy {
                label { class: "row",
                    "Lens {lens_label}px"
                    input {
                        r#type: "range",
                        min: "{LENS_RADIUS_MIN}",
                        max: "{max_lens}",
                        value: "{prefs.view.lens_radius}",
                        oninput: move |evt: Event<FormData>| {
                            if let Some(v) = parse_slider(&evt.value()) {
                                st_lens.layers.set_lens_radius(v);
                            }
                        },
                    }
                }
            }

            button {
                class: "secondary",
                onclick: move |_| st_reset.layers.reset_view(),
                "Reset view"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vma_shared::models::DEFAULT_BASEMAP;

    #[test]
    fn test_default_basemap_is_listed_first() {
        assert_eq!(BASEMAPS[0].0, DEFAULT_BASEMAP);
    }

    #[test]
    fn test_parse_slider() {
        assert_eq!(parse_slider("42"), Some(42.0));
        assert_eq!(parse_slider("12.5"), Some(12.5));
        assert_eq!(parse_slider("NaN"), None);
        assert_eq!(parse_slider(""), None);
    }
}
