use dioxus::prelude::*;
use vma_shared::map_state::CameraPatch;
use vma_shared::models::{LonLat, MapEntry};

use crate::api;
use crate::hooks::{use_app_state, use_camera};

/// Center of `[minLon, minLat, maxLon, maxLat]`.
pub fn bounds_center(bounds: [f64; 4]) -> LonLat {
    [(bounds[0] + bounds[2]) / 2.0, (bounds[1] + bounds[3]) / 2.0]
}

pub fn bounds_contain(bounds: [f64; 4], p: LonLat) -> bool {
    p[0] >= bounds[0] && p[0] <= bounds[2] && p[1] >= bounds[1] && p[1] <= bounds[3]
}

fn option_label(entry: &MapEntry) -> String {
    match entry.year {
        Some(year) => format!("{} ({year})", entry.name),
        None => entry.name.clone(),
    }
}

#[component]
pub fn MapSelector(
    maps: Vec<MapEntry>,
    favorites: Signal<Vec<String>>,
    on_change: EventHandler<()>,
) -> Element {
    let state = use_app_state();
    let camera = use_camera(&state);
    let active = camera.read().active_overlay_id.clone().unwrap_or_default();

    let options = |featured: bool| -> Vec<(String, String)> {
        maps.iter()
            .filter(|m| m.is_featured == featured)
            .map(|m| (m.id.clone(), option_label(m)))
            .collect()
    };
    let featured = options(true);
    let others = options(false);
    let active_entry = maps.iter().find(|m| m.id == active);
    let has_active = active_entry.is_some();
    let summary = active_entry.and_then(|m| m.summary.clone());
    let is_favorite = favorites.read().contains(&active);
    let favorite_id = active.clone();

    let st_select = state.clone();
    let st_favorite = state.clone();
    let maps_for_select = maps.clone();

    rsx! {
        div { class: "panel",
            h3 { "Historical Map" }
            select {
                "aria-label": "Select historical map",
                value: "{active}",
                onchange: move |evt: Event<FormData>| {
                    let id = evt.value();
                    let entry = maps_for_select.iter().find(|m| m.id == id);
                    st_select.camera.set_active_overlay(entry.map(|m| m.id.clone()));
                    if let Some(bounds) = entry.and_then(|m| m.bounds) {
                        let cam = st_select.camera.get();
                        if !bounds_contain(bounds, [cam.longitude, cam.latitude]) {
                            let [lon, lat] = bounds_center(bounds);
                            st_select.camera.set_view(CameraPatch::center(lon, lat));
                        }
                    }
                    on_change.call(());
                },
                option { value: "", "-- No overlay --" }
                if !featured.is_empty() {
                    optgroup { label: "Featured",
                        for (id, label) in featured {
                            option {
                                selected: id == active,
                                value: "{id}",
                                "{label}"
                            }
                        }
                    }
                }
                optgroup { label: "Archive",
                    for (id, label) in others {
                        option {
                            selected: id == active,
                            value: "{id}",
                            "{label}"
                        }
                    }
                }
            }

            if has_active {
                div { class: "map-details",
                    if let Some(summary) = summary {
                        p { class: "summary", "{summary}" }
                    }
                    button {
                        class: if is_favorite { "favorite active" } else { "favorite" },
                        onclick: move |_| {
                            let user = st_favorite.user_id.clone();
                            let notices = st_favorite.notices.clone();
                            let map_id = favorite_id.clone();
                            let mut favorites = favorites;
                            spawn(async move {
                                match api::set_favorite(&user, &map_id, !is_favorite).await {
                                    Ok(now_favorite) => {
                                        let mut list = favorites.write();
                                        list.retain(|id| id != &map_id);
                                        if now_favorite {
                                            list.push(map_id);
                                        }
                                    }
                                    Err(e) => {
                                        tracing::warn!("favorite update failed: {e}");
                                        notices.add_error("Could not update favorites");
                                    }
                                }
                            });
                        },
                        if is_favorite { "★ Favorite" } else { "☆ Add to favorites" }
                    }
                }
            }
        }
    }
}
