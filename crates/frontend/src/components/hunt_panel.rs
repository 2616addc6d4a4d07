use dioxus::prelude::*;
use vma_shared::geo::{nearest_point, reached_points, ProximityCheck};
use vma_shared::models::{Interaction, LonLat, Story};
use vma_shared::story::PlayerStatus;

use crate::browser::GeoWatch;
use crate::coords::format_lonlat;
use crate::hooks::{use_app_state, use_library, use_player};

/// Human distance, e.g. `42 m` or `1.3 km`.
pub fn format_distance(meters: f64) -> String {
    if meters < 1_000.0 {
        format!("{:.0} m", meters.max(0.0))
    } else {
        format!("{:.1} km", meters / 1_000.0)
    }
}

fn interaction_hint(interaction: Interaction) -> &'static str {
    match interaction {
        Interaction::Proximity => "Walk to this stop to complete it.",
        Interaction::Qr => "Find the code at this stop and enter it below.",
        Interaction::Camera => "Take a photo here, then confirm.",
    }
}

/// Where the player stands relative to the stops while no hunt is running.
fn nearby_summary(story: &Story, position: LonLat) -> Option<String> {
    let (point, meters) = nearest_point(story, position)?;
    let name = if point.title.trim().is_empty() {
        format!("Stop {}", point.order + 1)
    } else {
        point.title.clone()
    };
    let mut summary = format!("Nearest stop: {name}, {}", format_distance(meters));
    match reached_points(story, position).len() {
        0 => {}
        1 => summary.push_str(" (1 stop in range)"),
        n => summary.push_str(&format!(" ({n} stops in range)")),
    }
    Some(summary)
}

#[component]
pub fn HuntPanel(story_id: Signal<Option<String>>, mut position: Signal<Option<LonLat>>) -> Element {
    let state = use_app_state();
    let library = use_library(&state);
    let _player = use_player(&state);
    let mut watch = use_signal(|| None::<GeoWatch>);
    let mut last_check = use_signal(|| None::<ProximityCheck>);
    let mut code = use_signal(String::new);

    let Some(sid) = story_id.read().clone() else {
        return rsx! {
            div { class: "panel hunt-panel",
                h3 { "Hunt" }
                p { class: "hint", "Choose a story to play it as a hunt." }
            }
        };
    };
    let Some(story) = library.read().stories.iter().find(|s| s.id == sid).cloned() else {
        return rsx! {
            div { class: "panel hunt-panel",
                h3 { "Hunt" }
                p { class: "hint", "Loading story..." }
            }
        };
    };

    let status = state.player.status();
    let running_here = matches!(&status, PlayerStatus::Running { story_id, .. } if *story_id == sid);
    let finished_here = matches!(&status, PlayerStatus::Finished { story_id } if *story_id == sid);
    let progress = state.player.progress(&sid);
    let completed = progress.as_ref().map_or(0, |p| p.completed_point_ids.len());
    let total = story.points.len();
    let current = progress
        .as_ref()
        .filter(|_| running_here)
        .and_then(|p| story.points.get(p.current_point_index).cloned());
    let current_number = progress.as_ref().map_or(1, |p| p.current_point_index + 1);
    let tracking = watch.read().is_some();
    let here_lonlat = *position.read();
    let here = here_lonlat.map(format_lonlat);
    let nearby = here_lonlat
        .filter(|_| !running_here)
        .and_then(|lonlat| nearby_summary(&story, lonlat));
    let check = last_check.read().clone();
    let distance = check
        .filter(|c| current.as_ref().is_some_and(|p| p.id == c.point_id))
        .map(|c| format_distance(c.distance_m));
    let start_label = if progress.as_ref().is_some_and(|p| !p.is_finished()) { "Resume" } else { "Start" };

    let st_start = state.clone();
    let st_stop = state.clone();
    let st_reset = state.clone();
    let st_track = state.clone();
    let st_qr = state.clone();
    let st_photo = state.clone();
    let (id_start, id_reset, id_track, id_qr, id_photo) =
        (sid.clone(), sid.clone(), sid.clone(), sid.clone(), sid.clone());

    let stop_node = current.map(|point| {
        let hint = interaction_hint(point.interaction);
        let is_qr = point.interaction == Interaction::Qr;
        let is_photo = point.interaction == Interaction::Camera;
        rsx! {
            div { class: "current-stop",
                h4 { "Stop {current_number} of {total}: {point.title}" }
                if !point.description.is_empty() {
                    p { "{point.description}" }
                }
                if let Some(clue) = point.hint.clone() {
                    p { class: "clue", "Hint: {clue}" }
                }
                p { class: "hint", "{hint}" }
                if let Some(d) = distance.clone() {
                    p { class: "distance", "{d} away" }
                }
                if is_qr {
                    div { class: "row",
                        input {
                            r#type: "text",
                            placeholder: "Code...",
                            value: "{code}",
                            oninput: move |evt: Event<FormData>| code.set(evt.value()),
                        }
                        button {
                            onclick: move |_| {
                                if st_qr.scan_qr(&id_qr, &code.read()) {
                                    code.set(String::new());
                                }
                            },
                            "Check"
                        }
                    }
                }
                if is_photo {
                    button {
                        onclick: move |_| { st_photo.confirm_photo_stop(&id_photo); },
                        "I took the photo"
                    }
                }
            }
        }
    });

    rsx! {
        div { class: "panel hunt-panel",
            h3 { "Hunt: {story.title}" }
            p { class: "progress", "{completed} / {total} stops" }

            if finished_here {
                p { class: "finished", "Finished! Every stop reached." }
            }
            {stop_node}

            div { class: "row",
                if running_here {
                    button {
                        class: "secondary",
                        onclick: move |_| {
                            st_stop.player.stop();
                            watch.set(None);
                        },
                        "Stop"
                    }
                } else {
                    button {
                        disabled: total == 0,
                        onclick: move |_| {
                            st_start.reset_geolocation_throttle();
                            st_start.player.start(&id_start);
                        },
                        "{start_label}"
                    }
                }
                button {
                    class: "secondary danger",
                    disabled: progress.is_none(),
                    onclick: move |_| {
                        st_reset.player.reset_progress(&id_reset);
                        last_check.set(None);
                    },
                    "Reset progress"
                }
            }

            div { class: "row",
                button {
                    class: if tracking { "active" } else { "secondary" },
                    onclick: move |_| {
                        if tracking {
                            watch.set(None);
                            return;
                        }
                        let state = st_track.clone();
                        let sid = id_track.clone();
                        let notices = st_track.notices.clone();
                        let started = GeoWatch::start(
                            move |lonlat| {
                                position.set(Some(lonlat));
                                if let Some(check) = state.handle_position(&sid, lonlat) {
                                    last_check.set(Some(check));
                                }
                            },
                            move |message| {
                                tracing::warn!("geolocation error: {message}");
                                notices.add_warning(message);
                            },
                        );
                        match started {
                            Ok(handle) => {
                                st_track.reset_geolocation_throttle();
                                watch.set(Some(handle));
                            }
                            Err(e) => {
                                st_track.notices.add_error(e);
                            }
                        }
                    },
                    if tracking { "Stop tracking" } else { "Track my location" }
                }
            }
            if let Some(here) = here {
                p { class: "coords", "You are at {here}" }
            }
            if let Some(nearby) = nearby {
                p { class: "hint", "{nearby}" }
            }
        }
    }
}
