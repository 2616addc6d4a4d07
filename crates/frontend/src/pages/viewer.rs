use std::rc::Rc;

use dioxus::prelude::*;
use gloo_timers::future::TimeoutFuture;
use vma_shared::map_state::CameraPatch;
use vma_shared::models::{LonLat, MapEntry, Story};
use vma_shared::scenes::Direction;
use vma_shared::url::{UrlSync, UrlSyncOptions};

use crate::api;
use crate::browser::{on_next_frame, BrowserLocation, WindowListener};
use crate::components::annotation_panel::AnnotationPanel;
use crate::components::help_overlay::{shortcut_for, HelpOverlay, Shortcut};
use crate::components::hunt_panel::HuntPanel;
use crate::components::map_selector::MapSelector;
use crate::components::map_view::{MapTool, MapView};
use crate::components::notice_bar::NoticeBar;
use crate::components::scene_panel::ScenePanel;
use crate::components::search_box::SearchBox;
use crate::components::story_panel::StoryPanel;
use crate::components::view_mode_controls::ViewModeControls;
use crate::hooks::{use_app_state, use_scene_deck};
use crate::state::AppState;

/// How often the fragment writer is polled.
const URL_POLL_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    View,
    Scenes,
    Annotate,
    Stories,
    Hunt,
}

impl Tab {
    const ALL: [Tab; 5] = [Tab::View, Tab::Scenes, Tab::Annotate, Tab::Stories, Tab::Hunt];

    fn initial(story: Option<&str>, hunt: bool) -> Tab {
        match (story, hunt) {
            (Some(_), true) => Tab::Hunt,
            (Some(_), false) => Tab::Stories,
            (None, _) => Tab::View,
        }
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Tab::View => "View",
            Tab::Scenes => "Scenes",
            Tab::Annotate => "Annotate",
            Tab::Stories => "Stories",
            Tab::Hunt => "Hunt",
        })
    }
}

type ArchiveUrlSync = UrlSync<BrowserLocation>;

/// The fragment engine plus the window listeners that feed it.
struct UrlBinding {
    sync: Rc<ArchiveUrlSync>,
    _popstate: Option<WindowListener>,
    _hashchange: Option<WindowListener>,
}

fn release_on_next_frame(sync: &Rc<ArchiveUrlSync>) {
    let weak = Rc::downgrade(sync);
    on_next_frame(move || {
        if let Some(sync) = weak.upgrade() {
            sync.on_animation_frame();
        }
    });
}

fn bind_url(state: &AppState) -> UrlBinding {
    let sync = Rc::new(UrlSync::start(
        state.camera.clone(),
        state.layers.clone(),
        BrowserLocation,
        state.clock.clone(),
        UrlSyncOptions::default(),
    ));
    if sync.is_suppressed() {
        release_on_next_frame(&sync);
    }

    let listen = |event: &'static str| {
        let weak = Rc::downgrade(&sync);
        WindowListener::new(event, move |_| {
            if let Some(sync) = weak.upgrade() {
                if sync.on_navigation() {
                    release_on_next_frame(&sync);
                }
            }
        })
    };
    let popstate = listen("popstate");
    let hashchange = listen("hashchange");

    UrlBinding {
        sync,
        _popstate: popstate,
        _hashchange: hashchange,
    }
}

/// Camera move that frames a story's starting region.
fn region_patch(story: &Story) -> Option<CameraPatch> {
    let region = story.region.as_ref()?;
    Some(CameraPatch {
        longitude: Some(region.center[0]),
        latitude: Some(region.center[1]),
        zoom: Some(region.zoom),
        ..Default::default()
    })
}

/// Pull the user's stories and progress from the server and merge them in.
async fn merge_remote(state: AppState) {
    let stories = match api::fetch_stories(Some(&state.user_id)).await {
        Ok(stories) => stories,
        Err(e) => {
            tracing::warn!("fetching stories failed: {e}");
            Vec::new()
        }
    };
    let progress = match api::fetch_progress(&state.user_id).await {
        Ok(progress) => progress,
        Err(e) => {
            tracing::warn!("fetching progress failed: {e}");
            Vec::new()
        }
    };
    tracing::debug!(stories = stories.len(), progress = progress.len(), "merging remote copies");
    state.merge_remote(stories, progress);
}

/// Make sure `id` is in the library, fetching it when missing. Only the
/// latest request may write.
async fn ensure_story(state: AppState, id: String) {
    if state.library.story(&id).is_some() {
        return;
    }
    let ticket = state.story_requests.issue();
    let result = api::fetch_story(&id).await;
    if !state.story_requests.is_current(ticket) {
        tracing::debug!("dropping superseded story response for {id}");
        return;
    }
    match result {
        Ok(Some(story)) => {
            if let Some(patch) = region_patch(&story) {
                state.camera.set_view(patch);
            }
            state.library.load_remote(vec![story]);
        }
        Ok(None) => {
            state.notices.add_warning("That story could not be found");
        }
        Err(e) => {
            tracing::warn!("fetching story {id} failed: {e}");
            state.notices.add_error("Could not load the story");
        }
    }
}

#[component]
pub fn Viewer(story: Option<String>, hunt: bool) -> Element {
    let state = use_app_state();
    let deck = use_scene_deck(&state);

    let mut tab = use_signal(|| Tab::initial(story.as_deref(), hunt));
    let mut tool = use_signal(MapTool::default);
    let story_id = use_signal(|| story.clone());
    let position = use_signal(|| None::<LonLat>);
    let mut favorites = use_signal(Vec::<String>::new);
    let mut show_help = use_signal(|| false);

    let url = use_hook({
        let state = state.clone();
        move || Rc::new(bind_url(&state))
    });

    let catalog = use_resource({
        let records = state.records.clone();
        move || api::fetch_maps_cached(records.clone())
    });

    // Fragment writer
    use_future({
        let sync = url.sync.clone();
        move || {
            let sync = sync.clone();
            async move {
                loop {
                    TimeoutFuture::new(URL_POLL_MS).await;
                    sync.poll();
                }
            }
        }
    });

    use_future({
        let state = state.clone();
        move || merge_remote(state.clone())
    });

    use_future({
        let state = state.clone();
        move || {
            let state = state.clone();
            async move {
                match api::fetch_favorites(&state.user_id).await {
                    Ok(list) => favorites.set(list),
                    Err(e) => tracing::warn!("fetching favorites failed: {e}"),
                }
            }
        }
    });

    let _story_loader = use_resource({
        let state = state.clone();
        move || {
            let state = state.clone();
            let id = story_id.read().clone();
            async move {
                if let Some(id) = id {
                    ensure_story(state, id).await;
                }
            }
        }
    });

    let maps: Vec<MapEntry> = match &*catalog.read() {
        Some(Ok(m)) => m.clone(),
        _ => vec![],
    };

    let current_tab = *tab.read();
    let presenting = deck.read().presenting;
    let caption = deck
        .read()
        .scenes
        .get(deck.read().active_scene_index)
        .filter(|_| presenting)
        .map(|s| (s.title.clone(), s.details.clone()));

    let push_url = {
        let sync = url.sync.clone();
        move |_: ()| {
            sync.push_now();
        }
    };
    let push_url_scenes = push_url.clone();
    let push_url_search = push_url.clone();

    let st_keys = state.clone();
    let sync_keys = url.sync.clone();
    let on_key = move |evt: Event<KeyboardData>| {
        let modifiers = evt.modifiers();
        let ctrl = modifiers.contains(Modifiers::CONTROL) || modifiers.contains(Modifiers::META);
        let Some(shortcut) = shortcut_for(&evt.key(), ctrl, modifiers.contains(Modifiers::SHIFT)) else {
            return;
        };
        evt.prevent_default();
        match shortcut {
            Shortcut::NextScene | Shortcut::PreviousScene => {
                let direction = if shortcut == Shortcut::NextScene {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                st_keys.step_scene(direction);
                sync_keys.push_now();
            }
            Shortcut::ToggleAutoplay => st_keys.toggle_autoplay(),
            Shortcut::Undo => {
                st_keys.annotations.undo();
            }
            Shortcut::Redo => {
                st_keys.annotations.redo();
            }
            Shortcut::Escape => {
                if *show_help.peek() {
                    show_help.set(false);
                } else if st_keys.scenes.get().presenting {
                    st_keys.set_presenting(false);
                } else {
                    tool.set(MapTool::Browse);
                }
            }
            Shortcut::ToggleHelp => {
                let shown = *show_help.peek();
                show_help.set(!shown);
            }
            Shortcut::ResetView => st_keys.layers.reset_view(),
        }
    };

    let st_exit = state.clone();
    let caption_node = caption.map(|(title, details)| {
        rsx! {
            div { class: "scene-caption",
                h2 { "{title}" }
                if !details.is_empty() {
                    p { "{details}" }
                }
                button {
                    class: "secondary",
                    onclick: move |_| st_exit.set_presenting(false),
                    "Exit presentation"
                }
            }
        }
    });

    let panel = match current_tab {
        Tab::View => rsx! {
            SearchBox { on_navigate: push_url_search }
            MapSelector { maps: maps.clone(), favorites: favorites, on_change: push_url }
            ViewModeControls {}
        },
        Tab::Scenes => rsx! {
            ScenePanel { on_navigate: push_url_scenes }
        },
        Tab::Annotate => rsx! {
            AnnotationPanel { tool: tool }
        },
        Tab::Stories => rsx! {
            StoryPanel { story_id: story_id, tool: tool }
        },
        Tab::Hunt => rsx! {
            HuntPanel { story_id: story_id, position: position }
        },
    };

    rsx! {
        div { class: if presenting { "app presenting" } else { "app" },
            div { class: "header",
                h1 { "Vietnam Map Archive" }
                nav { class: "tabs",
                    for t in Tab::ALL {
                        button {
                            key: "{t}",
                            class: if t == current_tab { "active" } else { "" },
                            onclick: move |_| tab.set(t),
                            "{t}"
                        }
                    }
                }
                button {
                    class: "icon help-button",
                    title: "Help",
                    onclick: move |_| show_help.set(true),
                    "?"
                }
            }

            div { class: "sidebar", {panel} }

            div {
                class: "map-area",
                tabindex: "0",
                onkeydown: on_key,
                MapView {
                    maps: maps.clone(),
                    tool: tool,
                    story_id: story_id.read().clone(),
                    position: *position.read(),
                }
                {caption_node}
            }

            NoticeBar {}
            HelpOverlay { show: show_help }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vma_shared::models::Region;

    #[test]
    fn test_initial_tab_follows_route() {
        assert_eq!(Tab::initial(None, false), Tab::View);
        assert_eq!(Tab::initial(None, true), Tab::View);
        assert_eq!(Tab::initial(Some("story-1"), false), Tab::Stories);
        assert_eq!(Tab::initial(Some("story-1"), true), Tab::Hunt);
    }

    #[test]
    fn test_region_patch() {
        let mut story = Story::new("s".into(), "Walk".into(), String::new(), "u".into(), 0);
        assert!(region_patch(&story).is_none());
        story.region = Some(Region {
            center: [106.7, 10.77],
            zoom: 15.0,
        });
        let patch = region_patch(&story).unwrap();
        assert_eq!(patch.longitude, Some(106.7));
        assert_eq!(patch.latitude, Some(10.77));
        assert_eq!(patch.zoom, Some(15.0));
        assert!(patch.rotation.is_none());
    }
}
