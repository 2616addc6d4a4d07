use std::rc::Rc;

use dioxus::prelude::*;
use vma_shared::models::{CameraState, LayerPreferences, StoryLibrary, StoryPlayerState};
use vma_shared::notice::Notice;
use vma_shared::scenes::SceneDeckState;
use vma_shared::search::SearchState;
use vma_shared::store::Subscription;

use crate::state::AppState;

pub fn use_app_state() -> AppState {
    use_context::<AppState>()
}

/// Mirror an observable store into a signal. The store subscription lives as
/// long as the component and is dropped with it.
pub fn use_synced<T: Clone + PartialEq + 'static>(
    read: impl FnOnce() -> T,
    subscribe: impl FnOnce(Box<dyn Fn(&T)>) -> Subscription,
) -> Signal<T> {
    let signal = use_signal(read);
    use_hook(move || {
        let listener = move |value: &T| {
            let mut signal = signal;
            if *signal.peek() != *value {
                signal.set(value.clone());
            }
        };
        Rc::new(subscribe(Box::new(listener)))
    });
    signal
}

pub fn use_camera(state: &AppState) -> Signal<CameraState> {
    let camera = state.camera.clone();
    let source = camera.clone();
    use_synced(move || source.get(), move |f| camera.subscribe(f))
}

pub fn use_layers(state: &AppState) -> Signal<LayerPreferences> {
    let layers = state.layers.clone();
    let source = layers.clone();
    use_synced(move || source.get(), move |f| layers.subscribe(f))
}

pub fn use_library(state: &AppState) -> Signal<StoryLibrary> {
    let library = state.library.clone();
    let source = library.clone();
    use_synced(
        move || StoryLibrary {
            stories: source.stories(),
        },
        move |f| library.subscribe(f),
    )
}

pub fn use_player(state: &AppState) -> Signal<StoryPlayerState> {
    let player = state.player.clone();
    let source = player.clone();
    use_synced(move || source.state(), move |f| player.subscribe(f))
}

pub fn use_scene_deck(state: &AppState) -> Signal<SceneDeckState> {
    let deck = state.scenes.clone();
    let source = deck.clone();
    use_synced(move || source.get(), move |f| deck.subscribe(f))
}

pub fn use_notices(state: &AppState) -> Signal<Vec<Notice>> {
    let notices = state.notices.clone();
    let source = notices.clone();
    use_synced(move || source.notices(), move |f| notices.subscribe(f))
}

/// Bumps whenever the annotation layer changes.
pub fn use_annotation_revision(state: &AppState) -> Signal<u64> {
    let editor = state.annotations.clone();
    let source = editor.clone();
    use_synced(move || source.revision(), move |f| editor.subscribe(f))
}

pub fn use_search(state: &AppState) -> Signal<SearchState> {
    let search = state.search.clone();
    let source = search.clone();
    use_synced(move || source.state(), move |f| search.subscribe(f))
}
