mod api;
mod browser;
mod components;
mod coords;
mod hooks;
mod pages;
mod state;

use std::rc::Rc;

use dioxus::prelude::*;
use gloo_timers::future::TimeoutFuture;

use browser::{BrowserClock, LocalStorage, WindowListener};
use state::AppState;

/// Host tick for notice expiry, debounced saves and scene autoplay.
const TICK_MS: u32 = 250;

#[derive(Routable, Clone, PartialEq)]
enum Route {
    #[route("/")]
    Home {},
    #[route("/view")]
    View {},
    #[route("/story/:id")]
    StoryView { id: String },
    #[route("/hunt/:id")]
    HuntView { id: String },
}

#[component]
fn Home() -> Element {
    rsx! {
        pages::viewer::Viewer { story: None::<String>, hunt: false }
    }
}

#[component]
fn View() -> Element {
    rsx! {
        pages::viewer::Viewer { story: None::<String>, hunt: false }
    }
}

#[component]
fn StoryView(id: String) -> Element {
    rsx! {
        pages::viewer::Viewer { key: "story-{id}", story: Some(id.clone()), hunt: false }
    }
}

#[component]
fn HuntView(id: String) -> Element {
    rsx! {
        pages::viewer::Viewer { key: "hunt-{id}", story: Some(id.clone()), hunt: true }
    }
}

const CSS: Asset = asset!("/assets/main.css");
const FAVICON: Asset = asset!("/assets/favicon.svg");

#[allow(non_snake_case)]
fn App() -> Element {
    let state = use_context_provider(|| {
        AppState::new(Rc::new(LocalStorage), Rc::new(BrowserClock), |user_id, notices| {
            Rc::new(api::ApiMirror::new(user_id, notices.clone()))
        })
    });

    use_future({
        let state = state.clone();
        move || {
            let state = state.clone();
            async move {
                loop {
                    TimeoutFuture::new(TICK_MS).await;
                    state.tick(state.now());
                }
            }
        }
    });

    // Debounced writes must land before the page goes away
    use_hook({
        let state = state.clone();
        move || Rc::new(WindowListener::new("pagehide", move |_| state.flush()))
    });

    rsx! {
        document::Link { rel: "icon", r#type: "image/svg+xml", href: FAVICON }
        document::Stylesheet { href: CSS }
        Router::<Route> {}
    }
}

fn main() {
    launch(App);
}
