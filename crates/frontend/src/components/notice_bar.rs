use dioxus::prelude::*;

use crate::hooks::{use_app_state, use_notices};

#[component]
pub fn NoticeBar() -> Element {
    let state = use_app_state();
    let notices = use_notices(&state);
    let list = notices.read().clone();

    if list.is_empty() {
        return rsx! {};
    }

    rsx! {
        div { class: "notice-bar", role: "status",
            for notice in list {
                div {
                    key: "{notice.id}",
                    class: format!("notice {}", notice.level.css_class()),
                    span { "{notice.message}" }
                    button {
                        class: "icon",
                        "aria-label": "Dismiss",
                        onclick: {
                            let queue = state.notices.clone();
                            let id = notice.id;
                            move |_| queue.remove(id)
                        },
                        "✕"
                    }
                }
            }
        }
    }
}
