pub mod annotation_panel;
pub mod help_overlay;
pub mod hunt_panel;
pub mod map_selector;
pub mod map_view;
pub mod notice_bar;
pub mod scene_panel;
pub mod search_box;
pub mod story_panel;
pub mod view_mode_controls;
