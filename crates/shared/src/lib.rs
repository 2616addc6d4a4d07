pub mod annotation;
pub mod clip;
pub mod contribute;
pub mod geo;
pub mod history;
pub mod ids;
pub mod map_state;
pub mod models;
pub mod notice;
pub mod persist;
pub mod scenes;
pub mod search;
pub mod store;
pub mod story;
pub mod timing;
pub mod url;
