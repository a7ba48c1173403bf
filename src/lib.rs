// Library exports for mapboard
// Integration tests drive the router and the state machines through these modules

pub mod backend;
pub mod config;
pub mod domain;
pub mod error;
pub mod extractors;
pub mod map;
pub mod routes;
pub mod state;
pub mod ui;
pub mod view;
