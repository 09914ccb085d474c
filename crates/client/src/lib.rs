pub mod api;
pub mod config;
pub mod form;
pub mod slice;
pub mod state;
pub mod store;
pub mod views;
