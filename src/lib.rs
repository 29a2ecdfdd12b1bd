pub mod app;
pub mod config;
mod inflight;
pub mod models;
pub mod omdb;
pub mod search;
pub mod selection;
pub mod store;
pub mod watchlist;
