// src/lib.rs
//! MealTracker: a household meal-stock sheet served over HTTP.
//!
//! - [`meals`]: the sheet model, its SQLite store and the order email import
//! - [`server`]: the single-path action endpoint
//! - [`client`]: HTTP client and the optimistic session used by front ends
//! - [`settings`]: JSON settings file with environment overrides

pub mod cli;
pub mod client;
pub mod meals;
pub mod server;
pub mod settings;
