// src/client/mod.rs

pub mod api;
pub mod session;
pub mod shell;

pub use api::{ApiError, HttpMealApi, MealApi};
pub use session::{MealSession, SessionError, SessionEvent};
pub use shell::{BlackoutOverlay, ShellBridge};
