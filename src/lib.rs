#![doc = "The `softwaretest` library crate."]
#![doc = ""]
#![doc = "Startup wiring for an identity-enabled web application: configuration,"]
#![doc = "platform-based database selection, the identity core, cookie authentication,"]
#![doc = "role-based authorization and the HTTP routes built on top of them."]
#![doc = "The binary (`main.rs`) only initializes logging and calls [`startup::launch`]."]

pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod identity;
pub mod models;
pub mod platform;
pub mod routes;
pub mod startup;
pub mod state;

pub use crate::error::AppError;
pub use crate::startup::{build_app, StartupError, StartupPlan};
