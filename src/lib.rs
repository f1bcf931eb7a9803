pub mod api;
pub mod auth;
pub mod classify;
pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod protocol;
pub mod state;
pub mod transform;
pub mod transport;

mod util;
