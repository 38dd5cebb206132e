mod database {
    pub mod actions;
    pub mod error;
    pub mod export;
    pub mod form;
    pub mod memory;
    pub mod postgres;
    pub mod schema;
    pub mod store;
    pub mod views;
}
mod authentication {
    pub mod permissions;
    pub mod session;
}
mod config;
mod constants;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
