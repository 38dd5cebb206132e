//! Service operations. Every function takes the store as its last argument
//! and reports failures as [`ServiceError`](crate::error::ServiceError).

pub mod products;
pub mod queries;
pub mod recipes;
pub mod relations;
pub mod shopping;
pub mod tags;
pub mod users;

pub use products::*;
pub use queries::*;
pub use recipes::*;
pub use relations::*;
pub use shopping::*;
pub use tags::*;
pub use users::*;
