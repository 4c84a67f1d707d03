pub mod dashboard;
pub mod error;
pub mod events;
pub mod intake;
pub mod plan;
pub mod property;
pub mod request;
pub mod schema;
