pub mod handlers;
pub mod models;
pub mod overlap;
pub mod router;
pub mod services;
pub mod slots;

pub use models::*;
pub use services::availability::AvailabilityService;
