pub mod events;
pub mod health;
pub mod model;
pub mod privacy;
