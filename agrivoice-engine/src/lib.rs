pub mod assistant;
pub mod controller;
pub mod interjector;
pub mod permission;
pub mod session;
pub mod testing;
pub mod traits;
