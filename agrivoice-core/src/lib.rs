pub mod config;
pub mod detect;
pub mod error;
pub mod notice;
pub mod types;

// Keep the public surface small and intentional.
pub use config::*;
pub use detect::*;
pub use error::*;
pub use notice::*;
pub use types::*;
