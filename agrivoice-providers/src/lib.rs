pub mod disease_detection;
pub mod parse;
pub mod request;
pub mod runtime;
pub mod voice_realtime;
