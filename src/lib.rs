pub mod config;
pub mod cursor;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod server;
pub mod sink;
pub mod source;
