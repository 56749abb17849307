mod server;
mod types;

pub use server::{default_data_dir, run_http_server, run_stdio_server, AppState};
pub use types::*;
