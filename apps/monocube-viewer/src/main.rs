//! Monocube viewer
//!
//! Opens a window, renders a single hard-coded colored cube, and exits
//! once the frame has been presented.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p monocube-viewer
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use app::ViewerConfig;
use tracing_subscriber::EnvFilter;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    app::run(ViewerConfig::new("Monocube").with_size(WIDTH, HEIGHT))
}
