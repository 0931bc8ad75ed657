mod app;
mod config;
mod input;
mod particle;
mod random;
mod render;
mod scheduler;
mod universe;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
