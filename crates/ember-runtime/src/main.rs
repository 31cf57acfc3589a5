// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ember runtime: runs an application described by a descriptor document.

mod app;
mod cli;
mod logging;
mod workers;

use anyhow::{Context, Result};
use app::RuntimeApp;
use clap::Parser;
use cli::Cli;
use ember_core::AppDescriptor;
use ember_engine::Engine;
use std::sync::atomic::Ordering;
use workers::{GameWorker, NetWorker, VideoWorker};

fn run(cli: Cli) -> Result<i32> {
    let descriptor = AppDescriptor::load(&cli.app)
        .with_context(|| format!("Failed to load app descriptor '{}'", cli.app.display()))?;
    log::info!(
        "Starting '{}' {} by {} in {}",
        descriptor.info.display_name,
        descriptor.info.version,
        descriptor.info.author,
        descriptor.working_dir.display()
    );

    log::debug!("Descriptor: {}", descriptor.to_document());

    let app = RuntimeApp::new(cli.frames, cli.rate);
    let mut engine = Engine::create(descriptor, Box::new(app)).context("Failed to create engine")?;

    let net = NetWorker::new(cli.plugin_source(), cli.net_rate);
    let net_stats = net.stats();
    engine
        .create_subsystem("net", Box::new(net))
        .context("Failed to create net subsystem")?;

    let video = VideoWorker::new(cli.video_rate);
    let video_frames = video.frames();
    engine
        .create_subsystem("video", Box::new(video))
        .context("Failed to create video subsystem")?;
    engine
        .create_subsystem("game", Box::new(GameWorker::new(cli.game_rate)))
        .context("Failed to create game subsystem")?;

    engine.exec();
    let status = engine.destroy();
    log::info!(
        "Session summary: {} datagrams echoed, {} video frames",
        net_stats.echoed(),
        video_frames.load(Ordering::Relaxed)
    );
    Ok(status)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let status = run(cli)?;
    log::info!("Exiting with status {status}");
    std::process::exit(status);
}
