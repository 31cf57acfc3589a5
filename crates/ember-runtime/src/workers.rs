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

//! The stock subsystems: networking, video and game logic.

use crate::cli::{self, PluginSource};
use ember_core::Stopwatch;
use ember_engine::{SubsystemContext, SubsystemHandler};
use ember_net::{loopback, NetContext, NetError, SocketConfig, SocketId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn apply_rate(ctx: &SubsystemContext, rate: Option<f64>) {
    let Some(rate) = rate else {
        return;
    };
    match cli::min_dt(rate) {
        Some(dt) => ctx.set_min_dt(dt),
        None => log::warn!(
            "Ignoring rate {rate} Hz for subsystem '{}'; keeping {:.4}s",
            ctx.name(),
            ctx.min_dt()
        ),
    }
}

/// Datagram counters of a [`NetWorker`], readable from any thread.
#[derive(Debug, Default)]
pub struct NetStats {
    sent: AtomicU64,
    echoed: AtomicU64,
}

impl NetStats {
    /// Datagrams accepted by the socket.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Datagrams received back.
    pub fn echoed(&self) -> u64 {
        self.echoed.load(Ordering::Relaxed)
    }
}

/// Loads the net plugin on its own thread and pumps one socket every tick.
pub struct NetWorker {
    source: PluginSource,
    rate: Option<f64>,
    stats: Arc<NetStats>,
    net: Option<NetContext>,
    socket: Option<SocketId>,
}

impl NetWorker {
    pub fn new(source: PluginSource, rate: Option<f64>) -> Self {
        Self {
            source,
            rate,
            stats: Arc::default(),
            net: None,
            socket: None,
        }
    }

    pub fn stats(&self) -> Arc<NetStats> {
        Arc::clone(&self.stats)
    }

    fn connect(&self, ctx: &SubsystemContext) -> Result<(NetContext, SocketId), NetError> {
        let mut net = match &self.source {
            PluginSource::Linked { id } => {
                NetContext::with_linked_plugin(loopback::module_name(), id)?
            }
            // SAFETY: the context is owned by this worker and only used through
            // its socket API; it is dropped in `fini`.
            PluginSource::Path { path, id } => unsafe { NetContext::with_plugin_path(path, id)? },
        };
        let protocol = net
            .protocols()
            .first()
            .map(|protocol| protocol.to_string())
            .ok_or_else(|| NetError::UnknownProtocol {
                protocol: "<any>".into(),
            })?;
        let address = format!("{}:{}", ctx.engine().info().name, ctx.name());
        let socket = net.open(&protocol, SocketConfig::new(address))?;
        Ok((net, socket))
    }
}

impl SubsystemHandler for NetWorker {
    fn init(&mut self, ctx: &mut SubsystemContext) -> bool {
        apply_rate(ctx, self.rate);
        match self.connect(ctx) {
            Ok((net, socket)) => {
                self.net = Some(net);
                self.socket = Some(socket);
                true
            }
            Err(e) => {
                log::error!("Net subsystem could not start: {e}");
                false
            }
        }
    }

    fn tick(&mut self, ctx: &mut SubsystemContext, _dt: f64) {
        let (Some(net), Some(socket)) = (self.net.as_mut(), self.socket) else {
            return;
        };

        let payload = self.stats.sent().to_le_bytes();
        match net.send(socket, &payload) {
            Ok(_) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(NetError::WouldBlock) => log::warn!("Net socket is full; dropping a datagram"),
            Err(e) => {
                log::error!("Net send failed: {e}");
                ctx.request_stop();
                return;
            }
        }

        loop {
            match net.recv(socket) {
                Ok(Some(_)) => {
                    self.stats.echoed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Net receive failed: {e}");
                    ctx.request_stop();
                    break;
                }
            }
        }
    }

    fn fini(&mut self, _ctx: &mut SubsystemContext) {
        if let (Some(net), Some(socket)) = (self.net.as_mut(), self.socket.take()) {
            net.close(socket);
        }
        // Unload the plugin on the thread that loaded it.
        self.net = None;
        log::info!(
            "Net subsystem stopped: {} sent, {} echoed",
            self.stats.sent(),
            self.stats.echoed()
        );
    }
}

/// Stands in for the renderer: counts presented frames.
pub struct VideoWorker {
    rate: Option<f64>,
    frames: Arc<AtomicU64>,
    clock: Stopwatch,
}

impl VideoWorker {
    pub fn new(rate: Option<f64>) -> Self {
        Self {
            rate,
            frames: Arc::default(),
            clock: Stopwatch::new(),
        }
    }

    pub fn frames(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames)
    }
}

impl SubsystemHandler for VideoWorker {
    fn init(&mut self, ctx: &mut SubsystemContext) -> bool {
        apply_rate(ctx, self.rate);
        self.clock = Stopwatch::new();
        true
    }

    fn tick(&mut self, _ctx: &mut SubsystemContext, _dt: f64) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn fini(&mut self, _ctx: &mut SubsystemContext) {
        let frames = self.frames.load(Ordering::Relaxed);
        let secs = self.clock.elapsed_secs_f64();
        let fps = if secs > 0.0 { frames as f64 / secs } else { 0.0 };
        log::info!("Video subsystem stopped: {frames} frames in {secs:.2}s ({fps:.1} fps)");
    }
}

/// Stands in for game logic: advances simulated time by each tick's delta.
pub struct GameWorker {
    rate: Option<f64>,
    sim_time: f64,
    steps: u64,
}

impl GameWorker {
    pub fn new(rate: Option<f64>) -> Self {
        Self {
            rate,
            sim_time: 0.0,
            steps: 0,
        }
    }
}

impl SubsystemHandler for GameWorker {
    fn init(&mut self, ctx: &mut SubsystemContext) -> bool {
        apply_rate(ctx, self.rate);
        true
    }

    fn tick(&mut self, _ctx: &mut SubsystemContext, dt: f64) {
        self.sim_time += dt;
        self.steps += 1;
    }

    fn fini(&mut self, _ctx: &mut SubsystemContext) {
        log::info!(
            "Game subsystem stopped after {} steps ({:.2}s simulated)",
            self.steps,
            self.sim_time
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::RuntimeApp;
    use crate::test_support::{descriptor, serial};
    use ember_engine::{Engine, ExitStatus};
    use tempfile::tempdir;

    #[test]
    fn net_worker_echoes_every_datagram() {
        let _serial = serial();
        let dir = tempdir().unwrap();
        let app = RuntimeApp::new(Some(5), 1000.0);
        let mut engine = Engine::create(descriptor(dir.path()), Box::new(app)).unwrap();

        let worker = NetWorker::new(
            PluginSource::Linked {
                id: loopback::PLUGIN_ID.into(),
            },
            Some(1000.0),
        );
        let stats = worker.stats();
        engine.create_subsystem("net", Box::new(worker)).unwrap();

        assert_eq!(engine.exec(), 0);
        assert_eq!(engine.destroy(), 0);
        assert!(stats.sent() >= 1);
        assert_eq!(stats.sent(), stats.echoed());
    }

    #[test]
    fn unknown_net_plugin_fails_the_launch() {
        let _serial = serial();
        let dir = tempdir().unwrap();
        let app = RuntimeApp::new(Some(1), 1000.0);
        let mut engine = Engine::create(descriptor(dir.path()), Box::new(app)).unwrap();

        let worker = NetWorker::new(PluginSource::Linked { id: "quic".into() }, None);
        let stats = worker.stats();
        engine.create_subsystem("net", Box::new(worker)).unwrap();

        assert_eq!(engine.exec(), ExitStatus::LaunchFailed.code());
        engine.destroy();
        assert_eq!(stats.sent(), 0);
    }

    #[test]
    fn video_worker_counts_frames_until_destroyed() {
        let _serial = serial();
        let dir = tempdir().unwrap();
        let app = RuntimeApp::new(Some(3), 1000.0);
        let mut engine = Engine::create(descriptor(dir.path()), Box::new(app)).unwrap();

        let video = VideoWorker::new(Some(1000.0));
        let frames = video.frames();
        engine.create_subsystem("video", Box::new(video)).unwrap();
        engine
            .create_subsystem("game", Box::new(GameWorker::new(Some(1000.0))))
            .unwrap();

        assert_eq!(engine.exec(), 0);
        assert_eq!(engine.destroy(), 0);
        assert!(frames.load(Ordering::Relaxed) >= 1);
    }
}
