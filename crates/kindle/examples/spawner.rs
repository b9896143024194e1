//! Spawner — a headless scene that clones a loaded prefab on a timer.
//!
//! A `Spawner` component starts a coroutine that waits half a second, clones
//! the inactive "orb" prefab at a new position, and repeats. Each orb spins
//! and destroys itself when its `Lifetime` runs out. A console renderer logs
//! the node count once a second, and the final diagnostics snapshot is
//! printed as JSON.
//!
//! Run with: `RUST_LOG=info cargo run -p kindle --example spawner`

use std::time::Duration;

use kindle::prelude::*;
use serde::{Deserialize, Serialize};

const ORB: &str = r#"{
    "name": "orb",
    "guid": "orb-prefab",
    "active": false,
    "components": [
        { "type": "Spin", "data": { "speed": 3.0 } },
        { "type": "Lifetime", "data": { "seconds": 1.5 } }
    ],
    "children": [{ "name": "glow" }]
}"#;

// ── Components ───────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
struct Spin {
    speed: f32,
}

impl Component for Spin {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn update(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        let angle = self.speed * cx.time().delta_secs();
        let node = cx.node();
        if let Some(node) = cx.graph_mut().node_mut(node) {
            node.transform.rotation *= Quat::from_rotation_y(angle);
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct Lifetime {
    seconds: f32,
}

impl Component for Lifetime {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn update(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.seconds -= cx.time().delta_secs();
        if self.seconds <= 0.0 {
            let node = cx.node();
            cx.destroy_deferred(node);
        }
        Ok(())
    }

    fn on_destroy(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        log::info!("orb {} expired", cx.node());
        Ok(())
    }
}

#[derive(Clone)]
struct Spawner {
    prefab: NodeId,
    count: u32,
    interval: f32,
}

impl Component for Spawner {
    fn start(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        let Spawner {
            prefab,
            count,
            interval,
        } = self.clone();
        let mut spawned = 0;
        let mut waited = false;

        cx.start_coroutine(FramePhase::Update, move |cx: &mut ComponentCx<'_>| {
            if !waited {
                waited = true;
                return Step::call(wait_seconds(interval));
            }
            waited = false;
            spawned += 1;

            let options = InstantiateOptions::new()
                .unparented()
                .visible(true)
                .position(Vec3::new(spawned as f32, 0.0, 0.0));
            match cx.instantiate(prefab, options) {
                Ok(orb) => log::info!("spawned orb #{spawned} as {orb}"),
                Err(err) => log::warn!("spawn failed: {err}"),
            }

            if spawned >= count { Step::Complete } else { Step::Yield }
        });
        Ok(())
    }
}

// ── Backend ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct ConsoleRenderer {
    frames: u64,
}

impl RenderBackend for ConsoleRenderer {
    fn render(&mut self, graph: &SceneGraph) {
        self.frames += 1;
        if self.frames % 60 == 0 {
            log::info!("frame {}: {} node(s)", self.frames, graph.len());
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut ctx = Context::with_config(ContextConfig::default().max_delta_secs(1.0 / 30.0));
    ctx.set_renderer(ConsoleRenderer::default());

    let mut loader = JsonSceneLoader::new();
    loader.register::<Spin>();
    loader.register::<Lifetime>();
    loader.add_source("orb", ORB);
    let orb = ctx.load(&mut loader, "orb")?;

    let spawner = ctx.graph_mut().spawn("spawner");
    ctx.add_component(
        spawner,
        Spawner {
            prefab: orb,
            count: 6,
            interval: 0.5,
        },
    );

    for _ in 0..300 {
        ctx.tick_with_delta(Duration::from_millis(16));
    }

    println!("{}", ctx.diagnostics().to_json()?);
    Ok(())
}
