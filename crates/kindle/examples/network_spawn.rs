//! Network Spawn — two peers in one process replicating clones.
//!
//! Both peers load the same "crate" prefab. Peer A clones it three times
//! with `sync_instantiate`; peer B replays each clone from the seed in the
//! message and ends up with identical guids. A then destroys one clone with
//! `sync_destroy` and B follows.
//!
//! Run with: `RUST_LOG=debug cargo run -p kindle --example network_spawn`

use std::time::Duration;

use kindle::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

const CRATE: &str = r#"{
    "name": "crate",
    "guid": "crate-prefab",
    "components": [{ "type": "Health", "data": { "points": 10 } }],
    "children": [{ "name": "lid" }, { "name": "hinge" }]
}"#;

const FRAME: Duration = Duration::from_millis(16);

#[derive(Clone, Serialize, Deserialize)]
struct Health {
    points: u32,
}

impl Component for Health {}

fn peer(hub: &MemoryHub) -> Result<(Context, NodeId), LoadError> {
    let mut loader = JsonSceneLoader::new();
    loader.register::<Health>();
    loader.add_source("crate", CRATE);

    let mut ctx = Context::new();
    ctx.enable_networking(hub.connect());
    let prefab = ctx.load(&mut loader, "crate")?;
    Ok((ctx, prefab))
}

fn guids(ctx: &Context, root: NodeId) -> Vec<String> {
    ctx.graph()
        .descendants(root)
        .into_iter()
        .filter_map(|node| ctx.graph().node(node))
        .map(|node| node.guid().to_string())
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let hub = MemoryHub::new();
    let (mut a, prefab_a) = peer(&hub)?;
    let (mut b, _) = peer(&hub)?;

    let mut clones = Vec::new();
    for i in 0..3 {
        let options = InstantiateOptions::new().position(Vec3::new(i as f32 * 2.0, 0.0, 0.0));
        let clone = a.sync_instantiate_with_data(prefab_a, options, Some(json!({ "spawnedBy": "a", "index": i })))?;
        clones.push(clone);
    }
    a.tick_with_delta(FRAME);
    b.tick_with_delta(FRAME);

    for &clone in &clones {
        let on_a = guids(&a, clone);
        let root_guid = Guid::new(on_a[0].clone());
        let on_b = b
            .graph()
            .find_by_guid(&root_guid)
            .map(|node| guids(&b, node))
            .unwrap_or_default();
        println!("A {on_a:?}");
        println!("B {on_b:?}  host data {:?}", b.remote_host_data(&root_guid));
        assert_eq!(on_a, on_b);
    }

    a.sync_destroy(clones[0])?;
    a.tick_with_delta(FRAME);
    b.tick_with_delta(FRAME);
    println!("after destroy: A has {} nodes, B has {} nodes", a.graph().len(), b.graph().len());
    Ok(())
}
