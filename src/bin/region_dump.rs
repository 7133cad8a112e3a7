use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use region_scene::definitions::{DefinitionStore, MemorySource};
use region_scene::landscape::Spawn;
use region_scene::{RegionLoader, RegionStats, SceneConfig};

#[derive(Serialize)]
struct Dump<'a> {
    stats: &'a RegionStats,
    spawns: &'a [Spawn],
}

struct Args {
    assets: PathBuf,
    terrain: PathBuf,
    landscape: PathBuf,
    base_x: i32,
    base_y: i32,
    config: Option<PathBuf>,
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  region-dump <asset_dir> <terrain_file> <landscape_file> <base_x> <base_y> [--config file.json]");
    eprintln!();
    eprintln!("asset_dir holds meshes/, objects/, underlays/ and overlays/ with one <id>.dat per entry.");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  region-dump ./cache ./m50_50 ./l50_50 3200 3200");
    eprintln!("  region-dump ./cache ./m50_50 ./l50_50 3200 3200 --config low.json");
    std::process::exit(1);
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 6 {
        usage();
    }
    let coord = |s: &str| -> i32 {
        s.parse().unwrap_or_else(|_| {
            eprintln!("Invalid coordinate '{}'", s);
            std::process::exit(1);
        })
    };

    let mut parsed = Args {
        assets: PathBuf::from(&args[1]),
        terrain: PathBuf::from(&args[2]),
        landscape: PathBuf::from(&args[3]),
        base_x: coord(&args[4]),
        base_y: coord(&args[5]),
        config: None,
    };
    let mut i = 6;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let Some(path) = args.get(i + 1) else {
                    eprintln!("--config requires a path");
                    std::process::exit(1);
                };
                parsed.config = Some(PathBuf::from(path));
                i += 2;
            }
            other => {
                eprintln!("Unknown argument '{}'", other);
                usage();
            }
        }
    }
    parsed
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    let source = MemorySource::load_dir(&args.assets)?;
    tracing::info!(
        meshes = source.meshes.len(),
        objects = source.objects.len(),
        "loaded assets"
    );
    let terrain = std::fs::read(&args.terrain)
        .with_context(|| format!("Failed to read terrain {}", args.terrain.display()))?;
    let landscape = std::fs::read(&args.landscape)
        .with_context(|| format!("Failed to read landscape {}", args.landscape.display()))?;

    let loader = RegionLoader::new(config, Arc::new(DefinitionStore::new(source)));
    let region = loader
        .load(args.base_x, args.base_y, &terrain, &landscape)
        .with_context(|| format!("Failed to decode region at {}, {}", args.base_x, args.base_y))?;

    let dump = Dump {
        stats: &region.stats,
        spawns: &region.spawns,
    };
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    if let Err(e) = run(&args) {
        eprintln!("region-dump failed: {:?}", e);
        std::process::exit(1);
    }
}
