mod arcs;
mod colors;
mod config;
mod demo;
mod event;
mod geo;
mod globe;
mod settings;
mod stats;
mod stream;
mod terminal;
mod view;

use clap::Parser;
use std::io;
use std::time::Instant;

use config::GlobeConfig;
use demo::DemoFeed;
use geo::{BorderSet, GeoResolver};
use settings::Settings;
use stream::{StreamConnectionManager, WsDialer};
use terminal::Terminal;

#[derive(Parser)]
#[command(name = "netglobe")]
#[command(version = "0.1.0")]
#[command(about = "Live network-attack map on a terminal globe", long_about = None)]
struct Cli {
    /// Feed endpoint URL; repeat for fallback candidates, tried in order
    #[arg(short, long)]
    endpoint: Vec<String>,

    /// Country-centroid JSON (path or URL)
    #[arg(long)]
    centroids: Option<String>,

    /// Border polyline JSON (path or URL)
    #[arg(long)]
    borders: Option<String>,

    /// Seconds per frame
    #[arg(short, long, default_value = "0.03")]
    time: f32,

    /// Countries ranked in the KPI panel
    #[arg(long, default_value = "5")]
    top: usize,

    /// Run against a synthetic local feed instead of connecting
    #[arg(long)]
    demo: bool,

    /// Random seed for the demo feed
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load();

    let centroid_source = cli
        .centroids
        .or(settings.data.centroids)
        .ok_or_else(|| missing("--centroids <path-or-url> (or data.centroids in config.toml)"))?;
    let border_source = cli
        .borders
        .or(settings.data.borders)
        .ok_or_else(|| missing("--borders <path-or-url> (or data.borders in config.toml)"))?;

    // Reference data is a hard requirement; the map is useless without it.
    let resolver = GeoResolver::load(&centroid_source)?;
    let borders = BorderSet::load(&border_source)?;

    let mut endpoints = cli.endpoint;
    if endpoints.is_empty() {
        endpoints = settings.feed.endpoints;
    }

    let use_demo = cli.demo || endpoints.is_empty();
    if use_demo && !cli.demo {
        eprintln!("netglobe: no endpoints configured, falling back to demo feed");
    }

    let cfg = GlobeConfig {
        frame_time: cli.time.max(0.001),
        top_n: cli.top.max(1),
        demo: use_demo,
        seed: cli.seed,
    };

    let manager = if use_demo {
        None
    } else {
        let mut mgr = StreamConnectionManager::new(WsDialer, Default::default());
        mgr.connect(endpoints, Instant::now());
        Some(mgr)
    };
    let demo_feed = if use_demo {
        Some(DemoFeed::new(cfg.seed, &resolver, Instant::now()))
    } else {
        None
    };

    let mut term = Terminal::new()?;
    globe::run(&mut term, &cfg, &resolver, &borders, manager, demo_feed)
}

fn missing(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("missing {}", what))
}
