use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use courier_core::config::CourierConfig;
use courier_core::geo::{calculate_distance, initial_bearing, Coordinate};
use courier_core::geofence::OrderZones;
use courier_core::position::PositionSample;
use courier_core::routing::{build_route_service, RouteOptions, RouteProviderKind, VehicleProfile};
use courier_core::session::DeliveryTrackingSession;
use courier_core::tracker::{HttpLocationSink, LocationFeed, LocationTracker};
use tracing::{info, warn};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "courier",
    about = "Delivery location tracking and route quotes",
    long_about = "Distance and geofence checks, scored route quotes with a\n\
                  direct-line fallback, and replay of recorded driver tracks."
)]
struct Cli {
    /// JSON configuration file; missing fields keep their defaults
    #[arg(long, env = "COURIER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Great-circle distance and initial bearing between two points
    Distance {
        /// Origin as "lat,lng"
        from: Coordinate,
        /// Destination as "lat,lng"
        to: Coordinate,
    },
    /// Classify a point against an order's pickup and delivery zones
    Classify {
        /// Current position as "lat,lng"
        point: Coordinate,
        #[arg(long)]
        pickup: Option<Coordinate>,
        #[arg(long)]
        delivery: Option<Coordinate>,
        /// Zone radius in meters (defaults to the configured radius)
        #[arg(long)]
        radius: Option<f64>,
    },
    /// Fetch a scored route quote
    Route {
        from: Coordinate,
        to: Coordinate,
        #[arg(value_enum, long, default_value_t = Profile::Car)]
        profile: Profile,
        /// OSRM endpoint; replaces the configured provider chain
        #[arg(long, env = "COURIER_OSRM_URL")]
        osrm: Option<String>,
        /// Skip external providers and quote the direct line
        #[arg(long, conflicts_with = "osrm")]
        direct_only: bool,
    },
    /// Replay a JSON-lines track through a delivery tracking session
    Track {
        /// One position sample per line
        #[arg(long)]
        replay: PathBuf,
        #[arg(long)]
        pickup: Option<Coordinate>,
        #[arg(long)]
        delivery: Option<Coordinate>,
        #[arg(value_enum, long, default_value_t = Profile::Car)]
        profile: Profile,
        /// Delay between replayed samples
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    Car,
    Bike,
    Scooter,
    Van,
}

impl From<Profile> for VehicleProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Car => VehicleProfile::Car,
            Profile::Bike => VehicleProfile::Bike,
            Profile::Scooter => VehicleProfile::Scooter,
            Profile::Van => VehicleProfile::Van,
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<CourierConfig> {
    match path {
        Some(path) => CourierConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(CourierConfig::default()),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Read a recorded track. Samples are re-stamped on replay, so only their
/// order matters.
fn read_track(path: &PathBuf) -> Result<Vec<PositionSample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut samples = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: PositionSample = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid sample", path.display(), index + 1))?;
        samples.push(sample);
    }
    Ok(samples)
}

fn restamp(mut sample: PositionSample) -> PositionSample {
    sample.captured_at = Utc::now();
    sample
}

// ── commands ───────────────────────────────────────────────────────

fn distance(from: Coordinate, to: Coordinate) -> Result<()> {
    let km = calculate_distance(from, to)?;
    let bearing = initial_bearing(from, to)?;
    print_json(&serde_json::json!({
        "from": from,
        "to": to,
        "distance_km": km,
        "bearing_deg": bearing,
    }))
}

fn classify(
    config: &CourierConfig,
    point: Coordinate,
    pickup: Option<Coordinate>,
    delivery: Option<Coordinate>,
    radius: Option<f64>,
) -> Result<()> {
    let zones = OrderZones::around(pickup, delivery, radius.unwrap_or(config.geofence.radius_m))?;
    print_json(&serde_json::json!({
        "point": point,
        "proximity": zones.classify(point),
    }))
}

async fn route(
    mut config: CourierConfig,
    from: Coordinate,
    to: Coordinate,
    profile: Profile,
    osrm: Option<String>,
    direct_only: bool,
) -> Result<()> {
    if direct_only {
        config.routing.providers.clear();
    } else if let Some(endpoint) = osrm {
        config.routing.providers = vec![RouteProviderKind::Osrm { endpoint }];
    }
    let routes = build_route_service(&config.routing);
    let quote = routes
        .fetch_route(
            from,
            to,
            RouteOptions {
                vehicle_profile: profile.into(),
            },
        )
        .await?;
    if quote.fallback {
        warn!(provider = %quote.provider, "no routing provider answered, quoting the direct line");
    }
    print_json(&quote)
}

async fn track(
    config: CourierConfig,
    replay: PathBuf,
    pickup: Option<Coordinate>,
    delivery: Option<Coordinate>,
    profile: Profile,
    interval: Duration,
) -> Result<()> {
    let mut samples = read_track(&replay)?.into_iter();
    let Some(first) = samples.next() else {
        bail!("{} contains no samples", replay.display());
    };

    let zones = OrderZones::around(pickup, delivery, config.geofence.radius_m)?;
    let feed = LocationFeed::new();
    let provider = Arc::new(feed.clone());
    let tracker = match HttpLocationSink::from_config(&config.backend)? {
        Some(sink) => LocationTracker::with_sink(provider, Arc::new(sink), config.tracker.clone()),
        None => LocationTracker::new(provider, config.tracker.clone()),
    };
    let routes = Arc::new(build_route_service(&config.routing));
    let session = DeliveryTrackingSession::new(
        tracker,
        routes,
        zones,
        RouteOptions {
            vehicle_profile: profile.into(),
        },
        config.routing.fallback_speed_kmh,
    );

    feed.publish(restamp(first));
    session
        .start(|event| {
            if let Err(err) = print_json(&event) {
                warn!(error = %err, "failed to write event");
            }
        })
        .await?;

    let mut replayed = 1usize;
    for sample in samples {
        tokio::time::sleep(interval).await;
        feed.publish(restamp(sample));
        replayed += 1;
    }
    // Let the last route refresh land.
    tokio::time::sleep(interval.max(Duration::from_millis(50))).await;
    session.stop();
    info!(replayed, "replay finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Distance { from, to } => distance(from, to),
        Commands::Classify {
            point,
            pickup,
            delivery,
            radius,
        } => classify(&config, point, pickup, delivery, radius),
        Commands::Route {
            from,
            to,
            profile,
            osrm,
            direct_only,
        } => route(config, from, to, profile, osrm, direct_only).await,
        Commands::Track {
            replay,
            pickup,
            delivery,
            profile,
            interval_ms,
        } => {
            track(
                config,
                replay,
                pickup,
                delivery,
                profile,
                Duration::from_millis(interval_ms),
            )
            .await
        }
    }
}
