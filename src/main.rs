//! Main entry point for the War Room matchmaking core
//!
//! Runs a matcher for one matching domain against a synthetic stream of
//! solo players and premade squads, logs every completed room, and shuts
//! down gracefully on Ctrl+C or after a fixed duration.

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, error, info, warn};
use war_room::config::{AppConfig, ReloadableConfigProvider};
use war_room::matcher::{ChannelRoomSink, Matcher, MatcherOptions};
use war_room::metrics::MetricsCollector;
use war_room::rating::{RatedPlayer, SquadRules};
use war_room::squad::{Group, PartyGroup, Room};
use war_room::types::PlayerRating;
use war_room::utils::{Clock, SystemClock};

/// War Room - rating-aware squad and room matchmaking
#[derive(Parser)]
#[command(
    name = "war-room",
    version,
    about = "A rating-aware squad and room matchmaking core with dual-queue scheduling",
    long_about = "War Room groups queued players into teams and teams into rooms using \
                 Glicko-2 MMR and a wait-time fairness ladder. Premade squads wait in their \
                 own queue until their wait budget runs out. This binary drives a matcher \
                 with a synthetic player stream."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Matching tick override
    #[arg(long, value_name = "MS", help = "Override the matching tick in milliseconds")]
    tick_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long, value_name = "SECONDS")]
    duration: Option<u64>,

    /// Synthetic groups submitted per second
    #[arg(long, default_value_t = 20)]
    groups_per_sec: u32,

    /// Share of synthetic groups that are full premade squads
    #[arg(long, default_value_t = 0.2)]
    squad_ratio: f64,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting the matcher"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(tick_ms) = args.tick_ms {
        config.matching.tick_interval_ms = tick_ms;
    }

    war_room::config::validate_config(&config)?;
    Ok(config)
}

/// Display startup banner with matcher information
fn display_startup_banner(config: &AppConfig) {
    let matching = &config.matching;
    info!("War Room matchmaking core");
    info!("   Service: {}", config.service.name);
    info!("   Domain: {}", config.domain());
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Squad size: {}, sides per room: {}",
        matching.squad_player_limit, matching.room_side_count
    );
    info!("   Match timeout: {}s", matching.match_timeout_sec);
    info!(
        "   Team wait budget: {}s / {}s / {}s",
        matching.normal_team_wait_time_sec,
        matching.unfriendly_team_wait_time_sec,
        matching.malicious_team_wait_time_sec
    );
    info!("   Tick: {}ms", matching.tick_interval_ms);
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Re-read the config file on SIGHUP when one was given
#[cfg(unix)]
fn spawn_config_reloader(args: &Args, provider: &Arc<ReloadableConfigProvider>) {
    if let Some(path) = args.config.clone() {
        tokio::spawn(reload_on_hangup(path, args.tick_ms, provider.clone()));
    }
}

#[cfg(not(unix))]
fn spawn_config_reloader(_args: &Args, _provider: &Arc<ReloadableConfigProvider>) {}

#[cfg(unix)]
async fn reload_on_hangup(
    args_path: PathBuf,
    tick_ms: Option<u64>,
    provider: Arc<ReloadableConfigProvider>,
) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!("Config reload on SIGHUP unavailable: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        let reloaded = AppConfig::from_file(&args_path).and_then(|mut config| {
            if let Some(tick_ms) = tick_ms {
                config.matching.tick_interval_ms = tick_ms;
            }
            provider.update(config.matching)
        });
        match reloaded {
            Ok(()) => info!("Reloaded {}", args_path.display()),
            Err(e) => warn!("Ignoring invalid config {}: {}", args_path.display(), e),
        }
    }
}

/// Build one synthetic group: a solo player or a full squad
fn synthetic_group(seq: u64, squad_size: usize, squad_ratio: f64) -> Result<Arc<dyn Group>> {
    let mut rng = rand::thread_rng();
    let now = SystemClock.now_secs();
    let size = if rng.gen_bool(squad_ratio.clamp(0.0, 1.0)) {
        squad_size
    } else {
        1
    };

    let base: f64 = rng.gen_range(900.0..2100.0);
    // A few squads carry a much stronger friend
    let carry = size > 1 && rng.gen_bool(0.1);
    let players = (0..size)
        .map(|i| {
            let offset = if carry && i == 0 {
                rng.gen_range(600.0..1200.0)
            } else {
                rng.gen_range(-60.0..60.0)
            };
            let rating = PlayerRating {
                rating: base + offset,
                deviation: rng.gen_range(50.0..350.0),
                volatility: 0.06,
            };
            RatedPlayer::new(format!("p{}-{}", seq, i), rating, now).star(rng.gen_range(0..10))
        })
        .collect();

    let group = PartyGroup::new(format!("g{}", seq), players)?
        .newcomer(rng.gen_bool(0.1))
        .bot_fill_after(90);
    Ok(Arc::new(group))
}

/// Feed synthetic groups into the matcher until it closes
async fn produce_groups(matcher: Arc<Matcher>, groups_per_sec: u32, squad_ratio: f64) {
    let mut ticker = interval(Duration::from_millis(100));
    let per_tick = (groups_per_sec as f64 / 10.0).max(0.0);
    let mut owed = 0.0;
    let mut seq = 0u64;

    loop {
        ticker.tick().await;
        let squad_size = match matcher.config() {
            Ok(config) => config.squad_player_limit,
            Err(e) => {
                error!("Producer cannot read configuration: {}", e);
                return;
            }
        };

        owed += per_tick;
        let mut batch = Vec::new();
        while owed >= 1.0 {
            owed -= 1.0;
            seq += 1;
            match synthetic_group(seq, squad_size, squad_ratio) {
                Ok(group) => batch.push(group),
                Err(e) => warn!("Skipping synthetic group {}: {}", seq, e),
            }
        }
        if batch.is_empty() {
            continue;
        }

        if let Err(e) = matcher.add_groups(batch) {
            if war_room::error::is_queue_closed(&e) {
                debug!("Producer stopping, matcher closed");
                return;
            }
            warn!("Failed to submit groups: {}", e);
        }
    }
}

/// Log completed rooms as they arrive
async fn consume_rooms(mut rooms: mpsc::Receiver<Box<dyn Room>>, rules: SquadRules) {
    while let Some(room) = rooms.recv().await {
        match serde_json::to_string(&room.summary(&rules)) {
            Ok(summary) => info!("Room ready: {}", summary),
            Err(e) => warn!("Failed to serialize room {}: {}", room.id(), e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting the matcher");
        return Ok(());
    }

    display_startup_banner(&config);

    let provider = Arc::new(ReloadableConfigProvider::new(config.matching.clone())?);
    spawn_config_reloader(&args, &provider);

    let metrics = Arc::new(MetricsCollector::new()?);
    let (sink, rooms) = ChannelRoomSink::new(config.service.result_buffer_size);
    let matcher = Arc::new(Matcher::with_options(
        config.domain(),
        provider,
        Arc::new(sink),
        MatcherOptions {
            metrics: Some(metrics.clone()),
            error_buffer_size: config.service.error_buffer_size,
            ..MatcherOptions::default()
        },
    )?);

    let consumer = tokio::spawn(consume_rooms(rooms, config.matching.squad_rules()));
    if let Some(mut errors) = matcher.take_error_receiver() {
        tokio::spawn(async move {
            while let Some(err) = errors.recv().await {
                warn!("Recovered cycle failure: {}", err);
            }
        });
    }

    matcher.start()?;
    let producer = tokio::spawn(produce_groups(
        matcher.clone(),
        args.groups_per_sec,
        args.squad_ratio,
    ));

    info!("War Room matcher is running");
    match args.duration {
        Some(seconds) => {
            info!("Running for {}s...", seconds);
            tokio::select! {
                _ = sleep(Duration::from_secs(seconds)) => info!("Run duration elapsed"),
                _ = wait_for_shutdown_signal() => {},
            }
        }
        None => {
            info!("Press Ctrl+C to shutdown gracefully...");
            wait_for_shutdown_signal().await;
        }
    }

    info!("Shutdown requested, stopping matcher...");
    match tokio::time::timeout(config.shutdown_timeout(), matcher.stop()).await {
        Ok(Ok(cancelled)) => info!("Matcher stopped, {} groups cancelled", cancelled),
        Ok(Err(e)) => error!("Matcher failed to stop cleanly: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }
    producer.abort();

    // Let in-flight publishes land before the consumer goes away
    sleep(Duration::from_millis(100)).await;
    consumer.abort();

    let stats = matcher.get_stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    let wait_stats = matcher.wait_stats()?;
    for (key, stats) in &wait_stats {
        println!(
            "{} queue {:?}: {}",
            key.queue,
            key.outcome,
            serde_json::to_string(stats)?
        );
    }
    print!("{}", metrics.render()?);

    info!("War Room matcher stopped");
    Ok(())
}
