//! LOTTERY: round-based lottery ledger service.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores state from disk (or creates fresh), starts the HTTP API and
//! runs the keeper loop that closes expired rounds, with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use lottery::api::{self, ApiState};
use lottery::clock::{Clock, SystemClock};
use lottery::config;
use lottery::engine::accountant::Accountant;
use lottery::engine::keeper::run_keeper_tick;
use lottery::engine::LotteryService;
use lottery::entropy::{EntropySource, FixedEntropy, RecentHistoryEntropy};
use lottery::funding::NativeVault;
use lottery::storage::{self, Snapshot};
use lottery::types::AccountId;

const BANNER: &str = r#"
 _     ___ _____ _____ _____ ______   __
| |   / _ \_   _|_   _| ____|  _ \ \ / /
| |  | | | || |   | | |  _| | |_) \ V /
| |__| |_| || |   | | | |___|  _ < | |
|_____\___/ |_|   |_| |_____|_| \_\|_|

  Round-based lottery ledger
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        token = %cfg.lottery.token_symbol,
        purchase_ratio = cfg.lottery.purchase_ratio,
        bet_price = cfg.lottery.bet_price,
        bet_fee = cfg.lottery.bet_fee,
        "LOTTERY starting up"
    );

    // -- Restore or create state -----------------------------------------

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state_file = cfg.storage.state_file.clone();

    let lottery = match storage::load_state(Some(&state_file))? {
        Some(snapshot) => {
            let lottery = snapshot.restore(make_entropy(&cfg), clock.clone())?;
            for field in cfg.lottery.drift_from(&lottery.settings(), lottery.admin()) {
                warn!(%field, "config.toml differs from saved state; saved value kept");
            }
            info!(
                bets_open = lottery.bets_open(),
                slots = lottery.slot_count(),
                rounds_closed = lottery.rounds_closed(),
                "Resumed from saved state"
            );
            lottery
        }
        None => {
            let lottery = LotteryService::with_new_token(
                &cfg.lottery.token_name,
                &cfg.lottery.token_symbol,
                cfg.lottery.settings(),
                cfg.lottery.admin_account()?,
                NativeVault::new(),
                make_entropy(&cfg),
                clock.clone(),
            )?;
            info!(admin = %lottery.admin(), custody = %lottery.custody(), "Fresh start");
            lottery
        }
    };

    let report = Accountant::reconcile(&lottery);
    if !report.is_balanced() {
        warn!(surplus = report.custody_surplus(), "Restored state does not reconcile");
    }

    let state = Arc::new(ApiState::new(lottery, Some(state_file.clone())));

    // -- HTTP API -------------------------------------------------------

    if cfg.server.enabled {
        api::spawn_server(state.clone(), cfg.server.port).await?;
    } else {
        info!("API server disabled");
    }

    // -- Keeper loop ----------------------------------------------------

    let closer = AccountId::from(cfg.keeper.closer.as_str());
    let mut interval = tokio::time::interval(Duration::from_secs(cfg.keeper.interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        keeper = cfg.keeper.enabled,
        interval_secs = cfg.keeper.interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick(), if cfg.keeper.enabled => {
                let mut lottery = state.lottery.lock().await;
                if run_keeper_tick(&mut lottery, &closer).is_some() {
                    if let Err(e) = storage::save_state(&Snapshot::capture(&lottery), Some(&state_file)) {
                        error!(error = %e, "Failed to save state");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Save final state
    let lottery = state.lottery.lock().await;
    storage::save_state(&Snapshot::capture(&lottery), Some(&state_file))?;
    info!(
        rounds_closed = lottery.rounds_closed(),
        prize_pool = lottery.prize_pool(),
        owner_pool = lottery.owner_pool(),
        "LOTTERY shut down cleanly."
    );

    Ok(())
}

/// Pick the winner-selection source from config.
fn make_entropy(cfg: &config::AppConfig) -> Box<dyn EntropySource> {
    match cfg.lottery.fixed_entropy {
        Some(value) => {
            warn!(value, "Using fixed entropy, winners are fully predictable");
            Box::new(FixedEntropy(value))
        }
        None => Box::new(RecentHistoryEntropy),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lottery=info"));

    let json_logging = std::env::var("LOTTERY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
