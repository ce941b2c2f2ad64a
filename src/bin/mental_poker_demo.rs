use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use mental_poker::config::ProtocolConfig;
use mental_poker::ledger::{Address, Ledger, LedgerEvent, LobbyId, Wei};
use mental_poker::player::PlayerSession;
use mental_poker::proof_system::SigmaProofSystem;

const LOG_TARGET: &str = "bin::mental_poker_demo";

#[derive(Debug, Parser)]
#[command(name = "mental_poker_demo")]
#[command(about = "Play one proof-checked hand against an in-memory ledger", long_about = None)]
struct Args {
    /// Number of seats at the table
    #[arg(long, env = "DEMO_SEATS", default_value_t = 2)]
    seats: usize,

    /// Blind posted by every player, in wei
    #[arg(long, env = "DEMO_BLIND", default_value_t = 1_000)]
    blind: Wei,

    /// Raise opened by the last seat once hole cards are dealt, in wei
    #[arg(long, env = "DEMO_RAISE", default_value_t = 500)]
    raise: Wei,

    /// Everyone but the raiser folds instead of calling
    #[arg(long, env = "DEMO_FOLD", default_value_t = false)]
    fold: bool,

    /// Optional JSON protocol config; `seats` overrides its max_players
    #[arg(long, env = "DEMO_CONFIG")]
    config: Option<PathBuf>,

    /// Optional RNG seed for deterministic key shares, shuffles and proofs
    #[arg(long, env = "DEMO_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "DEMO_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json)?;
    let config = build_config(&args).context("failed to build protocol config")?;
    run_hand(args, config).await
}

fn load_dotenv() {
    let manifest_env_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<ProtocolConfig> {
    let mut config = match &args.config {
        Some(path) => ProtocolConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ProtocolConfig::default(),
    };
    config.max_players = args.seats;
    config.validate()?;
    Ok(config)
}

fn seat_address(seat: usize) -> Address {
    Address::from_low_u64(0x1000 + seat as u64)
}

fn spawn_event_printer(mut rx: broadcast::Receiver<LedgerEvent>) -> tokio::task::JoinHandle<()> {
    let span = tracing::info_span!("task", task_name = "event_printer");
    tokio::spawn(
        async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => println!("{json}"),
                        Err(err) => warn!(target: LOG_TARGET, error = %err, "unprintable event"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: LOG_TARGET, skipped, "event printer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        .instrument(span),
    )
}

/// Every seat contributes its key share concurrently; stale submissions retry.
async fn contribute_keys(
    sessions: Vec<PlayerSession>,
    lobby: LobbyId,
) -> Result<Vec<PlayerSession>> {
    let mut tasks = JoinSet::new();
    for (seat, mut session) in sessions.into_iter().enumerate() {
        tasks.spawn(async move {
            let result = session.contribute_key(lobby).await;
            (seat, session, result)
        });
    }
    let mut seated = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (seat, session, result) = joined?;
        result.with_context(|| format!("seat {seat} failed to contribute its key"))?;
        seated.push((seat, session));
    }
    seated.sort_by_key(|(seat, _)| *seat);
    Ok(seated.into_iter().map(|(_, session)| session).collect())
}

async fn run_hand(args: Args, config: ProtocolConfig) -> Result<()> {
    let system = Arc::new(match args.rng_seed {
        Some(seed) => SigmaProofSystem::with_seed(config.shuffle_rounds, seed),
        None => SigmaProofSystem::new(config.shuffle_rounds),
    });
    let ledger = Arc::new(Ledger::new(config, system.clone())?);
    let printer = spawn_event_printer(ledger.subscribe());

    let sessions = (0..args.seats)
        .map(|seat| {
            let rng = match args.rng_seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(seat as u64 + 1)),
                None => StdRng::from_entropy(),
            };
            PlayerSession::with_rng(seat_address(seat), ledger.clone(), system.clone(), rng)
        })
        .collect::<Vec<_>>();
    let creator = seat_address(0);

    let lobby = ledger.create_new_game(creator, args.blind)?;
    for session in &sessions[1..] {
        ledger.join_game(session.address(), lobby, args.blind)?;
    }
    let sessions = contribute_keys(sessions, lobby).await?;
    ledger.start_game(creator, lobby)?;

    for session in &sessions {
        let hash = session.shuffle(lobby).await?;
        info!(target: LOG_TARGET, player = %session.address(), deck = %hash, "shuffle accepted");
    }
    for session in &sessions {
        session.deal_hole_cards_to_opponents(lobby).await?;
    }
    for session in &sessions {
        let [first, second] = session.peek_own_hole_cards(lobby).await?;
        info!(target: LOG_TARGET, player = %session.address(), %first, %second, "hole cards");
    }

    let raiser = sessions
        .last()
        .ok_or_else(|| anyhow!("table has no seats"))?
        .address();
    ledger.raise(raiser, lobby, args.raise)?;
    for session in sessions.iter().filter(|s| s.address() != raiser) {
        if args.fold {
            ledger.fold(session.address(), lobby)?;
        } else {
            ledger.raise(session.address(), lobby, args.raise)?;
        }
    }

    if !args.fold {
        for session in &sessions {
            for card in session.deal_board(lobby).await? {
                info!(target: LOG_TARGET, %card, "board card opened");
            }
        }
        for session in &sessions {
            session.open_own_hole_cards(lobby).await?;
        }
        ledger.settle(lobby)?;
    }

    for session in &sessions {
        let amount = ledger.withdraw(session.address())?;
        info!(target: LOG_TARGET, player = %session.address(), amount, "withdrawn");
    }

    let view = ledger.lobby_view(lobby)?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    drop(ledger);
    drop(sessions);
    if let Err(err) = printer.await {
        warn!(target: LOG_TARGET, error = %err, "event printer exited abnormally");
    }
    Ok(())
}
