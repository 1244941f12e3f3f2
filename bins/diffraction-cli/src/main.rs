//! diffraction: command-line host for a Diffraction ledger.
//!
//! Opens the RocksDB-backed ledger described by the configuration and runs a
//! single command against it, or streams transfer events from stdin.

mod stream;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use diffraction_core::account::AccountName;
use diffraction_core::asset::{Amount, Athena, Eos, RawAsset};
use diffraction_core::auth::SingleAuthority;
use diffraction_core::error::DiffractionError;
use diffraction_core::state::{DistributionState, Phase};
use diffraction_core::transfer::TransferNotice;
use diffraction_engine::{RateEngine, RoundSchedule, input_to_exhaust};
use diffraction_node_lib::{DepositDisposition, Ledger, NodeConfig, RocksStore};

type HostLedger = Ledger<RocksStore, SingleAuthority>;

/// Diffraction ledger host.
#[derive(Parser)]
#[command(name = "diffraction")]
#[command(version, about = "Tiered, decaying-rate token distribution ledger")]
struct Cli {
    /// Configuration file (TOML, JSON, or YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding the configuration.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overriding the configuration.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json").
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the distribution state.
    Status(JsonArgs),
    /// Preview a deposit without committing it.
    Quote(QuoteArgs),
    /// Submit a deposit notice.
    Deposit(DepositArgs),
    /// Open the ledger for deposits.
    Start(AdminArgs),
    /// Close the ledger to deposits.
    Stop(AdminArgs),
    /// Reinitialize the ledger.
    Reset(AdminArgs),
    /// List queued transfer instructions.
    Outbox(OutboxArgs),
    /// Print the remaining round schedule.
    Schedule(ScheduleArgs),
    /// Process JSON-lines events from stdin until EOF or Ctrl+C.
    Run(RunArgs),
}

#[derive(Args)]
struct JsonArgs {
    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct QuoteArgs {
    /// Input quantity, e.g. "10.0000 EOS".
    quantity: String,

    #[command(flatten)]
    output: JsonArgs,
}

#[derive(Args)]
struct DepositArgs {
    /// Depositing account.
    #[arg(long)]
    from: String,

    /// Input quantity, e.g. "10.0000 EOS".
    quantity: String,

    /// Transfer memo.
    #[arg(long, default_value = "")]
    memo: String,

    #[command(flatten)]
    output: JsonArgs,
}

#[derive(Args)]
struct AdminArgs {
    /// Account authorizing the command (default: the ledger account).
    #[arg(long = "as")]
    caller: Option<String>,
}

#[derive(Args)]
struct OutboxArgs {
    /// Remove every queued instruction after listing.
    #[arg(long)]
    clear: bool,

    #[command(flatten)]
    output: JsonArgs,
}

#[derive(Args)]
struct ScheduleArgs {
    /// Maximum number of rounds to print.
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args)]
struct RunArgs {
    /// Capacity of the event queue between stdin and the ledger.
    #[arg(long, default_value_t = 1024)]
    queue: usize,
}

/// `status --json` payload.
#[derive(Serialize)]
struct StatusReport {
    ledger: AccountName,
    phase: Phase,
    final_round: u32,
    remaining_supply: Amount<Athena>,
    input_to_exhaust: Amount<Eos>,
    state: DistributionState,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = NodeConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_logging(&config.log_level, &cli.log_format);

    let ledger = open_ledger(&config)?;

    match cli.command {
        Commands::Status(args) => status(&ledger, args),
        Commands::Quote(args) => quote(&ledger, args),
        Commands::Deposit(args) => deposit(&ledger, args),
        Commands::Start(args) => admin(&ledger, args, HostLedger::activate),
        Commands::Stop(args) => admin(&ledger, args, HostLedger::deactivate),
        Commands::Reset(args) => admin(&ledger, args, HostLedger::reset),
        Commands::Outbox(args) => outbox(&ledger, args),
        Commands::Schedule(args) => schedule(&ledger, args),
        Commands::Run(args) => stream::run(ledger, args.queue).await,
    }
}

fn open_ledger(config: &NodeConfig) -> Result<HostLedger> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;

    let engine = RateEngine::with_params(config.params).context("invalid distribution parameters")?;
    let store = RocksStore::open(config.db_path(), &config.params)
        .with_context(|| format!("failed to open ledger at {}", config.db_path().display()))?;
    let accounts = config.accounts();
    let access = SingleAuthority::new(accounts.ledger.clone());

    info!(ledger = %accounts.ledger, db = %config.db_path().display(), "ledger opened");
    Ok(Ledger::new(accounts, engine, store, access))
}

fn status(ledger: &HostLedger, args: JsonArgs) -> Result<()> {
    let state = ledger.state()?;
    let params = ledger.params();
    let report = StatusReport {
        ledger: ledger.accounts().ledger.clone(),
        phase: state.phase(),
        final_round: params.final_round(),
        remaining_supply: state.remaining_supply(params),
        input_to_exhaust: Amount::new(input_to_exhaust(params, &state)),
        state,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let s = &report.state;
    println!("Ledger:           {}", report.ledger);
    println!("Phase:            {:?}", report.phase);
    println!("Round:            {} / {}", s.round, report.final_round);
    println!("Rate:             {:.6} ATHENA per EOS", s.rate);
    println!("Round remaining:  {}", s.round_remain);
    println!("Total issued:     {} / {}", s.total_issued, Amount::<Athena>::new(params.send_limit));
    println!("Total received:   {}", s.total_received);
    println!("Supply remaining: {}", report.remaining_supply);
    println!("To exhaust:       ~{}", report.input_to_exhaust);
    Ok(())
}

fn quote(ledger: &HostLedger, args: QuoteArgs) -> Result<()> {
    let deposit = parse_quantity(&args.quantity)?;
    let outcome = ledger.quote(deposit)?;

    if args.output.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("Deposit:        {deposit}");
    println!("Issued:         {}", outcome.issued);
    println!("Refund:         {}", outcome.refund);
    println!("Rounds crossed: {}", outcome.rounds_crossed);
    println!("Ending round:   {}", outcome.next_state.round);
    if outcome.completed() {
        println!("This deposit would close the distribution.");
    }
    if !ledger.state()?.available {
        println!("Note: the ledger is not accepting deposits.");
    }
    Ok(())
}

fn deposit(ledger: &HostLedger, args: DepositArgs) -> Result<()> {
    let notice = TransferNotice {
        contract: ledger.accounts().input_contract.clone(),
        from: args.from.parse::<AccountName>().context("invalid depositor account")?,
        to: ledger.accounts().ledger.clone(),
        quantity: args.quantity.parse::<RawAsset>().context("invalid quantity")?,
        memo: args.memo,
    };

    let receipt = match ledger.on_transfer(&notice).context("deposit rejected")? {
        DepositDisposition::Accepted(receipt) => receipt,
        DepositDisposition::Ignored => {
            println!("Transfer ignored.");
            return Ok(());
        }
    };

    if args.output.json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    println!("\n=== DEPOSIT ACCEPTED ===");
    println!("Depositor: {}", receipt.depositor);
    println!("Deposit:   {}", receipt.deposit);
    println!("Issued:    {}", receipt.issued);
    if !receipt.refund.is_zero() {
        println!("Refund:    {}", receipt.refund);
    }
    println!("Round:     {} (crossed {})", receipt.state.round, receipt.rounds_crossed);
    if !receipt.state.available {
        println!("\nThe distribution is now closed.");
    }
    Ok(())
}

fn admin(
    ledger: &HostLedger,
    args: AdminArgs,
    action: fn(&HostLedger, &AccountName) -> Result<DistributionState, DiffractionError>,
) -> Result<()> {
    let caller = match args.caller {
        Some(name) => name.parse::<AccountName>().context("invalid caller account")?,
        None => ledger.accounts().ledger.clone(),
    };
    let state = action(ledger, &caller)?;
    println!("Phase: {:?}  Round: {}  Issued: {}", state.phase(), state.round, state.total_issued);
    Ok(())
}

fn outbox(ledger: &HostLedger, args: OutboxArgs) -> Result<()> {
    let (entries, cleared) = ledger.inspect(|store| -> Result<_> {
        let entries = store.outbox()?;
        let cleared = if args.clear { store.clear_outbox()? } else { 0 };
        Ok((entries, cleared))
    })?;

    if args.output.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("Outbox is empty.");
    } else {
        for e in &entries {
            println!(
                "#{:<6} {}  {:<12} -> {:<12} {:>24}  \"{}\"",
                e.seq,
                e.queued_at.format("%Y-%m-%d %H:%M:%S"),
                e.instruction.contract().as_str(),
                e.instruction.recipient().as_str(),
                e.instruction.raw_quantity().to_string(),
                e.instruction.memo(),
            );
        }
    }
    if args.clear {
        eprintln!("Cleared {cleared} entries.");
    }
    Ok(())
}

fn schedule(ledger: &HostLedger, args: ScheduleArgs) -> Result<()> {
    let state = ledger.state()?;
    println!("{:>6}  {:>24}  {:>12}  {:>20}", "round", "capacity", "rate", "input to fill");
    for info in RoundSchedule::from_state(ledger.params(), &state).take(args.limit) {
        println!(
            "{:>6}  {:>24}  {:>12.6}  {:>20}",
            info.round,
            info.capacity.to_string(),
            info.rate,
            Amount::<Eos>::new(info.input_cost().ceil() as u64).to_string(),
        );
    }
    Ok(())
}

fn parse_quantity(s: &str) -> Result<Amount<Eos>> {
    let raw: RawAsset = s.parse().context("invalid quantity")?;
    raw.to_amount::<Eos>().context("invalid deposit quantity")
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
/// Pass `format = "json"` for structured JSON output; any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
