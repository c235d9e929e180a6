//! uplined - commission engine daemon and operator tool

mod watcher;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use upline_commission::{AdminCommissionRequest, CommissionEngine, SaleEvent, Scheduler};
use upline_core::{
    Amount, Category, EngineConfig, HeldFilter, Member, MemberDirectory, MemberId, PackageTier,
};

#[derive(Parser)]
#[command(name = "uplined")]
#[command(about = "Upline commission engine", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "upline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler daemon until interrupted
    Run,

    /// Distribute commissions for one sale
    Distribute {
        buyer: String,
        amount: Amount,
        /// Idempotency reference for the sale
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        package: Option<String>,
    },

    /// Package commission triggered by an operator
    AdminCommission {
        source: String,
        package: String,
        amount: Amount,
        #[arg(long, default_value = "cli")]
        admin: String,
    },

    /// List HELD entries
    Held {
        #[arg(long)]
        recipient: Option<String>,
        #[arg(long)]
        reference: Option<String>,
    },

    /// Release HELD entries, bypassing the caps
    Release {
        ids: Vec<String>,
        /// Release every HELD entry
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },

    /// Burn a HELD entry
    Burn { id: String, reason: String },

    /// Scan for sponsor loops and self/downline credits
    FraudScan,

    /// Run a reset job now
    Reset {
        #[arg(value_enum)]
        period: ResetPeriod,
        /// Run even if it already ran for the current window
        #[arg(long)]
        force: bool,
    },

    /// Split the passive pool across eligible members
    DistributePool,

    /// Pay the company fund to the configured company account
    SettleCompany,

    /// Show pool and fund totals
    Treasury,

    /// Compare wallet totals against the ledger
    Audit,

    /// Import member profiles from a JSON array
    ImportMembers { file: PathBuf },

    /// Show one member's wallet
    Wallet { member: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResetPeriod {
    Daily,
    Monthly,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    if !path.exists() {
        warn!("[CONFIG] {} not found, using defaults", path.display());
        return Ok(EngineConfig::default());
    }
    EngineConfig::load_from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let engine = CommissionEngine::open(config.clone())
        .with_context(|| format!("failed to open ledger at {}", config.storage.path.display()))?;
    let now = Utc::now();

    match cli.command {
        Commands::Run => {
            let engine = Arc::new(engine);
            let scheduler = Scheduler::new(engine.clone(), config.scheduler.clone()).start();
            let watch = tokio::spawn(watcher::watch(
                engine.clone(),
                cli.config.clone(),
                config.scheduler.config_poll_secs,
            ));
            info!("[DAEMON] Running with ledger {}", config.storage.path.display());

            tokio::signal::ctrl_c().await?;
            info!("[DAEMON] Shutting down");
            scheduler.shutdown();
            watch.abort();
            engine.store().flush()?;
            return Ok(());
        }

        Commands::Distribute {
            buyer,
            amount,
            reference,
            package,
        } => {
            let mut event = SaleEvent::new(buyer, amount);
            if let Some(reference) = reference {
                event = event.with_reference(reference);
            }
            if let Some(package) = package {
                event = event.with_package(package);
            }
            print_json(&engine.distribute_sale_at(&event, now)?)?;
        }

        Commands::AdminCommission {
            source,
            package,
            amount,
            admin,
        } => {
            let request = AdminCommissionRequest {
                source: source.into(),
                package_id: package,
                amount,
                admin_id: admin,
            };
            print_json(&engine.calculate_admin_commission_at(&request, now)?)?;
        }

        Commands::Held {
            recipient,
            reference,
        } => {
            let filter = HeldFilter {
                recipient: recipient.map(MemberId::from),
                reference,
                ..HeldFilter::default()
            };
            print_json(&engine.held_entries(&filter)?)?;
        }

        Commands::Release { ids, all } => {
            let ids = if all {
                engine
                    .held_entries(&HeldFilter::default())?
                    .into_iter()
                    .map(|e| e.id)
                    .collect()
            } else {
                ids
            };
            if ids.is_empty() {
                anyhow::bail!("nothing to release: pass entry ids or --all");
            }
            print_json(&engine.release_entries(&ids, now))?;
        }

        Commands::Burn { id, reason } => {
            print_json(&engine.burn_entry(&id, &reason, now)?)?;
        }

        Commands::FraudScan => {
            print_json(&engine.run_fraud_scan()?)?;
        }

        Commands::Reset { period, force } => match (period, force) {
            (ResetPeriod::Daily, false) => {
                let ran = engine.run_daily_reset_if_due(now)?;
                if !ran {
                    info!("[RESET] Daily reset already ran today");
                }
            }
            (ResetPeriod::Daily, true) => {
                engine.run_daily_reset(now)?;
            }
            (ResetPeriod::Monthly, false) => match engine.run_monthly_reset_if_due(now)? {
                Some(report) => print_json(&report)?,
                None => info!("[RESET] Monthly reset already ran this month"),
            },
            (ResetPeriod::Monthly, true) => {
                print_json(&engine.run_monthly_reset(now)?)?;
            }
        },

        Commands::DistributePool => {
            print_json(&engine.distribute_passive_pool(now)?)?;
        }

        Commands::SettleCompany => {
            let settled = engine.settle_company_fund(now)?;
            println!("{}", settled);
        }

        Commands::Treasury => {
            print_json(&engine.treasury_report()?)?;
        }

        Commands::Audit => {
            let mismatches = engine.audit_ledger()?;
            print_json(&mismatches)?;
            if !mismatches.is_empty() {
                anyhow::bail!("{} wallets disagree with the ledger", mismatches.len());
            }
        }

        Commands::ImportMembers { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let members: Vec<Member> = serde_json::from_str(&raw)
                .with_context(|| format!("invalid member list in {}", file.display()))?;
            for member in &members {
                engine.register_member(member)?;
            }
            info!("[IMPORT] Imported {} members", members.len());
        }

        Commands::Wallet { member } => {
            let id = MemberId::from(member);
            let record = engine
                .store()
                .member(&id)?
                .ok_or_else(|| anyhow::anyhow!("unknown member {}", id))?;
            print_json(&WalletView::new(&record))?;
        }
    }

    engine.store().flush()?;
    Ok(())
}

#[derive(Serialize)]
struct WalletView<'a> {
    member: &'a MemberId,
    tier: PackageTier,
    balance: Amount,
    total_earnings: Amount,
    daily_earnings: Amount,
    monthly_earnings: Amount,
    by_category: Vec<(String, Amount)>,
}

impl<'a> WalletView<'a> {
    fn new(member: &'a Member) -> Self {
        let w = &member.wallet;
        let by_category = [
            Category::Sponsor,
            Category::Depth(1),
            Category::Passive,
            Category::Company,
            Category::Admin(1),
        ]
        .into_iter()
        .map(|c| {
            let name = match c {
                Category::Depth(_) => "DEPTH".to_string(),
                Category::Admin(_) => "ADMIN".to_string(),
                other => other.to_string(),
            };
            (name, w.category_total(c))
        })
        .collect();
        Self {
            member: &member.id,
            tier: member.tier,
            balance: w.balance,
            total_earnings: w.total_earnings,
            daily_earnings: w.daily_earnings,
            monthly_earnings: w.monthly_earnings,
            by_category,
        }
    }
}
