//! Match Tester CLI Tool
//!
//! Command-line tool for exercising the matching core in-process, without a
//! running service.
//!
//! Usage:
//!   cargo run --bin match-tester -- --help
//!   cargo run --bin match-tester profiles
//!   cargo run --bin match-tester synthesize --count 5 --seed 42
//!   cargo run --bin match-tester group --count 200 --policy skill --profile europe_bank_it_b0
//!   cargo run --bin match-tester cycle --count 500 --seed 7

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use match_director::config::AppConfig;
use match_director::director::{Director, TicketIngestor};
use match_director::extensions::get_number;
use match_director::matchfunction::{GroupingPolicy, MatchFunction};
use match_director::profile::ProfileGenerator;
use match_director::store::{InMemoryTicketStore, TicketFrontend};
use match_director::ticket::{
    ClientDataGenerator, GeneratorSettings, RegionSelector, SimulationMode, TicketSynthesizer,
};
use match_director::types::{Match, AVG_SKILL_KEY, SKILL_DISPERSION_KEY};
use match_director::utils::seeded_rng;
use tokio_stream::StreamExt;

#[derive(Parser)]
#[command(name = "match-tester")]
#[command(about = "In-process testing tool for the match-director matching core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Simulation mode (all, only_skill)
    #[arg(long, global = true)]
    mode: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the generated match profiles
    Profiles {
        /// Print full profiles as JSON
        #[arg(long)]
        json: bool,
    },
    /// Synthesize random tickets and print them
    Synthesize {
        /// Number of clients to generate
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
        /// Rng seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Create tickets and group them for every profile
    Group {
        /// Number of tickets to create
        #[arg(short = 'n', long, default_value = "200")]
        count: usize,
        /// Rng seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Grouping policy (skill, exhaustive)
        #[arg(short, long, default_value = "skill")]
        policy: String,
        /// Only run profiles whose name starts with this prefix
        #[arg(long)]
        profile: Option<String>,
    },
    /// Create tickets and run a single director cycle against them
    Cycle {
        /// Number of tickets to create
        #[arg(short = 'n', long, default_value = "500")]
        count: usize,
        /// Rng seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(mode) = &cli.mode {
        config.simulation.mode = mode.parse::<SimulationMode>()?;
    }
    Ok(config)
}

/// Fill a fresh store with `count` seeded tickets
async fn populate_store(
    config: &AppConfig,
    count: usize,
    seed: u64,
) -> Result<(Arc<InMemoryTicketStore>, usize)> {
    let store = Arc::new(InMemoryTicketStore::new());
    let mut generator = ClientDataGenerator::new(
        GeneratorSettings::from_config(config),
        seeded_rng(Some(seed), 0),
    )?;
    let synthesizer = TicketSynthesizer::new(RegionSelector::with_threshold(
        config.matchmaking.region_ping_threshold,
    ));

    let mut skipped = 0;
    for _ in 0..count {
        match synthesizer.synthesize(&generator.generate()) {
            Ok(ticket) => {
                store.create_ticket(ticket).await?;
            }
            Err(e) => {
                eprintln!("⚠️  Skipping client: {}", e);
                skipped += 1;
            }
        }
    }

    Ok((store, skipped))
}

fn describe(proposal: &Match) -> String {
    format!(
        "{} ({} tickets, avg skill {:.1}, skill dispersion {:.1})",
        proposal.match_id,
        proposal.tickets.len(),
        get_number(&proposal.extensions, AVG_SKILL_KEY),
        get_number(&proposal.extensions, SKILL_DISPERSION_KEY)
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let profiles = ProfileGenerator::new(config.matchmaking.scenario.clone())?.generate();

    match cli.command {
        Commands::Profiles { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
            } else {
                println!("📋 {} profiles:", profiles.len());
                for profile in &profiles {
                    let tags: Vec<&str> = profile
                        .pools
                        .iter()
                        .flat_map(|p| p.tag_present_filters.iter().map(|f| f.tag.as_str()))
                        .collect();
                    println!("  {} [{}]", profile.name, tags.join(", "));
                }
            }
        }

        Commands::Synthesize { count, seed } => {
            let mut generator = ClientDataGenerator::new(
                GeneratorSettings::from_config(&config),
                seeded_rng(Some(seed), 0),
            )?;
            let synthesizer = TicketSynthesizer::new(RegionSelector::with_threshold(
                config.matchmaking.region_ping_threshold,
            ));

            for _ in 0..count {
                let client = generator.generate();
                match synthesizer.synthesize(&client) {
                    Ok(ticket) => println!("{}", serde_json::to_string(&ticket)?),
                    Err(e) => eprintln!("❌ {}", e),
                }
            }
        }

        Commands::Group {
            count,
            seed,
            policy,
            profile: prefix,
        } => {
            let policy: GroupingPolicy = policy.parse()?;
            let (store, skipped) = populate_store(&config, count, seed).await?;
            println!(
                "🎫 Created {} tickets ({} skipped)",
                store.pending_count().await,
                skipped
            );

            let function =
                MatchFunction::new(store, policy, config.matchmaking.best_region_max_ping);
            let mut total = 0;
            for profile in profiles.iter().filter(|p| {
                prefix
                    .as_deref()
                    .map_or(true, |prefix| p.name.starts_with(prefix))
            }) {
                let matches: Vec<Match> = function.run(profile).await?.collect().await;
                if matches.is_empty() {
                    continue;
                }
                println!("🧩 {}: {} matches", profile.name, matches.len());
                for proposal in &matches {
                    println!("    {}", describe(proposal));
                }
                total += matches.len();
            }
            println!("📊 {} matches proposed with policy {}", total, policy);
        }

        Commands::Cycle { count, seed } => {
            let store = Arc::new(InMemoryTicketStore::new());
            let mut config = config;
            config.frontend.tickets_per_batch = count;

            let ingestor = TicketIngestor::from_config(
                &config,
                seeded_rng(Some(seed), 0),
                store.clone(),
            )?;
            let batch = ingestor.run_batch().await;
            println!(
                "🎫 Batch: {} created, {} synthesis failures, {} creation failures",
                batch.created, batch.synthesis_failures, batch.creation_failures
            );

            let function = MatchFunction::new(
                store.clone(),
                config.matchmaking.grouping_policy,
                config.matchmaking.best_region_max_ping,
            );
            let director = Director::new(
                profiles,
                function,
                store.clone(),
                &config.director,
                seeded_rng(Some(seed), 1),
            );
            let report = director.run_cycle().await;

            println!("🔁 Cycle report:");
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("📊 Store: {:?}", store.stats().await);
        }
    }

    Ok(())
}
