use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use worldspace_common::{EntityId, Location};
use worldspace_kernel::{AuthorityQueue, World};
use worldspace_relocate::{MappingPolicy, RelocateConfig, RelocationService};

#[derive(Parser)]
#[command(name = "worldspace-cli", about = "CLI tool for worldspace operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mapping {
    Wrap,
    Strict,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Print the effective relocation config as YAML
    Config {
        /// YAML config file; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a batched relocation against a generated world
    Relocate {
        /// Number of entities to spawn
        #[arg(short, long, default_value = "45")]
        entities: usize,
        /// Number of destinations; 1 sends everyone to the same place
        #[arg(short, long, default_value = "1")]
        destinations: usize,
        /// Take every Nth entity offline before relocating (0 = none)
        #[arg(long, default_value = "0")]
        offline_every: usize,
        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the configured batch size
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Override the configured mapping policy
        #[arg(long, value_enum)]
        mapping: Option<Mapping>,
        /// Disable region prefetch
        #[arg(long)]
        no_prefetch: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RelocateConfig> {
    match path {
        Some(path) => RelocateConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(RelocateConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("worldspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("kernel: region_size={}", World::new().region_size());
            println!("stream: {}", worldspace_stream::crate_info());
            println!("relocate: {}", worldspace_relocate::crate_info());
        }
        Commands::Config { config } => {
            let config = load_config(config.as_ref())?;
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Commands::Relocate {
            entities,
            destinations,
            offline_every,
            config,
            batch_size,
            mapping,
            no_prefetch,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(n) = batch_size {
                config.batch_size = n;
            }
            if let Some(m) = mapping {
                config.mapping = match m {
                    Mapping::Wrap => MappingPolicy::Wrap,
                    Mapping::Strict => MappingPolicy::Strict,
                };
            }
            if no_prefetch {
                config.prefetch = false;
            }
            anyhow::ensure!(destinations > 0, "at least one destination is required");

            let mut world = World::new();
            let ids: Vec<EntityId> = (0..entities)
                .map(|i| world.spawn(Location::primary(i as f32 * 2.0, 64.0, 0.0)))
                .collect();
            if offline_every > 0 {
                for id in ids.iter().step_by(offline_every) {
                    world.set_active(*id, false);
                }
            }
            let locations: Vec<Location> = (0..destinations)
                .map(|i| Location::primary(1000.0 + i as f32 * 40.0, 70.0, -1000.0))
                .collect();

            let mut queue = AuthorityQueue::<World>::new();
            let service = RelocationService::start(config, queue.handle())?;
            println!(
                "Relocating {entities} entities to {destinations} destination(s), batch size {}",
                service.config().batch_size
            );

            let ticket = if destinations == 1 {
                service.relocate_all_to(&ids, locations[0])?
            } else {
                service.relocate_all(&ids, &locations)?
            };

            // this thread plays the authoritative thread
            let finished =
                queue.run_until(&mut world, Duration::from_secs(30), || ticket.is_done());
            anyhow::ensure!(finished, "relocation did not finish within 30s");
            let report = ticket
                .try_report()
                .context("relocation finished without a report")?;

            println!("{report}");
            for skip in &report.skipped {
                println!("  skipped #{}: {}", skip.index, skip.reason);
            }
            let tasks = queue.stats();
            let prefetch = service.prefetch_stats();
            println!(
                "Authoritative tasks: prefetch={} relocate={}",
                tasks.prefetch_tasks, tasks.relocate_tasks
            );
            println!(
                "Regions: loaded={} late_loads={} prefetch_requests={}",
                world.loaded_regions().len(),
                service.late_loads(),
                prefetch.requested
            );

            service.shutdown();
            anyhow::ensure!(
                service.await_termination(Duration::from_secs(5)),
                "worker pool did not stop"
            );
            tracing::info!(state = ?service.state(), "relocation service stopped");
        }
    }

    Ok(())
}
