mod flow;

use clap::{Parser, Subcommand};
use contest_common::util::config::Config;
use contest_common::util::logger;
use contest_router::external::ExternalRouter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Strip signal routing from a reference checkpoint.
    Seed {
        input: PathBuf,
        output_logical: PathBuf,
        output_physical: PathBuf,
    },
    /// Check a routed physical netlist; exits 1 on FAIL.
    Verify {
        netlist: PathBuf,
        routed: PathBuf,
        unrouted: PathBuf,
    },
    /// Route every unrouted net with the configured router.
    Route { input: PathBuf, output: PathBuf },
    /// Compare static and clock nets; exits 1 on any difference.
    Diff { routed: PathBuf, unrouted: PathBuf },
    /// Write a random, fully routed reference checkpoint.
    Generate {
        #[arg(long)]
        nets: Option<usize>,
        #[arg(long)]
        static_nets: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "inputs/generated.dcp")]
        output: PathBuf,
    },
    PrintNet {
        physical: PathBuf,
        #[arg(required = true)]
        nets: Vec<String>,
    },
    /// Print the benchmark table for `<bench>.{check,phys.log,wirelength}`.
    Score {
        #[arg(required = true)]
        benches: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let mut config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        Config::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };
    config.apply_env();

    match args.command {
        Commands::Seed {
            input,
            output_logical,
            output_physical,
        } => {
            prepare_output_dir(&output_logical)?;
            prepare_output_dir(&output_physical)?;
            exit_on_error(flow::run_seed(
                &config,
                &input,
                &output_logical,
                &output_physical,
            ));
        }
        Commands::Verify {
            netlist,
            routed,
            unrouted,
        } => {
            let passed = exit_on_error(flow::run_verify(&config, &netlist, &routed, &unrouted));
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Route { input, output } => {
            prepare_output_dir(&output)?;
            let mut router = ExternalRouter::from_config(&config.router)?;
            exit_on_error(flow::run_route(&config, &input, &output, &mut router));
        }
        Commands::Diff { routed, unrouted } => {
            if !exit_on_error(flow::run_diff(&routed, &unrouted)) {
                std::process::exit(1);
            }
        }
        Commands::Generate {
            nets,
            static_nets,
            seed,
            output,
        } => {
            let mut params = config.generator;
            params.nets = nets.unwrap_or(params.nets);
            params.static_nets = static_nets.unwrap_or(params.static_nets);
            params.seed = seed.unwrap_or(params.seed);
            prepare_output_dir(&output)?;
            flow::run_generate(&params, &output)?;
        }
        Commands::PrintNet { physical, nets } => {
            flow::print_nets(&physical, &nets)?;
        }
        Commands::Score { benches } => {
            flow::print_scores(&benches);
        }
    }

    Ok(())
}

/// Pipeline failures end the run with status 1 after logging the cause.
fn exit_on_error<T>(result: anyhow::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn prepare_output_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() && !parent.as_os_str().is_empty() {
            log::info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
