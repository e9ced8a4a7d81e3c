use clap::{Args, Parser, Subcommand};

/// Fan a batch of values out across a pool of workers.
#[derive(Parser, Debug)]
#[command(name = "fanout", version, about = "Fan a batch of values out across a pool of workers")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/stupid-fanout/config.toml)
    #[arg(long, global = true, env = "FANOUT_CONFIG")]
    pub config: Option<String>,

    /// Log at info level instead of warn (RUST_LOG still wins)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Test random integers for primality and print the primes
    Primes(PrimesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PrimesArgs {
    /// How many random integers to test
    #[arg(long, env = "FANOUT_VALUE_COUNT")]
    pub count: Option<usize>,

    /// Number of workers (default: available parallelism minus one)
    #[arg(long, env = "FANOUT_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Upper bound (exclusive) for generated integers
    #[arg(long)]
    pub max_value: Option<u64>,

    /// Seed for reproducible inputs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Abort after this many results have been received
    #[arg(long)]
    pub cancel_after: Option<usize>,

    /// Send values to workers as transferable byte buffers
    #[arg(long)]
    pub transfer: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
