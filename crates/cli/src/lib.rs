pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::orchestrate::OrchestrateArgs;
use commands::price::PriceArgs;

#[derive(Debug, Parser)]
#[command(
    name = "coreflow",
    about = "CoreFlow operator CLI",
    long_about = "Inspect configuration, manage the subscription database, price plans, and run bundle workflows.",
    after_help = "Examples:\n  coreflow doctor --json\n  coreflow price --tier professional --bundle finance_ai_fingpt --seats 10\n  coreflow orchestrate --tenant tenant-acme --bundle finance_ai_fingpt --workflow sentiment_analysis --input '{\"text\":\"strong quarter\"}'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, and bundle handler health")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the demo tenant subscriptions (idempotent)")]
    Seed,
    #[command(about = "Print the bundle catalog")]
    Bundles,
    #[command(about = "Price a subscription plan")]
    Price {
        #[arg(long, help = "Plan tier: starter, professional, or enterprise")]
        tier: String,
        #[arg(long = "bundle", help = "Bundle id; repeat for several bundles")]
        bundles: Vec<String>,
        #[arg(long)]
        seats: u32,
        #[arg(long, help = "Bill annually instead of monthly")]
        annual: bool,
        #[arg(long)]
        promo: Option<String>,
        #[arg(long = "tax-rate", help = "Tax rate in percent, 0 to 30")]
        tax_rate: Option<String>,
    },
    #[command(about = "Run a bundle workflow for a tenant and record the run")]
    Orchestrate {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        bundle: String,
        #[arg(long)]
        workflow: String,
        #[arg(long, default_value = "{}", help = "Workflow input as JSON, or @path to a JSON file")]
        input: String,
        #[arg(long = "request-id", help = "Idempotency key; repeats replay the recorded run")]
        request_id: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Bundles => commands::bundles::run(),
        Command::Price { tier, bundles, seats, annual, promo, tax_rate } => {
            commands::price::run(PriceArgs { tier, bundles, seats, annual, promo, tax_rate })
        }
        Command::Orchestrate { tenant, bundle, workflow, input, request_id } => {
            commands::orchestrate::run(OrchestrateArgs {
                tenant,
                bundle,
                workflow,
                input,
                request_id,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
