//! Interactive console for the tiered rate limiter.
//!
//! A thin adapter over [`tierbucket::BucketRegistry`]: reads menu choices from
//! stdin, calls the registry, and prints the outcome.

use anyhow::Result;
use clap::Parser;
use std::io::{self, BufRead, Write};
use tierbucket::{BucketRegistry, Outcome, RateLimiterBuilder, Tier, DEFAULT_REFILL_INTERVAL_MS};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tierbucket", version, about = "Interactive tiered rate limiter console")]
struct Args {
    /// Milliseconds between refill ticks
    #[arg(long, default_value_t = DEFAULT_REFILL_INTERVAL_MS)]
    refill_interval_ms: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let (registry, mut scheduler) = RateLimiterBuilder::new()
        .refill_interval_ms(args.refill_interval_ms)
        .build()?;
    scheduler.start()?;
    info!(version = tierbucket::VERSION, "Rate limiter console ready");

    println!("🛡️ TIERED RATE LIMITER LOADED");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!("\n1. Register/Upgrade User | 2. Send Request | 3. Check All Status | 4. Quit");
        let Some(choice) = prompt(&mut lines, "Action: ")? else {
            break;
        };

        match choice.trim().parse::<u32>() {
            Ok(1) => {
                let Some(identity) = prompt(&mut lines, "Enter User ID: ")? else {
                    break;
                };
                let Some(tier) =
                    prompt(&mut lines, "Select Tier (1: FREE, 2: PREMIUM, 3: ENTERPRISE): ")?
                else {
                    break;
                };
                register(&registry, identity.trim(), &tier);
            }
            Ok(2) => {
                let Some(identity) = prompt(&mut lines, "Enter User ID to send request: ")? else {
                    break;
                };
                let identity = identity.trim();
                println!("{}", render(identity, registry.hit_api(identity)));
            }
            Ok(3) => {
                println!("\n--- LIVE BUCKET STATUS ---");
                for (identity, tokens) in registry.snapshot_status() {
                    println!("User: {} | Tokens: {}", identity, tokens);
                }
            }
            Ok(4) => break,
            Ok(_) => println!("⚠️ Invalid choice."),
            Err(_) => println!("❌ Error: Please enter a valid number."),
        }
    }

    scheduler.stop();
    println!("Shutting down... Goodbye!");
    Ok(())
}

fn prompt<B: BufRead>(lines: &mut io::Lines<B>, label: &str) -> io::Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    lines.next().transpose()
}

fn register(registry: &BucketRegistry, identity: &str, tier: &str) {
    let tier = match tier.parse::<Tier>() {
        Ok(tier) => tier,
        Err(err) => {
            println!("❌ Error: {}", err);
            return;
        }
    };

    match registry.try_register_or_upgrade(identity, tier) {
        Ok(_) => println!("👤 User {} set to {}", identity, tier),
        Err(err) => println!("❌ Error: {}", err),
    }
}

fn render(identity: &str, outcome: Outcome) -> String {
    match outcome {
        Outcome::Admitted { tokens_remaining } => format!(
            "✅ [200 OK] Request processed for {} (Tokens left: {})",
            identity, tokens_remaining
        ),
        Outcome::Rejected => format!("❌ [429 Too Many Requests] {} is rate limited!", identity),
        Outcome::UnknownIdentity => "❌ User not found. Register them first.".to_string(),
    }
}
