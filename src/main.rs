use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::path::PathBuf;
use std::sync::Mutex;

use hashchain::api::{self, ApiDoc};
use hashchain::blockchain::{Address, Block, Blockchain, Transaction};
use hashchain::config::{ChainConfig, ConfigError, NodeConfig};

#[derive(Parser)]
#[command(name = "hashchain", version, about = "In-memory proof-of-work ledger")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP node (default)
    Serve(ServeArgs),
    /// Replay the sample ledger scenario and print the chain
    Demo(ChainArgs),
}

#[derive(Args, Default)]
struct ChainArgs {
    /// Leading zero bits required of a block hash
    #[arg(long)]
    difficulty: Option<u32>,

    /// Reward paid for mining a block
    #[arg(long)]
    reward: Option<f64>,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[command(flatten)]
    chain: ChainArgs,
}

impl ChainArgs {
    fn apply(&self, config: &mut NodeConfig) -> Result<(), ConfigError> {
        if let Some(bits) = self.difficulty {
            config.chain.set_difficulty_bits(bits)?;
        }
        if let Some(reward) = self.reward {
            config.chain.mining_reward = reward;
        }
        config.validate()
    }
}

fn load_config(args: &ServeArgs) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => NodeConfig::default(),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    args.chain.apply(&mut config)?;

    Ok(config)
}

// Replays the sample scenario: a minted balance, an incoming and an outgoing
// transfer, then two rounds of mining to the same address
fn run_demo(args: &ChainArgs) -> anyhow::Result<()> {
    let mut config = NodeConfig::default();
    args.apply(&mut config)?;

    let mut blockchain = Blockchain::new(config.chain.clone());
    let you = Address::from("your-address");

    blockchain.create_transaction(Transaction::reward("your-address", 12.5))?;
    blockchain.create_transaction(Transaction::transfer("address1", "your-address", 10.0))?;
    blockchain.create_transaction(Transaction::transfer("your-address", "address2", 2.0))?;

    println!("Mining block 1...");
    let block = blockchain.mine_pending_transactions(&you);
    println!("Block mined: {}", block.hash());
    println!("Balance of {}: {}", you, blockchain.balance_of(&you));

    println!("Mining block 2...");
    let block = blockchain.mine_pending_transactions(&you);
    println!("Block mined: {}", block.hash());
    println!("Balance of {}: {}", you, blockchain.balance_of(&you));

    println!("Chain valid: {}", blockchain.is_valid());
    println!("{}", serde_json::to_string_pretty(blockchain.blocks())?);

    let (edited, rehashed) = tamper_first_block(&blockchain, config.chain)?;
    println!("Chain valid after editing block 1: {}", edited.is_valid());
    println!("Chain valid after also recomputing its hash: {}", rehashed.is_valid());
    if let Err(fault) = rehashed.verify() {
        println!("{}", fault);
    }

    Ok(())
}

/// Edits the first transaction amount of block 1 in an exported copy of the chain
///
/// # Returns
///
/// The chain with only the edit applied, and the chain where block 1's hash was
/// also recomputed without re-mining the blocks after it
fn tamper_first_block(
    blockchain: &Blockchain,
    config: ChainConfig,
) -> anyhow::Result<(Blockchain, Blockchain)> {
    anyhow::ensure!(blockchain.len() > 2, "Need at least two mined blocks to tamper with");
    let mut export = serde_json::to_value(blockchain.blocks())?;

    let transaction = export[1]["transactions"][0]
        .as_object_mut()
        .and_then(|tx| tx.values_mut().next())
        .context("Block 1 has no transactions to edit")?;
    transaction["amount"] = serde_json::Value::from(200.0);

    let blocks: Vec<Block> = serde_json::from_value(export.clone())?;
    let rehash = blocks[1].calculate_hash();
    let edited = Blockchain::from_blocks(blocks, config.clone())?;

    export[1]["hash"] = serde_json::Value::from(rehash);
    let blocks: Vec<Block> = serde_json::from_value(export)?;
    let rehashed = Blockchain::from_blocks(blocks, config)?;

    Ok((edited, rehashed))
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    info!(
        "Creating blockchain (difficulty {}, reward {}, {:?} rewards)",
        config.chain.difficulty, config.chain.mining_reward, config.chain.reward_policy
    );
    let blockchain = web::Data::new(Mutex::new(Blockchain::new(config.chain)));

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Demo(args)) => run_demo(&args),
        Some(Command::Serve(args)) => serve(args).await,
        None => serve(ServeArgs::default()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashchain::blockchain::{Difficulty, IntegrityFault};

    fn serve_args(difficulty: Option<u32>, reward: Option<f64>) -> ServeArgs {
        ServeArgs {
            chain: ChainArgs { difficulty, reward },
            ..ServeArgs::default()
        }
    }

    #[test]
    fn test_load_config_overrides() {
        let config = load_config(&serve_args(Some(4), Some(50.0))).unwrap();

        assert_eq!(config.chain.difficulty.bits(), 4);
        assert_eq!(config.chain.mining_reward, 50.0);
    }

    #[test]
    fn test_load_config_rejects_unreachable_difficulty() {
        let result = load_config(&serve_args(Some(300), None));
        assert!(result.is_err());

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidDifficulty(300))
        ));
    }

    #[test]
    fn test_load_config_rejects_negative_reward() {
        let result = load_config(&serve_args(None, Some(-1.0)));

        assert!(matches!(
            result.unwrap_err().downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidReward(_))
        ));
    }

    #[test]
    fn test_tamper_first_block() {
        let config = ChainConfig {
            difficulty: Difficulty::new(4),
            ..ChainConfig::default()
        };
        let mut blockchain = Blockchain::new(config.clone());
        blockchain
            .create_transaction(Transaction::transfer("address1", "your-address", 3.0))
            .unwrap();
        blockchain.mine_pending_transactions(&Address::from("your-address"));
        blockchain.mine_pending_transactions(&Address::from("your-address"));

        let (edited, rehashed) = tamper_first_block(&blockchain, config).unwrap();

        assert!(matches!(
            edited.verify(),
            Err(IntegrityFault::HashMismatch { index: 1, .. })
        ));
        assert!(rehashed.blocks()[1].has_valid_hash());
        assert!(matches!(
            rehashed.verify(),
            Err(IntegrityFault::LinkBroken { index: 2, .. })
        ));
    }
}
