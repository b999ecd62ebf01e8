use utoipa::OpenApi;

use super::handlers;
use crate::blockchain::{Address, Block, Transaction};

/// OpenAPI document for the node
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_chain,
        handlers::get_pending_transactions,
        handlers::new_transaction,
        handlers::mine_block,
        handlers::validate_chain,
        handlers::get_balance
    ),
    components(
        schemas(
            Block,
            Transaction,
            Address,
            handlers::ChainResponse,
            handlers::TransactionRequest,
            handlers::TransactionResponse,
            handlers::MineRequest,
            handlers::MineResponse,
            handlers::ValidationResponse,
            handlers::BalanceResponse
        )
    ),
    tags(
        (name = "blockchain", description = "Blockchain API endpoints")
    ),
    info(
        title = "Hashchain API",
        version = "0.1.0",
        description = "Inspect and extend an in-memory proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
