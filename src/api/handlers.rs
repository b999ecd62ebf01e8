use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::fmt;
use std::sync::Mutex;

use crate::blockchain::{Address, Block, Blockchain, Transaction};

/// Shared chain state. One lock guards blocks and pending transactions together.
pub type BlockchainData = web::Data<Mutex<Blockchain>>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,

    /// Leading zero bits required of a block hash
    pub difficulty: u32,

    /// Reward paid for mining a block
    pub mining_reward: f64,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address; omit to mint the amount
    pub sender: Option<String>,

    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    pub amount: f64,
}

impl From<TransactionRequest> for Transaction {
    fn from(req: TransactionRequest) -> Self {
        match req.sender {
            Some(sender) => Transaction::transfer(sender, req.recipient, req.amount),
            None => Transaction::reward(req.recipient, req.amount),
        }
    }
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The index of the block that will include this transaction
    pub block_index: usize,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The address that receives the mining reward
    pub miner_address: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The index of the new block
    pub index: usize,

    /// The newly mined block
    pub block: Block,
}

/// Response for the validate endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    /// Whether the chain is intact
    pub is_valid: bool,

    /// Index of the first broken block
    pub index: Option<usize>,

    /// Description of the first break
    pub fault: Option<String>,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    /// The queried address
    pub address: String,

    /// Balance derived from all mined transactions
    pub balance: f64,
}

fn internal_error(err: impl fmt::Display) -> HttpResponse {
    error!("Request failed: {}", err);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("Internal error: {}", err)
    }))
}

/// Runs `f` with the chain locked, on the blocking thread pool.
///
/// Mining holds the lock for the whole proof-of-work search, so waiting for
/// it must never park an async worker.
///
/// # Arguments
///
/// * `blockchain` - The shared chain state
/// * `f` - The operation to run while holding the lock
///
/// # Returns
///
/// The result of `f`, or a description of a poisoned lock or a failed task
pub async fn with_chain<R, F>(blockchain: BlockchainData, f: F) -> Result<R, String>
where
    F: FnOnce(&mut Blockchain) -> R + Send + 'static,
    R: Send + 'static,
{
    web::block(move || {
        let mut guard = blockchain.lock().map_err(|err| err.to_string())?;
        Ok::<R, String>(f(&mut *guard))
    })
    .await
    .map_err(|err| err.to_string())?
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let response = with_chain(blockchain, |blockchain| ChainResponse {
        length: blockchain.len(),
        chain: blockchain.blocks().to_vec(),
        is_valid: blockchain.is_valid(),
        difficulty: blockchain.difficulty().bits(),
        mining_reward: blockchain.mining_reward(),
    })
    .await;

    match response {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(err) => internal_error(err),
    }
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    match with_chain(blockchain, |blockchain| blockchain.pending_transactions().to_vec()).await {
        Ok(transactions) => HttpResponse::Ok().json(transactions),
        Err(err) => internal_error(err),
    }
}

/// Create a new transaction
///
/// Adds a new transaction to the pending transactions
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let transaction = Transaction::from(transaction_req.into_inner());

    let created = with_chain(blockchain, move |blockchain| {
        blockchain
            .create_transaction(transaction)
            .map(|()| blockchain.len())
    })
    .await;

    match created {
        Ok(Ok(block_index)) => {
            let response = TransactionResponse {
                message: "Transaction will be added to Block".to_string(),
                block_index,
            };

            HttpResponse::Created().json(response)
        }
        Ok(Err(err)) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to add transaction: {}", err)
        })),
        Err(err) => internal_error(err),
    }
}

/// Mine a new block
///
/// Seals all pending transactions into a new block
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Invalid mining request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(
    blockchain: BlockchainData,
    mine_req: web::Json<MineRequest>,
) -> impl Responder {
    if mine_req.miner_address.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Miner address must not be empty"
        }));
    }

    let miner_address = Address(mine_req.into_inner().miner_address);

    let mined = with_chain(blockchain, move |blockchain| {
        let block = blockchain.mine_pending_transactions(&miner_address).clone();
        (blockchain.len() - 1, block)
    })
    .await;

    match mined {
        Ok((index, block)) => {
            let response = MineResponse {
                message: "New Block Mined".to_string(),
                index,
                block,
            };

            HttpResponse::Ok().json(response)
        }
        Err(err) => internal_error(err),
    }
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain and reports the first break, if any
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = ValidationResponse)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    let verified = match with_chain(blockchain, |blockchain| blockchain.verify()).await {
        Ok(verified) => verified,
        Err(err) => return internal_error(err),
    };

    let response = match verified {
        Ok(()) => ValidationResponse {
            is_valid: true,
            index: None,
            fault: None,
        },
        Err(fault) => ValidationResponse {
            is_valid: false,
            index: Some(fault.index()),
            fault: Some(fault.to_string()),
        },
    };

    HttpResponse::Ok().json(response)
}

/// Get the balance of an address
///
/// Replays every mined transaction; pending transactions are not counted
#[utoipa::path(
    get,
    path = "/api/v1/balance/{address}",
    params(
        ("address" = String, Path, description = "Address to look up")
    ),
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_balance(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let address = Address(address.into_inner());
    let lookup = address.clone();

    match with_chain(blockchain, move |blockchain| blockchain.balance_of(&lookup)).await {
        Ok(balance) => HttpResponse::Ok().json(BalanceResponse {
            address: address.0,
            balance,
        }),
        Err(err) => internal_error(err),
    }
}
