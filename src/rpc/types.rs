//! Wire shapes for the Bitcoin Core responses the poller consumes, and their
//! conversion into the crate's block model.

use crate::scan::block::{Block, ChainInfo, Output, Transaction};
use bitcoin::{Amount, BlockHash, Txid};
use serde::Deserialize;

/// Subset of `getblockchaininfo`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BlockchainInfoResponse {
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: BlockHash,
    #[serde(rename = "verificationprogress", default)]
    pub verification_progress: f64,
    #[serde(default)]
    pub size_on_disk: u64,
}

impl BlockchainInfoResponse {
    pub fn chain_info(&self) -> ChainInfo {
        ChainInfo {
            height: self.blocks,
            tip_hash: self.best_block_hash,
        }
    }
}

/// `getblock <hash> 2` response.
#[derive(Debug, Clone, Deserialize)]
pub struct VerboseBlock {
    pub hash: BlockHash,
    pub height: u64,
    pub time: u64,
    #[serde(default)]
    pub tx: Vec<VerboseTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerboseTransaction {
    pub txid: Txid,
    #[serde(default)]
    pub vout: Vec<VerboseOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerboseOutput {
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: Amount,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub asm: String,
    #[serde(rename = "type", default)]
    pub script_type: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl From<VerboseBlock> for Block {
    fn from(value: VerboseBlock) -> Self {
        let transactions = value.tx.into_iter().map(Transaction::from).collect();
        Block::new(value.height, value.hash, value.time, transactions)
    }
}

impl From<VerboseTransaction> for Transaction {
    fn from(value: VerboseTransaction) -> Self {
        Transaction {
            txid: value.txid,
            outputs: value
                .vout
                .into_iter()
                .map(|vout| {
                    Output::new(
                        vout.n,
                        vout.script_pub_key.asm,
                        vout.script_pub_key.script_type,
                        vout.value,
                        vout.script_pub_key.address,
                    )
                })
                .collect(),
        }
    }
}
