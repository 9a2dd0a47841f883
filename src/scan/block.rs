use crate::scan::classify::{classify, OutputKind};
use bitcoin::{Amount, BlockHash, Txid};

/// Snapshot of the node's current best chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub height: u64,
    pub tip_hash: BlockHash,
}

/// Fully fetched block. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    height: u64,
    hash: BlockHash,
    timestamp_seconds: u64,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        height: u64,
        hash: BlockHash,
        timestamp_seconds: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            height,
            hash,
            timestamp_seconds,
            transactions,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    /// Header time in seconds since the Unix epoch.
    pub fn timestamp_seconds(&self) -> u64 {
        self.timestamp_seconds
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub txid: Txid,
    pub outputs: Vec<Output>,
}

/// One transaction output together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub index: u32,
    /// Script in the node's disassembled (asm) form.
    pub script_descriptor: String,
    /// Script type tag reported by the node, e.g. `witness_v1_taproot`.
    pub script_type: String,
    pub kind: OutputKind,
    pub value: Amount,
    pub address: Option<String>,
}

impl Output {
    /// Builds an output and classifies it from its script descriptor and type tag.
    pub fn new(
        index: u32,
        script_descriptor: impl Into<String>,
        script_type: impl Into<String>,
        value: Amount,
        address: Option<String>,
    ) -> Self {
        let script_descriptor = script_descriptor.into();
        let script_type = script_type.into();
        let kind = classify(&script_descriptor, &script_type);
        Self {
            index,
            script_descriptor,
            script_type,
            kind,
            value,
            address,
        }
    }
}

/// An output selected for the sink, tagged with its parent transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedOutput {
    pub txid: Txid,
    /// Position of the parent transaction inside the block.
    pub tx_position: usize,
    pub output: Output,
}

impl MatchedOutput {
    pub fn kind(&self) -> OutputKind {
        self.output.kind
    }
}
