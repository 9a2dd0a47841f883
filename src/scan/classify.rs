//! Best-effort detection of inscription-like outputs.
//!
//! The rules only look at the node's asm string and script type tag. They are
//! a heuristic and will flag plain data carriers and ordinary taproot payments
//! alike; consumers that need authoritative inscription parsing must inspect
//! the witness themselves.

use crate::scan::block::{Block, MatchedOutput};

const OP_RETURN_MARKER: &str = "OP_RETURN";
const NULL_DATA_TYPE: &str = "nulldata";
const TAPROOT_TYPE: &str = "witness_v1_taproot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    OpReturn,
    TaprootWitness,
    Other,
}

impl OutputKind {
    pub fn is_candidate(self) -> bool {
        !matches!(self, OutputKind::Other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::OpReturn => "op_return",
            OutputKind::TaprootWitness => "taproot",
            OutputKind::Other => "other",
        }
    }
}

impl core::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an output. A data-carrier marker wins over the type tag.
pub fn classify(script_descriptor: &str, script_type: &str) -> OutputKind {
    if script_descriptor.contains(OP_RETURN_MARKER) || script_type == NULL_DATA_TYPE {
        OutputKind::OpReturn
    } else if script_type == TAPROOT_TYPE {
        OutputKind::TaprootWitness
    } else {
        OutputKind::Other
    }
}

/// Collects every candidate output of `block`, transactions in block order and
/// outputs in script order.
pub fn matched_outputs(block: &Block) -> Vec<MatchedOutput> {
    block
        .transactions()
        .iter()
        .enumerate()
        .flat_map(|(tx_position, tx)| {
            tx.outputs
                .iter()
                .filter(|output| output.kind.is_candidate())
                .map(move |output| MatchedOutput {
                    txid: tx.txid,
                    tx_position,
                    output: output.clone(),
                })
        })
        .collect()
}
