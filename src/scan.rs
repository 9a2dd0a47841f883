//! Block data model and the output classification heuristic that decides which
//! outputs are handed to the sink.

pub mod block;
pub mod classify;
