//! The poll loop and the seam it reads the chain through.

pub mod backoff;
pub mod poller;
pub mod source;
