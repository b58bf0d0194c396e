//! Core math modules.

pub mod hypergeometric;
pub mod optimize;
pub mod stable;
pub mod stats;
