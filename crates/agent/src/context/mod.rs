//! Outbound context assembly.
//!
//! Builds the bounded message list for one reasoning request:
//!
//! | Position | Source | Notes |
//! |----------|--------|-------|
//! | 1 | System prompt | Fixed verification protocol |
//! | 2..=k+1 | Last `k` transcript turns | Copied verbatim, oldest first |
//! | last | Current user turn | Content replaced by query + serialized evidence |

pub mod assembler;

pub use assembler::{AssembledContext, AssemblyMetadata, ContextAssembler};
