//! Row Log Module
//!
//! Append-only durability layer behind [`LogEngine`](crate::engine::LogEngine).
//!
//! ## Responsibilities
//! - Append one frame per row mutation before the index changes
//! - CRC32 checksums over header and body
//! - Sequence numbers for ordering
//! - Replay on open, truncating torn tails
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Frame 1                                                  │
//! │ ┌─────────┬─────────┬───────────┬───────────┬──────────┐ │
//! │ │ Seq (8) │ Len (4) │ HdrCRC(4) │ BodyCRC(4)│ Body     │ │
//! │ └─────────┴─────────┴───────────┴───────────┴──────────┘ │
//! ├──────────────────────────────────────────────────────────┤
//! │ Frame 2                                                  │
//! │ ┌─────────┬─────────┬───────────┬───────────┬──────────┐ │
//! │ │ Seq (8) │ Len (4) │ HdrCRC(4) │ BodyCRC(4)│ Body     │ │
//! │ └─────────┴─────────┴───────────┴───────────┴──────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//! Header fields are little-endian; the body is `bincode(LogOp)`. The header
//! CRC covers seq and len, the body CRC covers the body.
//!
//! ## Damage
//! Replay skips any damaged region that is followed by a valid frame with a
//! higher sequence number. Damage with nothing valid after it is a torn tail
//! and is truncated.

mod entry;
mod writer;
mod recovery;

pub use entry::{decode_frame, FrameRead, LogEntry, LogOp, HEADER_SIZE};
pub use writer::LogWriter;
pub use recovery::{LogReplay, ReplayStats};
