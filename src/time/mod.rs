// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid time values used to version records and bound reads.
//!
//! Clock generation happens elsewhere. This module only defines the values
//! that flow through storage:
//!
//! - [`HybridTime`]: physical microseconds plus a logical counter
//! - [`DocHybridTime`]: a hybrid time plus a per-time write id
//! - [`EncodedDocHybridTime`]: the 12-byte form stored in keys, where later
//!   times sort as smaller bytes
//! - [`ReadHybridTime`]: the read point and uncertainty limits of one read
//!
//! # Example
//!
//! ```
//! use intentdb::time::{DocHybridTime, HybridTime};
//!
//! let older = DocHybridTime::new(HybridTime::new(10), 0).encode();
//! let newer = DocHybridTime::new(HybridTime::new(20), 0).encode();
//!
//! // Newer versions come first in byte order...
//! assert!(newer.as_slice() < older.as_slice());
//! // ...while the encoded type itself compares by time.
//! assert!(newer > older);
//! ```

mod doc_hybrid_time;
mod error;
mod hybrid_time;
mod read_time;

pub use doc_hybrid_time::{
    DocHybridTime, EncodedDocHybridTime, WriteId, ENCODED_DOC_HT_SIZE, MAX_WRITE_ID,
};
pub use error::TimeError;
pub use hybrid_time::HybridTime;
pub use read_time::{EncodedReadHybridTime, ReadHybridTime};
