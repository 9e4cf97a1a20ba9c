//! ==============================================================================
//! error.rs - error taxonomy for the bridge components
//! ==============================================================================
//!
//! purpose:
//!     every failure a loop can hit has a named variant here so it can be
//!     logged and tested. none of them are fatal: the loop that hit one
//!     logs it and moves on to its next iteration.
//!
//! relationships:
//!     - FrameError: returned by frame.rs, swallowed by frame::parse
//!     - TransportError: returned by serial.rs, server.rs, alert.rs
//!
//! ==============================================================================

use std::time::Duration;

/// why a chunk or a line did not produce a reading
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// chunk is not valid utf-8 text
    #[error("chunk is not valid text: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// line does not start with the sentence tag
    #[error("line does not start with the sentence tag")]
    MissingTag,

    /// tagged line with too few comma separated fields
    #[error("sentence has {found} fields, need at least {required}")]
    TooFewFields { found: usize, required: usize },
}

/// i/o failures at a loop boundary
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("serial read failed: {0}")]
    Serial(String),

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("request read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("response write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("client sent nothing within {0:?}")]
    Timeout(Duration),

    #[error("alert dispatch failed: {0}")]
    Dispatch(String),
}
