use malblock_common::Category;
use std::time::Instant;

/// Per-request context carried through the Pingora proxy pipeline.
pub struct RequestContext {
    /// Identity the request was attributed to; empty when none was found.
    pub identity: String,

    /// Classifier verdict, set once the gate has run.
    pub category: Option<Category>,

    pub rejected: bool,

    /// Request start time for latency measurement.
    pub request_start: Instant,

    /// HTTP method (cached for logging).
    pub method: String,

    /// Request URI (cached for logging).
    pub uri: String,

    /// Response status code (set during response phase).
    pub response_status: u16,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            identity: String::new(),
            category: None,
            rejected: false,
            request_start: Instant::now(),
            method: String::new(),
            uri: String::new(),
            response_status: 0,
        }
    }
}
