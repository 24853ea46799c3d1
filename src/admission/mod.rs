//! # Admission Control
//!
//! Reject-on-exceed admission gate in front of every gateway route. Each
//! route owns a token bucket; a request draws one token or is rejected
//! immediately with a retry hint. There is no queuing or smoothing.

mod bucket;
mod gate;

pub use bucket::{BucketConfig, TokenBucket};
pub use gate::{AdmissionConfig, AdmissionDecision, AdmissionGate, AdmissionRule, AdmissionStats};
