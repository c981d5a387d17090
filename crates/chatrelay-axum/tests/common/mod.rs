//! Shared helpers for the axum integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chatrelay_axum::{ApiInfo, AxumContext};
use chatrelay_core::testing::ScriptedUpstream;

/// Identity used by every test context.
pub fn api_info() -> ApiInfo {
    ApiInfo {
        name: "chatrelay-test".to_string(),
        version: "0.0.0".to_string(),
        description: "test relay".to_string(),
    }
}

/// Context whose upstream streams `fragments` for every request.
pub fn scripted_context(fragments: &[&str]) -> (AxumContext, ScriptedUpstream) {
    let upstream = ScriptedUpstream::fragments(fragments.iter().copied());
    (context_for(&upstream), upstream)
}

/// Context backed by a clone of `upstream`; counters stay shared.
pub fn context_for(upstream: &ScriptedUpstream) -> AxumContext {
    AxumContext::new(Arc::new(upstream.clone()), api_info())
}
