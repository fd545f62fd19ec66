//! Request gate, outermost first:
//! 1. Request log: one access line per request
//! 2. Authenticate: bearer token → identity (router level)
//! 3. Authorize: role capability for the route's action
//! 4. Subscription: tenant subscription window
//! 5. Feature: tenant feature flag
//!
//! Stages 3-5 are attached per route.

pub mod auth;
pub mod authorize;
pub mod request_log;
pub mod subscription;
