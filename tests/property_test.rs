// tests/property_test.rs

//! Property-based tests for the dispatch core.
//!
//! These verify invariants that must hold for arbitrary keys and server
//! replies, independent of any concrete topology.

mod property {
    pub mod redirect_test;
    pub mod slot_test;
}
