//! HTTP front-end for browsing remote ROM catalogs and downloading from them.

pub mod api;
pub mod metrics;
pub mod state;
