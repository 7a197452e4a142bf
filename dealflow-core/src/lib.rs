//! Core of the dealflow pipeline CRM: entities, the remote store seam,
//! the optimistic reconciliation session and the pure projections used to
//! render and export the board.

pub mod analytics;
pub mod calendar;
pub mod config;
pub mod export;
pub mod filter;
pub mod layout;
pub mod merge;
pub mod session;
pub mod storage;
pub mod types;
