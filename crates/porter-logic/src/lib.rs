//! Pure simulation logic for a load-bearing porter.
//!
//! This crate holds the carry, stacking and balance rules independent of
//! any engine. The host scene and movement input are reached only through
//! the traits in [`scene`] and [`input`], so every rule can be driven from
//! unit tests or a headless harness with the in-memory [`scene::SimScene`].
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`balance`] | Balance scalar, stability bands, fall trigger, speed modifier |
//! | [`cargo`] | Cargo records, stack layers, weight and sway totals |
//! | [`config`] | Porter tuning values and their validation |
//! | [`error`] | Errors that abort a porter operation |
//! | [`events`] | Porter notifications and the subscriber list |
//! | [`fragile`] | Fragile cargo lifecycle and durability |
//! | [`input`] | Injected movement input and its per-frame sample |
//! | [`inventory`] | Pickup, drop and heaviest-first reorganize |
//! | [`placement`] | Free-slot search above the carry anchor |
//! | [`porter`] | Per-frame facade tying the pieces together |
//! | [`scene`] | Host scene traits and the in-memory scene |
//! | [`sway`] | Carry-anchor sway while walking under load |
//! | [`transition`] | Eased mount and reorganize animations |

pub mod balance;
pub mod cargo;
pub mod config;
pub mod error;
pub mod events;
pub mod fragile;
pub mod input;
pub mod inventory;
pub mod placement;
pub mod porter;
pub mod scene;
pub mod sway;
pub mod transition;
