//! Terminal front end: one thread owns the sync session, everything else
//! talks to it through the inbox channel.
pub mod app;
pub mod commands;
pub mod config;
pub mod effects;
pub mod logging;
pub mod render;
