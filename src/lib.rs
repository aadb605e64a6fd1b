//! Ki Clash Server - authoritative 2D fighting-game sessions
//!
//! Each session runs a fixed-rate combat simulation (one human fighter
//! against an AI opponent) and streams snapshots to its WebSocket clients.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
