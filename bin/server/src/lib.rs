//! jobby REST API server.
//!
//! This crate provides the axum application for the jobby job board: the
//! Auth0 login flow, bearer-token authentication with role gates, and the
//! user, profile and award resources backed by PostgreSQL.

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod notify;
pub mod response;
pub mod router;
