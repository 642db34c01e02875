//! Campaign & Lead Qualification API Library
//!
//! Discovery, enrichment, scoring and messaging pipeline for healthcare
//! marketing campaigns, plus the HTTP handlers that expose it.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `cache_validator`: Cache validation utilities.
//! - `circuit_breaker`: Circuit breaker implementation.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Postgres lead store.
//! - `discovery`: Single discovery adapter invocation.
//! - `enrichment`: Lead enrichment and contact validation.
//! - `errors`: Error handling types.
//! - `gateway_client`: WhatsApp gateway client.
//! - `handlers`: HTTP request handlers.
//! - `memory_store`: In-process lead store.
//! - `messaging`: Lead messaging and message log.
//! - `models`: Core data models.
//! - `orchestrator`: Campaign runs.
//! - `roi`: ROI/break-even calculator.
//! - `scoring`: Lead scoring engine.
//! - `services`: External service clients (CFM registry, social search).
//! - `settle`: Settle-all batch combinator.
//! - `sources`: Discovery sources.
//! - `store`: Persistence trait.
//! - `webhook_handler`: Payment webhook handler.
//! - `webhook_models`: Payment webhook payload models.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod discovery;
pub mod enrichment;
pub mod errors;
pub mod gateway_client;
pub mod handlers;
pub mod memory_store;
pub mod messaging;
pub mod models;
pub mod orchestrator;
pub mod roi;
pub mod scoring;
pub mod services;
pub mod settle;
pub mod sources;
pub mod store;
pub mod webhook_handler;
pub mod webhook_models;
