//! Error types for RidgeKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RidgeError
pub type Result<T> = std::result::Result<T, RidgeError>;

/// Unified error type for RidgeKV operations
#[derive(Debug, Error)]
pub enum RidgeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("encode error: {0}")]
    EncodeError(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    // -------------------------------------------------------------------------
    // Cluster / Ring Errors
    // -------------------------------------------------------------------------
    #[error("ring error: {0}")]
    Ring(String),

    #[error("migration failed for {failed} of {total} records after all retries")]
    MigrationFailed { failed: usize, total: usize },
}
