//! Realtime provider module.
//!
//! This module provides the application-facing entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RealtimeProvider`] | Identity binding, handler registry, connectivity |
//! | [`ProviderBuilder`] | Fluent configuration builder |
//! | [`ProviderConfig`] | Transport and notifier settings |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for provider configuration.
pub mod builder;

/// Core provider implementation.
pub mod core;

/// Provider settings.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ProviderBuilder;
pub use core::RealtimeProvider;
pub use options::ProviderConfig;
