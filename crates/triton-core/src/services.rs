//! Service discovery and integration patterns.
//!
//! This module provides types and traits for discovering and managing Triton DataCenter services,
//! including UFDS credentials and discovery status tracking.

use crate::error::Error;
use crate::types::TritonService;
use crate::uuid::AppUuid;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// UFDS (User, Forensics, and Directory Services) credentials.
///
/// These credentials are used to authenticate with UFDS, Triton's LDAP-based
/// directory service for user and account management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfdsCredentials {
    /// UFDS admin login (DN - Distinguished Name)
    pub admin_login: String,

    /// UFDS admin password
    #[serde(skip_serializing)]
    pub admin_password: String,

    /// Application UUID that owns these credentials
    pub application_uuid: AppUuid,
}

impl UfdsCredentials {
    /// Create new UFDS credentials.
    ///
    /// # Arguments
    ///
    /// * `admin_login` - The LDAP DN for the admin account
    /// * `admin_password` - The admin password
    /// * `application_uuid` - The UUID of the application these credentials belong to
    #[must_use]
    pub const fn new(
        admin_login: String,
        admin_password: String,
        application_uuid: AppUuid,
    ) -> Self {
        Self {
            admin_login,
            admin_password,
            application_uuid,
        }
    }

    /// Get the LDAP bind DN.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.admin_login
    }

    /// Get the LDAP bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        &self.admin_password
    }

    /// Get the application UUID.
    #[must_use]
    pub const fn app_uuid(&self) -> &AppUuid {
        &self.application_uuid
    }
}

/// Discovery status for monitoring service discovery operations.
///
/// Tracks the health and performance of service discovery, including cache statistics
/// and error tracking.
#[derive(Debug, Clone)]
pub struct DiscoveryStatus {
    /// When discovery was last attempted
    pub last_discovery_at: Option<Instant>,

    /// When discovery last succeeded
    pub last_success_at: Option<Instant>,

    /// Last error message, if any
    pub last_error: Option<String>,

    /// Number of services successfully discovered
    pub discovered_services: usize,

    /// List of services that failed discovery
    pub failed_services: Vec<String>,

    /// Number of cache hits
    pub cache_hits: u64,

    /// Number of cache misses
    pub cache_misses: u64,
}

impl DiscoveryStatus {
    /// Create a new discovery status with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_discovery_at: None,
            last_success_at: None,
            last_error: None,
            discovered_services: 0,
            failed_services: Vec::new(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Record a successful discovery.
    #[must_use]
    pub fn with_success(mut self, service_count: usize) -> Self {
        let now = Instant::now();
        self.last_discovery_at = Some(now);
        self.last_success_at = Some(now);
        self.discovered_services = service_count;
        self.last_error = None;
        self
    }

    /// Record a failed discovery.
    #[must_use]
    pub fn with_error(mut self, error: String, failed_service: Option<String>) -> Self {
        self.last_discovery_at = Some(Instant::now());
        self.last_error = Some(error);
        if let Some(service) = failed_service {
            self.failed_services.push(service);
        }
        self
    }

    /// Update cache statistics.
    #[must_use]
    pub const fn with_cache_stats(mut self, hits: u64, misses: u64) -> Self {
        self.cache_hits = hits;
        self.cache_misses = misses;
        self
    }

    /// Calculate cache hit ratio (0.0 to 1.0).
    #[must_use]
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Check if discovery is healthy (no recent errors).
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.last_error.is_none() && self.discovered_services > 0
    }

    /// Get time since last successful discovery.
    #[must_use]
    pub fn time_since_last_success(&self) -> Option<std::time::Duration> {
        self.last_success_at.map(|t| t.elapsed())
    }

    /// Get time since last discovery attempt.
    #[must_use]
    pub fn time_since_last_attempt(&self) -> Option<std::time::Duration> {
        self.last_discovery_at.map(|t| t.elapsed())
    }
}

impl Default for DiscoveryStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Service discovery abstraction trait.
///
/// Defines the interface for discovering Triton service endpoints. This trait can be
/// implemented by different discovery mechanisms (SAPI-based, static configuration, etc.).
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Discover endpoints for a specific service.
    ///
    /// # Arguments
    ///
    /// * `service_name` - The name of the service to discover (e.g., "vmapi", "cnapi")
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or the service is not found.
    async fn discover_service(&self, service_name: &str) -> crate::Result<Vec<String>>;

    /// Discover all available services.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails.
    async fn discover_all_services(&self) -> crate::Result<Vec<String>>;

    /// Get the current discovery status.
    fn get_status(&self) -> DiscoveryStatus;

    /// Clear any cached discovery data.
    fn clear_cache(&self);

    /// Check if a service is available.
    ///
    /// # Arguments
    ///
    /// * `service_name` - The name of the service to check
    async fn is_service_available(&self, service_name: &str) -> bool {
        self.discover_service(service_name).await.is_ok()
    }
}

/// Generic discovery proxy that records discovery status while delegating to another implementation.
#[derive(Clone)]
pub struct ServiceDiscoveryProxy {
    inner: Arc<dyn ServiceDiscovery>,
    status: Arc<RwLock<DiscoveryStatus>>,
    service_name: String,
}

impl ServiceDiscoveryProxy {
    /// Create a proxy for a specific service name.
    #[must_use]
    pub fn new(inner: Arc<dyn ServiceDiscovery>, service_name: impl Into<String>) -> Self {
        Self {
            inner,
            status: Arc::new(RwLock::new(DiscoveryStatus::new())),
            service_name: service_name.into(),
        }
    }

    /// Create a proxy for a [`TritonService`].
    #[must_use]
    pub fn for_service(inner: Arc<dyn ServiceDiscovery>, service: TritonService) -> Self {
        Self::new(inner, service.name())
    }

    fn record_success(&self, count: usize) {
        if let Ok(mut status) = self.status.write() {
            *status = status.clone().with_success(count);
        }
    }

    fn record_error(&self, error: &Error) {
        if let Ok(mut status) = self.status.write() {
            status.last_error = Some(error.to_string());
        }
    }

    /// Return the service name associated with this proxy.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

#[async_trait::async_trait]
impl ServiceDiscovery for ServiceDiscoveryProxy {
    async fn discover_service(&self, service_name: &str) -> crate::Result<Vec<String>> {
        match self.inner.discover_service(service_name).await {
            Ok(endpoints) => {
                self.record_success(endpoints.len());
                Ok(endpoints)
            }
            Err(err) => {
                self.record_error(&err);
                Err(err)
            }
        }
    }

    async fn discover_all_services(&self) -> crate::Result<Vec<String>> {
        self.inner.discover_service(&self.service_name).await
    }

    fn get_status(&self) -> DiscoveryStatus {
        self.status
            .read()
            .map(|status| status.clone())
            .unwrap_or_else(|_| DiscoveryStatus::new())
    }

    fn clear_cache(&self) {
        if let Ok(mut status) = self.status.write() {
            status.cache_hits = 0;
            status.cache_misses = 0;
        }
    }
}
