//! Device location: permission tracking and one-shot position fixes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    config::LocationConfig,
    error::GeoError,
    model::{Coordinates, PermissionStatus},
};

/// Platform geolocation capability.
#[async_trait]
pub trait LocationSource: Send + Sync + Debug {
    /// Whether the platform offers geolocation at all.
    fn is_supported(&self) -> bool;

    /// Current permission decision. An `Err` means the query itself failed.
    async fn permission(&self) -> Result<PermissionStatus, GeoError>;

    /// Change notifications, when the platform can report them.
    fn permission_changes(&self) -> Option<watch::Receiver<()>>;

    /// One-shot device fix. May never resolve; callers bound it with a timeout.
    async fn current_position(&self) -> Result<Coordinates, GeoError>;
}

/// Publishes permission status and resolves positions with a deadline.
#[derive(Debug, Clone)]
pub struct GeolocationCoordinator {
    source: Arc<dyn LocationSource>,
    status: Arc<watch::Sender<PermissionStatus>>,
    timeout: Duration,
}

impl GeolocationCoordinator {
    pub fn new(source: Arc<dyn LocationSource>, timeout: Duration) -> Self {
        let (status, _) = watch::channel(PermissionStatus::Unknown);
        Self {
            source,
            status: Arc::new(status),
            timeout,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.source.is_supported()
    }

    /// Last published status.
    pub fn status(&self) -> PermissionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PermissionStatus> {
        self.status.subscribe()
    }

    /// Query the platform and publish the result.
    pub async fn check_status(&self) -> PermissionStatus {
        let status = if !self.source.is_supported() {
            PermissionStatus::Unsupported
        } else {
            match self.source.permission().await {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(error = %e, "Could not check geolocation permission");
                    PermissionStatus::Unknown
                }
            }
        };

        tracing::debug!(status = %status, "Geolocation permission status");
        self.status.send_replace(status);
        status
    }

    /// Re-query and republish whenever the platform reports a permission change.
    ///
    /// Returns `None` when the source cannot report changes.
    pub fn spawn_change_listener(&self) -> Option<JoinHandle<()>> {
        let mut changes = self.source.permission_changes()?;
        let coordinator = self.clone();

        Some(tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let status = coordinator.check_status().await;
                tracing::info!(status = %status, "Geolocation permission changed");
            }
        }))
    }

    /// One-shot fix bounded by the configured timeout.
    pub async fn resolve_current_position(&self) -> Result<Coordinates, GeoError> {
        self.resolve_current_position_within(self.timeout).await
    }

    /// One-shot fix bounded by `timeout`. Never retries.
    pub async fn resolve_current_position_within(
        &self,
        timeout: Duration,
    ) -> Result<Coordinates, GeoError> {
        if !self.source.is_supported() {
            return Err(GeoError::Unsupported);
        }

        match tokio::time::timeout(timeout, self.source.current_position()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(?timeout, "Geolocation request timed out");
                Err(GeoError::Timeout)
            }
        }
    }
}

/// Location taken from the config file, with the consent the user gave there.
#[derive(Debug)]
pub struct FixedLocationSource {
    position: Option<Coordinates>,
    permission: Mutex<PermissionStatus>,
    changes: watch::Sender<()>,
}

impl FixedLocationSource {
    pub fn new(position: Option<Coordinates>, permission: PermissionStatus) -> Self {
        let (changes, _) = watch::channel(());
        Self {
            position,
            permission: Mutex::new(permission),
            changes,
        }
    }

    /// Change the consent and notify listeners.
    pub fn set_permission(&self, permission: PermissionStatus) {
        *self.permission.lock() = permission;
        self.changes.send_replace(());
    }
}

#[async_trait]
impl LocationSource for FixedLocationSource {
    fn is_supported(&self) -> bool {
        true
    }

    async fn permission(&self) -> Result<PermissionStatus, GeoError> {
        Ok(*self.permission.lock())
    }

    fn permission_changes(&self) -> Option<watch::Receiver<()>> {
        Some(self.changes.subscribe())
    }

    async fn current_position(&self) -> Result<Coordinates, GeoError> {
        let permission = *self.permission.lock();
        match permission {
            PermissionStatus::Denied => Err(GeoError::Denied),
            PermissionStatus::Unsupported => Err(GeoError::Unsupported),
            _ => self.position.ok_or(GeoError::Unavailable),
        }
    }
}

/// A platform without geolocation.
#[derive(Debug, Default)]
pub struct UnsupportedLocationSource;

#[async_trait]
impl LocationSource for UnsupportedLocationSource {
    fn is_supported(&self) -> bool {
        false
    }

    async fn permission(&self) -> Result<PermissionStatus, GeoError> {
        Ok(PermissionStatus::Unsupported)
    }

    fn permission_changes(&self) -> Option<watch::Receiver<()>> {
        None
    }

    async fn current_position(&self) -> Result<Coordinates, GeoError> {
        Err(GeoError::Unsupported)
    }
}

/// Pick the location source described by the config.
pub fn location_source_from_config(config: &LocationConfig) -> Arc<dyn LocationSource> {
    if config.permission == PermissionStatus::Unsupported {
        return Arc::new(UnsupportedLocationSource);
    }
    Arc::new(FixedLocationSource::new(config.coordinates(), config.permission))
}
