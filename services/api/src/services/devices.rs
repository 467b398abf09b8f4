//! Kiosk device trust
//!
//! Kiosks never hold user credentials. A device is identified by an opaque id
//! and must be approved by an administrator before its punches are accepted.
//! The first contact from an unknown device registers it as pending.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    Actor, AuditEntry, AuditRecorder, AuditTarget, RequestMeta, ServiceError, ServiceResult,
    audit::snapshot, require_roles,
};
use crate::{
    models::{ADMIN_ROLES, AuditAction, Device, DeviceContext, Principal},
    repositories::{DeviceRepository, DirectoryRepository},
    validation::validate_device_id,
};

/// Why a kiosk request was turned away
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTrustError {
    #[error("Device ID is required")]
    MissingDeviceId,

    #[error("Location ID is required to register a new device")]
    MissingLocation,

    #[error("Device is pending approval")]
    NotApproved,

    #[error("Device has been deactivated")]
    Disabled,
}

impl DeviceTrustError {
    /// Machine-readable code kiosk clients branch on
    pub fn code(self) -> &'static str {
        match self {
            DeviceTrustError::MissingDeviceId => "MISSING_DEVICE_ID",
            DeviceTrustError::MissingLocation => "MISSING_LOCATION",
            DeviceTrustError::NotApproved => "DEVICE_NOT_APPROVED",
            DeviceTrustError::Disabled => "DEVICE_DISABLED",
        }
    }
}

/// Admits kiosk requests and administers the device registry
#[derive(Clone)]
pub struct DeviceGate {
    devices: Arc<dyn DeviceRepository>,
    directory: Arc<dyn DirectoryRepository>,
    audit: AuditRecorder,
}

impl DeviceGate {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        directory: Arc<dyn DirectoryRepository>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            devices,
            directory,
            audit,
        }
    }

    /// Decide whether a kiosk request may proceed.
    ///
    /// Every contact from a known device refreshes its heartbeat, whatever
    /// the outcome. A device may follow a new `location_id` within its
    /// organization; a move into another organization is refused and the
    /// device stays where it was.
    pub async fn admit(
        &self,
        device_id: Option<&str>,
        location_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> ServiceResult<DeviceContext> {
        let device_id = device_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(DeviceTrustError::MissingDeviceId)?;
        validate_device_id(device_id).map_err(ServiceError::Validation)?;

        let Some(device) = self.devices.find_by_device_id(device_id).await? else {
            let location_id = location_id.ok_or(DeviceTrustError::MissingLocation)?;
            self.register(device_id, location_id, now).await?;
            return Err(DeviceTrustError::NotApproved.into());
        };

        let mut move_to = None;
        let mut crossed_organization = false;
        if let Some(location_id) = location_id.filter(|id| *id != device.location_id) {
            if self.same_organization(device.location_id, location_id).await? {
                move_to = Some(location_id);
            } else {
                crossed_organization = true;
            }
        }

        let device = self.devices.touch(device.id, move_to, now).await?;

        if crossed_organization {
            warn!(
                device_id = %device.device_id,
                location_id = ?location_id,
                "Rejected device move into another organization"
            );
            return Err(DeviceTrustError::NotApproved.into());
        }
        if !device.is_approved {
            warn!(device_id = %device.device_id, "Rejected punch from unapproved device");
            return Err(DeviceTrustError::NotApproved.into());
        }
        if !device.is_active {
            warn!(device_id = %device.device_id, "Rejected punch from deactivated device");
            return Err(DeviceTrustError::Disabled.into());
        }

        Ok(DeviceContext::from(&device))
    }

    /// Whether `target` exists and belongs to the organization of `current`.
    async fn same_organization(&self, current: i64, target: i64) -> ServiceResult<bool> {
        let target = self
            .directory
            .find_location(target)
            .await?
            .ok_or(ServiceError::NotFound("Location"))?;
        let current = self.directory.find_location(current).await?;

        Ok(current.is_some_and(|c| c.organization_id == target.organization_id))
    }

    /// Register a first-contact device as pending. Losing the insert to a
    /// concurrent request for the same id is not an error.
    async fn register(
        &self,
        device_id: &str,
        location_id: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let location = self
            .directory
            .find_location(location_id)
            .await?
            .ok_or(ServiceError::NotFound("Location"))?;

        let Some(device) = self.devices.register(device_id, location.id, now).await? else {
            debug!(device_id, "Device already registered, awaiting approval");
            return Ok(());
        };
        info!(
            device_id = %device.device_id,
            location_id = location.id,
            "Registered new device pending approval"
        );

        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::DeviceRegistered,
                    AuditTarget::entity("Device", device.id),
                )
                .organization(location.organization_id)
                .after(snapshot(&device)),
            )
            .await?;

        Ok(())
    }

    pub async fn approve(
        &self,
        principal: &Principal,
        id: i64,
        request: RequestMeta,
    ) -> ServiceResult<Device> {
        require_roles(principal, ADMIN_ROLES)?;
        let before = self.find_in_organization(principal, id).await?;

        let device = self
            .devices
            .set_approved(id, true)
            .await?
            .ok_or(ServiceError::NotFound("Device"))?;
        info!(device_id = %device.device_id, approved_by = principal.user_id, "Device approved");

        self.audit_change(principal, AuditAction::DeviceApproved, &before, &device, request)
            .await?;
        Ok(device)
    }

    /// Soft-disable a device. Its record and history stay in place.
    pub async fn deactivate(
        &self,
        principal: &Principal,
        id: i64,
        request: RequestMeta,
    ) -> ServiceResult<Device> {
        require_roles(principal, ADMIN_ROLES)?;
        let before = self.find_in_organization(principal, id).await?;

        let device = self
            .devices
            .set_active(id, false)
            .await?
            .ok_or(ServiceError::NotFound("Device"))?;
        info!(
            device_id = %device.device_id,
            deactivated_by = principal.user_id,
            "Device deactivated"
        );

        self.audit_change(principal, AuditAction::DeviceDeactivated, &before, &device, request)
            .await?;
        Ok(device)
    }

    async fn find_in_organization(&self, principal: &Principal, id: i64) -> ServiceResult<Device> {
        let device = self
            .devices
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Device"))?;

        match self.directory.find_location(device.location_id).await? {
            Some(location) if location.organization_id == principal.organization_id => Ok(device),
            _ => Err(ServiceError::NotFound("Device")),
        }
    }

    async fn audit_change(
        &self,
        principal: &Principal,
        action: AuditAction,
        before: &Device,
        after: &Device,
        request: RequestMeta,
    ) -> ServiceResult<()> {
        self.audit
            .record(
                AuditEntry::new(action, AuditTarget::entity("Device", after.id))
                    .organization(principal.organization_id)
                    .actor(Actor::from(principal))
                    .request(request)
                    .before(snapshot(before))
                    .after(snapshot(after)),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Role, repositories::memory::MemoryStore};

    async fn setup() -> (Arc<MemoryStore>, DeviceGate, i64) {
        let store = Arc::new(MemoryStore::new());
        let location = store.add_location(1, "Front desk", "WEEKLY", Some(1), None).await;
        let gate = DeviceGate::new(store.clone(), store.clone(), AuditRecorder::new(store.clone()));
        (store, gate, location.id)
    }

    fn admin(organization_id: i64) -> Principal {
        Principal {
            user_id: 10,
            organization_id,
            role: Role::Admin,
            email: "admin@example.com".to_string(),
        }
    }

    fn trust_error(result: ServiceResult<DeviceContext>) -> DeviceTrustError {
        match result {
            Err(ServiceError::Device(e)) => e,
            other => panic!("expected device trust error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_device_id_touches_nothing() {
        let (store, gate, location_id) = setup().await;

        let err = trust_error(gate.admit(Some("  "), Some(location_id), Utc::now()).await);
        assert_eq!(err, DeviceTrustError::MissingDeviceId);
        assert!(store.devices().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_device_without_location() {
        let (store, gate, _) = setup().await;

        let err = trust_error(gate.admit(Some("kiosk-1"), None, Utc::now()).await);
        assert_eq!(err, DeviceTrustError::MissingLocation);
        assert!(store.devices().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_contact_registers_pending_device() {
        let (store, gate, location_id) = setup().await;

        let err = trust_error(gate.admit(Some("kiosk-1"), Some(location_id), Utc::now()).await);
        assert_eq!(err, DeviceTrustError::NotApproved);

        let devices = store.devices().await;
        assert_eq!(devices.len(), 1);
        assert!(!devices[0].is_approved);
        assert!(devices[0].is_active);
        assert!(devices[0].last_seen_at.is_some());

        let logs = store.audit_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::DeviceRegistered);
        assert_eq!(logs[0].user_id, None);
    }

    #[tokio::test]
    async fn test_approved_device_passes_and_heartbeats() {
        let (store, gate, location_id) = setup().await;
        let device = store.add_device("kiosk-1", location_id, true, true).await;

        let now = Utc::now();
        let context = gate.admit(Some("kiosk-1"), None, now).await.unwrap();
        assert_eq!(context.id, device.id);
        assert_eq!(context.location_id, location_id);
        assert_eq!(store.devices().await[0].last_seen_at, Some(now));
    }

    #[tokio::test]
    async fn test_disabled_device_still_heartbeats() {
        let (store, gate, location_id) = setup().await;
        store.add_device("kiosk-1", location_id, true, false).await;

        let err = trust_error(gate.admit(Some("kiosk-1"), None, Utc::now()).await);
        assert_eq!(err, DeviceTrustError::Disabled);
        assert!(store.devices().await[0].last_seen_at.is_some());
    }

    #[tokio::test]
    async fn test_unapproved_wins_over_disabled() {
        let (store, gate, location_id) = setup().await;
        store.add_device("kiosk-1", location_id, false, false).await;

        let err = trust_error(gate.admit(Some("kiosk-1"), None, Utc::now()).await);
        assert_eq!(err, DeviceTrustError::NotApproved);
    }

    #[tokio::test]
    async fn test_device_follows_location_within_organization() {
        let (store, gate, location_id) = setup().await;
        let back_office = store.add_location(1, "Back office", "WEEKLY", Some(1), None).await;
        store.add_device("kiosk-1", location_id, true, true).await;

        let context = gate
            .admit(Some("kiosk-1"), Some(back_office.id), Utc::now())
            .await
            .unwrap();
        assert_eq!(context.location_id, back_office.id);
        assert_eq!(store.devices().await[0].location_id, back_office.id);
    }

    #[tokio::test]
    async fn test_device_cannot_move_to_other_organization() {
        let (store, gate, location_id) = setup().await;
        let elsewhere = store.add_location(2, "Warehouse", "WEEKLY", Some(1), None).await;
        store.add_device("kiosk-1", location_id, true, true).await;

        let now = Utc::now();
        let err = trust_error(gate.admit(Some("kiosk-1"), Some(elsewhere.id), now).await);
        assert_eq!(err, DeviceTrustError::NotApproved);

        let devices = store.devices().await;
        assert_eq!(devices[0].location_id, location_id);
        assert_eq!(devices[0].last_seen_at, Some(now));
    }

    #[tokio::test]
    async fn test_move_to_unknown_location_is_not_found() {
        let (store, gate, location_id) = setup().await;
        store.add_device("kiosk-1", location_id, true, true).await;

        let result = gate.admit(Some("kiosk-1"), Some(9999), Utc::now()).await;
        assert!(matches!(result, Err(ServiceError::NotFound("Location"))));
        assert_eq!(store.devices().await[0].location_id, location_id);
    }

    #[tokio::test]
    async fn test_losing_registration_race_is_not_an_error() {
        let (store, gate, location_id) = setup().await;
        store.add_device("kiosk-1", location_id, false, true).await;

        gate.register("kiosk-1", location_id, Utc::now()).await.unwrap();
        assert_eq!(store.devices().await.len(), 1);
        assert!(store.audit_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_opaque_device_ids_register() {
        let (store, gate, location_id) = setup().await;

        for id in ["{3f2a-uuid}", "dGFibGV0LTE=", "kiosk 1", "_kiosk"] {
            let err = trust_error(gate.admit(Some(id), Some(location_id), Utc::now()).await);
            assert_eq!(err, DeviceTrustError::NotApproved);
        }
        assert_eq!(store.devices().await.len(), 4);
    }

    #[tokio::test]
    async fn test_approve_then_deactivate() {
        let (store, gate, location_id) = setup().await;
        let device = store.add_device("kiosk-1", location_id, false, true).await;

        let approved = gate
            .approve(&admin(1), device.id, RequestMeta::default())
            .await
            .unwrap();
        assert!(approved.is_approved);

        let disabled = gate
            .deactivate(&admin(1), device.id, RequestMeta::default())
            .await
            .unwrap();
        assert!(!disabled.is_active);

        let actions: Vec<_> = store.audit_logs().await.iter().map(|l| l.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::DeviceApproved, AuditAction::DeviceDeactivated]
        );
    }

    #[tokio::test]
    async fn test_approve_other_organization_is_not_found() {
        let (store, gate, location_id) = setup().await;
        let device = store.add_device("kiosk-1", location_id, false, true).await;

        let result = gate.approve(&admin(2), device.id, RequestMeta::default()).await;
        assert!(matches!(result, Err(ServiceError::NotFound("Device"))));
        assert!(!store.devices().await[0].is_approved);
    }
}
