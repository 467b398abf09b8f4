//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    jwt::TokenVerifier,
    repositories::{
        AuditLogRepository, DeviceRepository, DirectoryRepository, PayrollPeriodRepository,
        PgAuditLogRepository, PgDeviceRepository, PgDirectoryRepository,
        PgPayrollPeriodRepository, PgPunchRepository, PunchRepository, memory::MemoryStore,
    },
    services::{
        AuditRecorder, DeviceGate, GenerationWindow, PayrollService, PunchBroadcaster,
        PunchService,
    },
};

/// Repository ports the services are built from
#[derive(Clone)]
pub struct Repositories {
    pub punches: Arc<dyn PunchRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub periods: Arc<dyn PayrollPeriodRepository>,
    pub audit_logs: Arc<dyn AuditLogRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
}

impl Repositories {
    /// PostgreSQL repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            punches: Arc::new(PgPunchRepository::new(pool.clone())),
            devices: Arc::new(PgDeviceRepository::new(pool.clone())),
            periods: Arc::new(PgPayrollPeriodRepository::new(pool.clone())),
            audit_logs: Arc::new(PgAuditLogRepository::new(pool.clone())),
            directory: Arc::new(PgDirectoryRepository::new(pool)),
        }
    }

    /// Every port backed by the same in-process store
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            punches: store.clone(),
            devices: store.clone(),
            periods: store.clone(),
            audit_logs: store.clone(),
            directory: store,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<TokenVerifier>,
    pub audit: AuditRecorder,
    pub devices: DeviceGate,
    pub payroll: PayrollService,
    pub punches: PunchService,
    pub broadcaster: PunchBroadcaster,
    /// Defaults for on-demand generation requests
    pub generation_window: GenerationWindow,
    /// Whether `x-forwarded-for` names the audited client address
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(
        repositories: Repositories,
        verifier: TokenVerifier,
        generation_window: GenerationWindow,
    ) -> Self {
        let audit = AuditRecorder::new(repositories.audit_logs);
        let broadcaster = PunchBroadcaster::new();
        let devices = DeviceGate::new(
            repositories.devices,
            repositories.directory.clone(),
            audit.clone(),
        );
        let payroll = PayrollService::new(
            repositories.periods,
            repositories.directory.clone(),
            audit.clone(),
        );
        let punches = PunchService::new(
            repositories.punches,
            repositories.directory,
            payroll.clone(),
            audit.clone(),
            broadcaster.clone(),
        );

        Self {
            verifier: Arc::new(verifier),
            audit,
            devices,
            payroll,
            punches,
            broadcaster,
            generation_window,
            trust_forwarded_for: false,
        }
    }

    /// Trust `x-forwarded-for` set by a fronting proxy.
    pub fn with_trusted_proxy(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}
