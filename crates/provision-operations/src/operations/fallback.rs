use provision_core::{AuditAction, AuditEntry, ProvisioningInput, ProvisioningLog};
use tracing::{info, warn};

use super::service::{ProvisioningRun, ProvisioningService};
use crate::{OperationError, Result};

/// Where a fallback-enabled request ended up.
#[derive(Debug)]
pub enum FallbackOutcome {
    /// Accepted by the remote orchestrator.
    Remote(ProvisioningLog),
    /// Running on the local engine.
    Local(ProvisioningRun),
    /// Stored in the offline queue for a later replay.
    QueuedOffline,
}

impl ProvisioningService {
    /// Starts provisioning on the first provider that accepts the request:
    /// the remote orchestrator, then the local engine, then the offline
    /// queue. Every transition is audited.
    ///
    /// # Errors
    ///
    /// Returns the local trigger's error when no offline queue is configured
    /// or the queue cannot store the request.
    pub async fn provision_site_with_fallback(
        &self,
        input: ProvisioningInput,
    ) -> Result<FallbackOutcome> {
        if let Some(remote) = &self.remote {
            match remote.trigger(&input).await {
                Ok(log) => {
                    self.audit_transition(
                        &input,
                        AuditAction::RemoteOrchestratorUsed,
                        "Provisioning delegated to remote orchestrator".to_string(),
                    )
                    .await;
                    info!(project_code = %input.project_code, "remote orchestrator accepted request");
                    return Ok(FallbackOutcome::Remote(log));
                }
                Err(error) => {
                    warn!(project_code = %input.project_code, %error, "remote orchestrator failed, falling back to local engine");
                    self.audit_transition(
                        &input,
                        AuditAction::FallbackToLocal,
                        format!("Remote orchestrator failed: {error}. Falling back to local engine"),
                    )
                    .await;
                }
            }
        }

        let error = match self.provision_site(input.clone()).await {
            Ok(run) => return Ok(FallbackOutcome::Local(run)),
            Err(error) => error,
        };

        let Some(queue) = &self.offline_queue else {
            return Err(error);
        };

        if let Err(queue_error) = queue.enqueue(&input).await {
            warn!(project_code = %input.project_code, error = %queue_error, "offline queue unavailable");
            return Err(error);
        }

        warn!(project_code = %input.project_code, %error, "local trigger failed, request queued offline");
        self.audit_transition(
            &input,
            AuditAction::QueuedOffline,
            format!("Local trigger failed: {error}. Request queued for replay"),
        )
        .await;
        Ok(FallbackOutcome::QueuedOffline)
    }

    /// Triggers every request in the offline queue. Requests that still
    /// cannot be started are put back.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be drained. Every drained request
    /// is still attempted when one cannot be put back;
    /// [`OperationError::ReplayRequeue`] then names the requests that were
    /// dropped, and runs already started continue in the background.
    pub async fn replay_offline_queue(&self) -> Result<Vec<ProvisioningRun>> {
        let Some(queue) = &self.offline_queue else {
            return Ok(Vec::new());
        };

        let pending = queue.drain().await?;
        info!(count = pending.len(), "replaying offline queue");

        let mut runs = Vec::with_capacity(pending.len());
        let mut dropped = Vec::new();
        for input in pending {
            match self.provision_site(input.clone()).await {
                Ok(run) => {
                    self.audit_transition(
                        &input,
                        AuditAction::OfflineReplayed,
                        "Queued request replayed on local engine".to_string(),
                    )
                    .await;
                    runs.push(run);
                }
                Err(error) => {
                    warn!(project_code = %input.project_code, %error, "replay failed, re-queueing");
                    if let Err(queue_error) = queue.enqueue(&input).await {
                        warn!(
                            project_code = %input.project_code,
                            error = %queue_error,
                            request = ?input,
                            "could not re-queue request, it must be resubmitted"
                        );
                        dropped.push(input.project_code);
                    }
                }
            }
        }

        if !dropped.is_empty() {
            return Err(OperationError::ReplayRequeue {
                project_codes: dropped,
            });
        }
        Ok(runs)
    }

    async fn audit_transition(&self, input: &ProvisioningInput, action: AuditAction, details: String) {
        self.context
            .audit()
            .record(AuditEntry::project(
                action,
                &input.project_code,
                &input.requested_by,
                details,
            ))
            .await;
    }
}
