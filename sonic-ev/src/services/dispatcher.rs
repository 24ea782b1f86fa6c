//! Job dispatcher
//!
//! Creates exactly one background job per registered evaluator for a
//! fingerprint, bounding concurrency to |evaluators|. Each evaluator is an
//! independent failure domain: every spawned task owns its own clones, and a
//! failure in one never prevents the others from dispatching or completing.

use crate::models::{JobHandle, JobState, JobStatus, Segment};
use crate::registry::EvaluatorRegistry;
use crate::services::llm::LlmChannel;
use crate::services::store::ResultStore;
use crate::services::worker::EvaluatorWorker;
use chrono::Utc;
use sonic_common::events::{EventBus, SonicEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Shared job status map for per-job polling
#[derive(Clone, Default)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<Uuid, JobStatus>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, status: JobStatus) {
        self.jobs.write().await.insert(status.job_id, status);
    }

    pub async fn set_state(&self, job_id: Uuid, state: JobState, error: Option<String>) {
        if let Some(status) = self.jobs.write().await.get_mut(&job_id) {
            status.state = state;
            status.error = error;
            status.updated_at = Utc::now();
        }
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs.read().await.get(&job_id).cloned()
    }
}

/// Dispatches one evaluator worker per registry entry onto the runtime
pub struct JobDispatcher {
    store: ResultStore,
    llm: Option<Arc<dyn LlmChannel>>,
    event_bus: EventBus,
    tracker: JobTracker,
}

impl JobDispatcher {
    pub fn new(
        store: ResultStore,
        llm: Option<Arc<dyn LlmChannel>>,
        event_bus: EventBus,
        tracker: JobTracker,
    ) -> Self {
        Self {
            store,
            llm,
            event_bus,
            tracker,
        }
    }

    /// Dispatch one job per evaluator; returns a handle per evaluator id.
    ///
    /// An empty registry dispatches zero jobs and is not an error. Callers
    /// poll `JobTracker` (or subscribe to the event bus) per job; there is no
    /// joint barrier and no ordering across evaluators.
    pub async fn dispatch(
        &self,
        fingerprint: &str,
        segments: Arc<Vec<Segment>>,
        registry: &EvaluatorRegistry,
    ) -> HashMap<String, JobHandle> {
        let mut handles = HashMap::new();

        for evaluator in registry.iter() {
            let job_id = Uuid::new_v4();
            let evaluator_id = evaluator.id().to_string();

            self.tracker
                .insert(JobStatus {
                    job_id,
                    evaluator_id: evaluator_id.clone(),
                    fingerprint: fingerprint.to_string(),
                    state: JobState::Queued,
                    error: None,
                    updated_at: Utc::now(),
                })
                .await;

            self.event_bus.emit_lossy(SonicEvent::EvaluationJobQueued {
                job_id,
                evaluator_id: evaluator_id.clone(),
                fingerprint: fingerprint.to_string(),
                timestamp: Utc::now(),
            });

            let worker =
                EvaluatorWorker::new(self.store.clone(), self.llm.clone(), self.event_bus.clone());
            let tracker = self.tracker.clone();
            let event_bus = self.event_bus.clone();
            let evaluator = evaluator.clone();
            let segments = segments.clone();
            let task_fingerprint = fingerprint.to_string();
            let task_evaluator_id = evaluator_id.clone();

            tokio::spawn(async move {
                tracker.set_state(job_id, JobState::Running, None).await;
                event_bus.emit_lossy(SonicEvent::EvaluationJobStarted {
                    job_id,
                    evaluator_id: task_evaluator_id.clone(),
                    fingerprint: task_fingerprint.clone(),
                    timestamp: Utc::now(),
                });

                // The worker runs on its own task so a panicking evaluator
                // surfaces as a JoinError here instead of silently killing
                // this supervisor and leaving the job Running forever.
                let run_fingerprint = task_fingerprint.clone();
                let run = tokio::spawn(async move {
                    worker
                        .run(job_id, &evaluator, &run_fingerprint, &segments)
                        .await
                });

                let outcome = match run.await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(join_err) if join_err.is_panic() => {
                        Err("evaluator task panicked".to_string())
                    }
                    Err(join_err) => Err(join_err.to_string()),
                };

                match outcome {
                    Ok(records) => {
                        tracker.set_state(job_id, JobState::Completed, None).await;
                        event_bus.emit_lossy(SonicEvent::EvaluationJobCompleted {
                            job_id,
                            evaluator_id: task_evaluator_id,
                            fingerprint: task_fingerprint,
                            segments_scored: records.len(),
                            timestamp: Utc::now(),
                        });
                    }
                    Err(error) => {
                        tracing::error!(
                            job_id = %job_id,
                            evaluator = %task_evaluator_id,
                            fingerprint = %task_fingerprint,
                            error = %error,
                            "Evaluator job failed"
                        );
                        tracker
                            .set_state(job_id, JobState::Failed, Some(error.clone()))
                            .await;
                        event_bus.emit_lossy(SonicEvent::EvaluationJobFailed {
                            job_id,
                            evaluator_id: task_evaluator_id,
                            fingerprint: task_fingerprint,
                            error,
                            timestamp: Utc::now(),
                        });
                    }
                }
            });

            tracing::info!(
                job_id = %job_id,
                evaluator = %evaluator_id,
                fingerprint = %fingerprint,
                "Evaluation job dispatched"
            );
            handles.insert(evaluator_id.clone(), JobHandle { job_id, evaluator_id });
        }

        handles
    }
}
