use crate::assets::{DashboardAssets, NoAssets};
use crate::error::Result;
use crate::store::ReportStore;
use async_trait::async_trait;
use buildlens_engine::{Assembler, CategoryCounts};
use buildlens_protocol::{BuildTrigger, ClassifiedDiagnostic, Report};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub const DEFAULT_BLOCKING_MESSAGE: &str = "[error report] 存在强阻断错误，编译已停止";

/// Receives every report that completes a cycle without halting.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish(&self, report: &Report);
}

/// What happens when blocking diagnostics are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingPolicy {
    /// Halt the cycle (and the host process) on blocking diagnostics.
    pub strict: bool,
    pub message: String,
}

impl Default for BlockingPolicy {
    fn default() -> Self {
        Self {
            strict: false,
            message: DEFAULT_BLOCKING_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Collecting,
    Classifying,
    Grouping,
    Assembling,
    Persisting,
    Halted,
    Publishing,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Published {
        report_path: PathBuf,
        report: Report,
        error_counts: CategoryCounts,
        warning_counts: CategoryCounts,
    },
    /// Another cycle was in flight; the trigger was discarded.
    Dropped,
    /// The report is on disk and the caller is expected to terminate.
    Halted {
        report_path: PathBuf,
        report: Report,
        blocking: Vec<ClassifiedDiagnostic>,
        message: String,
    },
}

/// Exclusive right to run one cycle. Dropping it returns the pipeline to idle.
#[derive(Debug)]
pub struct CycleGuard {
    state: Arc<Mutex<CycleState>>,
}

impl CycleGuard {
    fn advance(&self, next: CycleState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        log::debug!("Report cycle {:?} -> {:?}", *state, next);
        *state = next;
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = CycleState::Idle;
    }
}

pub struct ReportPipeline {
    assembler: Assembler,
    store: ReportStore,
    policy: BlockingPolicy,
    assets: Arc<dyn DashboardAssets>,
    publisher: RwLock<Option<Arc<dyn ReportPublisher>>>,
    state: Arc<Mutex<CycleState>>,
}

impl ReportPipeline {
    pub fn new(assembler: Assembler, store: ReportStore) -> Self {
        Self {
            assembler,
            store,
            policy: BlockingPolicy::default(),
            assets: Arc::new(NoAssets),
            publisher: RwLock::new(None),
            state: Arc::new(Mutex::new(CycleState::Idle)),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: BlockingPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_assets(mut self, assets: Arc<dyn DashboardAssets>) -> Self {
        self.assets = assets;
        self
    }

    /// Attaches the live server once it is up. Later cycles notify it.
    pub fn set_publisher(&self, publisher: Arc<dyn ReportPublisher>) {
        *self
            .publisher
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(publisher);
    }

    #[must_use]
    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    #[must_use]
    pub fn policy(&self) -> &BlockingPolicy {
        &self.policy
    }

    #[must_use]
    pub fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idle → Collecting. Returns `None` while another cycle holds the guard.
    pub fn try_begin(&self) -> Option<CycleGuard> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != CycleState::Idle {
            return None;
        }
        *state = CycleState::Collecting;
        Some(CycleGuard {
            state: Arc::clone(&self.state),
        })
    }

    pub async fn on_build_complete(&self, trigger: BuildTrigger) -> Result<CycleOutcome> {
        let Some(guard) = self.try_begin() else {
            log::info!("Report generation already in progress; dropping build trigger");
            return Ok(CycleOutcome::Dropped);
        };
        self.run_cycle(&guard, trigger).await
    }

    /// Runs a cycle under a guard obtained from [`Self::try_begin`].
    pub async fn run_cycle(&self, guard: &CycleGuard, trigger: BuildTrigger) -> Result<CycleOutcome> {
        log::debug!(
            "Build completed with {} error(s) and {} warning(s)",
            trigger.errors.len(),
            trigger.warnings.len()
        );

        guard.advance(CycleState::Classifying);
        let classified = self
            .assembler
            .classify(&trigger.errors, &trigger.warnings, Utc::now());

        guard.advance(CycleState::Grouping);
        let grouped = self.assembler.group(classified);

        guard.advance(CycleState::Assembling);
        let assembly = self.assembler.finish(grouped);

        guard.advance(CycleState::Persisting);
        let report_path = self.store.publish(&assembly.report).await.inspect_err(|err| {
            log::error!("Failed to persist report: {err}");
        })?;
        self.assets
            .write_assets(self.store.output_dir())
            .await
            .inspect_err(|err| log::error!("Failed to write dashboard assets: {err}"))?;

        if self.policy.strict && assembly.has_blocking() {
            guard.advance(CycleState::Halted);
            log::error!(
                "{} blocking diagnostic(s) under strict mode",
                assembly.blocking.len()
            );
            return Ok(CycleOutcome::Halted {
                report_path,
                report: assembly.report,
                blocking: assembly.blocking,
                message: self.policy.message.clone(),
            });
        }

        guard.advance(CycleState::Publishing);
        let publisher = self
            .publisher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(publisher) = publisher {
            publisher.publish(&assembly.report).await;
        }

        Ok(CycleOutcome::Published {
            report_path,
            report: assembly.report,
            error_counts: assembly.error_counts,
            warning_counts: assembly.warning_counts,
        })
    }
}

/// Operator-facing lines for blocking diagnostics.
#[must_use]
pub fn render_blocking(blocking: &[ClassifiedDiagnostic]) -> Vec<String> {
    blocking
        .iter()
        .map(|d| {
            let location = d
                .location
                .map(|loc| format!(":{}:{}", loc.line, loc.column))
                .unwrap_or_default();
            let mut line = format!("[{}] {}{}: {}", d.kind, d.file_path, location, d.message);
            if let Some(remediation) = d.type_desc.as_deref() {
                let _ = write!(line, " ({remediation})");
            }
            line
        })
        .collect()
}
