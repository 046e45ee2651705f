//! The `Engine` façade: ties the store, learning layer, and background
//! consolidation worker into the one entry point embedding applications use.

use crate::config::EngineConfig;
use crate::learning::{Applier, ApplyResult, ConsolidationReport, Consolidator, Extractor};
use crate::models::LearningSignal;
use crate::storage::{Backend, BackendStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Ambient cooperative-cancellation signal threaded through long-running
/// engine operations.
///
/// Checked between stages of bounded operations such as
/// [`Engine::consolidate`]; pure in-memory single-entity operations never
/// check it since they have no suspension point to honor it at.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` if [`CancellationToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct WorkerHandle {
    running: Arc<AtomicBool>,
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    thread: std::thread::JoinHandle<()>,
}

/// The hypergraph memory engine: a store plus the learning layer built on
/// top of it.
pub struct Engine {
    backend: Arc<dyn Backend>,
    config: EngineConfig,
    extractor: Extractor,
    consolidator: Consolidator,
    applier: Applier,
    worker: Mutex<Option<WorkerHandle>>,
}

impl Engine {
    /// Creates an engine over `backend` with the given configuration.
    pub fn new(backend: impl Backend + 'static, config: EngineConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
            extractor: Extractor::new(),
            consolidator: Consolidator::new(),
            applier: Applier::new(),
            worker: Mutex::new(None),
        }
    }

    /// Returns the engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extracts learned entities from `signal`. Never fails the caller: the
    /// extractor logs and skips per-item failures internally.
    ///
    /// # Errors
    ///
    /// Returns an error only if persisting the signal's own audit trail
    /// fails at the storage layer in a way the extractor cannot absorb.
    pub fn learn(&self, signal: &LearningSignal) -> crate::Result<()> {
        self.extractor.process_signal(self.backend.as_ref(), signal, &self.config)
    }

    /// Selects relevant learned context for `query`/`domain`/`project_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store queries fail.
    pub fn apply(&self, query: &str, domain: &str, project_path: Option<&str>) -> crate::Result<ApplyResult> {
        self.applier.apply(&self.backend, query, domain, project_path, &self.config)
    }

    /// Appends `apply`'s rendered context additions to `prompt`, separated
    /// by blank lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store queries fail.
    pub fn enhance_prompt(&self, prompt: &str, query: &str, domain: &str, project_path: Option<&str>) -> crate::Result<String> {
        let result = self.apply(query, domain, project_path)?;
        if result.context_additions.is_empty() {
            return Ok(prompt.to_string());
        }
        let mut enhanced = prompt.to_string();
        enhanced.push_str("\n\n");
        enhanced.push_str(&result.context_additions.join("\n"));
        Ok(enhanced)
    }

    /// Returns aggregate store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying query fails.
    pub fn stats(&self) -> crate::Result<BackendStats> {
        self.backend.stats()
    }

    /// Runs one consolidation pass (decay + pruning) across all entity
    /// families, honoring `token` between family stages and the
    /// configured deadline overall.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] if `token` is signalled before
    /// the pass completes, or [`crate::Error::Timeout`] if the configured
    /// deadline elapses first.
    pub fn consolidate(&self, token: &CancellationToken) -> crate::Result<ConsolidationReport> {
        let deadline = Duration::from_secs(self.config.consolidation_timeout_secs);
        let started = Instant::now();
        run_with_deadline(started, deadline, "consolidate_all", || {
            if token.is_cancelled() {
                return Err(crate::Error::Cancelled);
            }
            self.consolidator.consolidate_all(self.backend.as_ref(), &self.config)
        })
    }

    /// Merges near-duplicate facts within `domain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store queries fail.
    pub fn merge_similar(&self, domain: &str) -> crate::Result<usize> {
        self.consolidator.merge_similar_facts(self.backend.as_ref(), domain, &self.config)
    }

    /// Starts the background consolidation worker, ticking every
    /// `consolidation_interval_secs`. A no-op if already running.
    pub fn start(&self) {
        let mut guard = self.worker.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.is_some() {
            return;
        }

        let running = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let consolidator = self.consolidator;
        let interval = Duration::from_secs(self.config.consolidation_interval_secs.max(1));
        let worker_running = Arc::clone(&running);

        let thread = std::thread::spawn(move || {
            while worker_running.load(Ordering::Acquire) {
                if stop_rx.recv_timeout(interval).is_ok() {
                    break;
                }
                if !worker_running.load(Ordering::Acquire) {
                    break;
                }
                let started = Instant::now();
                let deadline = Duration::from_secs(config.consolidation_timeout_secs);
                let outcome = run_with_deadline(started, deadline, "consolidate_all", || {
                    consolidator.consolidate_all(backend.as_ref(), &config)
                });
                if let Err(e) = outcome {
                    tracing::warn!(error = %e, "consolidation tick failed, continuing");
                }
            }
            let _ = done_tx.send(());
        });

        *guard = Some(WorkerHandle {
            running,
            stop_tx,
            done_rx,
            thread,
        });
    }

    /// Stops the background consolidation worker, blocking until it has
    /// fully exited. A no-op if not running.
    pub fn stop(&self) {
        let handle = {
            let mut guard = self.worker.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.take()
        };
        let Some(handle) = handle else {
            return;
        };
        handle.running.store(false, Ordering::Release);
        let _ = handle.stop_tx.send(());
        let _ = handle.done_rx.recv();
        let _ = handle.thread.join();
    }
}

fn run_with_deadline<T>(started: Instant, deadline: Duration, operation: &str, f: impl FnOnce() -> crate::Result<T>) -> crate::Result<T> {
    if started.elapsed() > deadline {
        return Err(crate::Error::Timeout {
            operation: operation.to_string(),
            #[allow(clippy::cast_possible_truncation)]
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SignalContext, SignalType};
    use crate::storage::memory::InMemoryBackend;

    #[test]
    fn test_cancellation_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_learn_and_apply_round_trip() {
        let engine = Engine::new(InMemoryBackend::new(), EngineConfig::default());
        let ctx = SignalContext {
            query: "fix the bug".to_string(),
            output: "returned early".to_string(),
            ..Default::default()
        };
        let signal = LearningSignal::new(SignalType::Success, ctx, 0.9).with_domain("go");
        engine.learn(&signal).unwrap();

        let result = engine.apply("fix the bug", "go", None).unwrap();
        assert!(!result.facts.is_empty());
    }

    #[test]
    fn test_start_stop_is_idempotent() {
        let engine = Engine::new(InMemoryBackend::new(), EngineConfig::default());
        engine.start();
        engine.start();
        engine.stop();
        engine.stop();
    }

    #[test]
    fn test_enhance_prompt_appends_context() {
        let engine = Engine::new(InMemoryBackend::new(), EngineConfig::default());
        let ctx = SignalContext {
            query: "panic handling".to_string(),
            output: "x".to_string(),
            ..Default::default()
        };
        let mut signal = LearningSignal::new(SignalType::Correction, ctx, 0.9).with_domain("go");
        signal.metadata.correction = Some(crate::models::CorrectionDetails {
            original: "panic(err)".to_string(),
            corrected: "return err".to_string(),
            severity: 0.8,
        });
        engine.learn(&signal).unwrap();

        let enhanced = engine.enhance_prompt("Write a function.", "panic handling", "go", None).unwrap();
        assert!(enhanced.contains("[AVOID]"));
    }
}
