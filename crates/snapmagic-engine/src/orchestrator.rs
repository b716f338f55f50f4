use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use snapmagic_contracts::batch::{progress_percent, BatchContext};
use snapmagic_contracts::events::EventWriter;
use snapmagic_contracts::photos::{
    EditFailureKind, EditedImage, PhotoRegistry, PhotoSource, PhotoStatus,
};
use uuid::Uuid;

use crate::codec;
use crate::editors::ImageEditor;
use crate::error::EditError;

/// The terminal outcome of one photo in a batch, as applied to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub photo_id: String,
    pub status: PhotoStatus,
    pub failure: Option<EditFailureKind>,
    pub message: Option<String>,
    /// `false` when the photo was removed before its result arrived.
    pub applied: bool,
    pub progress: u8,
}

/// Outcome of one batch. The default value is the report of a batch that had
/// nothing pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: Option<String>,
    pub prompt: Option<String>,
    pub total: usize,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub settlements: Vec<Settlement>,
    pub progress_trail: Vec<u8>,
}

impl BatchReport {
    pub fn is_noop(&self) -> bool {
        self.total == 0
    }

    pub fn done_count(&self) -> usize {
        self.count_status(PhotoStatus::Done)
    }

    pub fn failed_count(&self) -> usize {
        self.count_status(PhotoStatus::Error)
    }

    pub fn final_progress(&self) -> u8 {
        self.progress_trail.last().copied().unwrap_or(0)
    }

    fn count_status(&self, status: PhotoStatus) -> usize {
        self.settlements
            .iter()
            .filter(|settlement| settlement.status == status)
            .count()
    }
}

struct EditJob {
    photo_id: String,
    source: PhotoSource,
}

struct WorkerMessage {
    photo_id: String,
    result: Result<EditedImage, EditError>,
}

type JobQueue = Arc<Mutex<VecDeque<EditJob>>>;

/// Fans a resolved instruction out over every pending photo.
pub struct BatchOrchestrator {
    editor: Arc<dyn ImageEditor>,
    events: Option<EventWriter>,
    max_in_flight: Option<usize>,
}

impl BatchOrchestrator {
    pub fn new(editor: Arc<dyn ImageEditor>) -> Self {
        Self {
            editor,
            events: None,
            max_in_flight: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    /// Caps simultaneous edit calls. `0` means no cap (every photo at once).
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = (limit > 0).then_some(limit);
        self
    }

    pub fn editor_name(&self) -> &str {
        self.editor.name()
    }

    /// Starts a batch over the photos currently `Pending`.
    ///
    /// Returns `None` and leaves `ctx` untouched when nothing is pending.
    /// Otherwise every selected photo is `Processing` on return and its edit is
    /// already dispatched; settle the run with [`BatchRun::next_settlement`] or
    /// [`BatchRun::finish`].
    pub fn start(&self, ctx: &mut BatchContext, registry: &mut PhotoRegistry) -> Option<BatchRun> {
        let jobs: Vec<EditJob> = registry
            .pending_ids()
            .into_iter()
            .filter_map(|photo_id| {
                let source = registry.get(&photo_id)?.source.clone();
                Some(EditJob { photo_id, source })
            })
            .collect();
        if jobs.is_empty() {
            return None;
        }

        let prompt = ctx.selection.instruction();
        let batch_id = format!("batch-{}", Uuid::new_v4());
        let started_at = now_utc_iso();
        let total = jobs.len();
        let photo_ids: Vec<String> = jobs.iter().map(|job| job.photo_id.clone()).collect();

        if let Some(events) = &self.events {
            events.set_batch_id(batch_id.clone());
        }
        self.emit(
            "batch_started",
            json!({
                "tool": ctx.selection.tool().id(),
                "editor": self.editor.name(),
                "prompt_sha256": hex::encode(Sha256::digest(prompt.as_bytes())),
                "total": total,
                "photo_ids": photo_ids,
                "max_in_flight": self.max_in_flight,
            }),
        );

        ctx.is_processing = true;
        ctx.progress = 0;

        for photo_id in &photo_ids {
            registry.mutate(photo_id, PhotoStatus::Processing, None);
            self.emit("photo_processing", json!({ "photo_id": photo_id }));
        }

        let (tx, rx) = mpsc::channel();
        let handles = self.dispatch(jobs, &prompt, &tx);

        Some(BatchRun {
            batch_id,
            prompt,
            started_at,
            total,
            settled: 0,
            outstanding: photo_ids.into_iter().collect(),
            receiver: rx,
            handles,
            events: self.events.clone(),
            settlements: Vec::new(),
            progress_trail: Vec::new(),
        })
    }

    /// Starts a batch and waits until every photo has settled. Never fails:
    /// per-photo errors end up in the registry and the report.
    pub fn run_batch(&self, ctx: &mut BatchContext, registry: &mut PhotoRegistry) -> BatchReport {
        match self.start(ctx, registry) {
            Some(run) => run.finish(ctx, registry),
            None => BatchReport::default(),
        }
    }

    fn dispatch(
        &self,
        jobs: Vec<EditJob>,
        prompt: &str,
        tx: &mpsc::Sender<WorkerMessage>,
    ) -> Vec<thread::JoinHandle<()>> {
        let queues: Vec<JobQueue> = match self.max_in_flight {
            Some(limit) if limit < jobs.len() => {
                let shared: JobQueue = Arc::new(Mutex::new(jobs.into_iter().collect()));
                (0..limit).map(|_| Arc::clone(&shared)).collect()
            }
            _ => jobs
                .into_iter()
                .map(|job| Arc::new(Mutex::new(VecDeque::from([job]))))
                .collect(),
        };

        let mut handles = Vec::with_capacity(queues.len());
        for (idx, queue) in queues.into_iter().enumerate() {
            let worker = EditWorker {
                editor: Arc::clone(&self.editor),
                prompt: prompt.to_string(),
                queue: Arc::clone(&queue),
                sender: tx.clone(),
            };
            match thread::Builder::new()
                .name(format!("snapmagic-edit-{idx}"))
                .spawn(move || worker.run())
            {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // Settle whatever this worker would have taken so the
                    // batch still completes.
                    while let Some(job) = pop_job(&queue) {
                        let _ = tx.send(WorkerMessage {
                            photo_id: job.photo_id,
                            result: Err(EditError::Service(format!(
                                "edit worker spawn failed: {err}"
                            ))),
                        });
                    }
                }
            }
        }
        handles
    }

    fn emit(&self, event_type: &str, payload: Value) {
        emit_event(self.events.as_ref(), event_type, payload);
    }
}

struct EditWorker {
    editor: Arc<dyn ImageEditor>,
    prompt: String,
    queue: JobQueue,
    sender: mpsc::Sender<WorkerMessage>,
}

impl EditWorker {
    fn run(self) {
        while let Some(job) = pop_job(&self.queue) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                let payload = codec::encode(&job.source)?;
                self.editor.edit(&payload, &self.prompt)
            }))
            .unwrap_or_else(|_| Err(EditError::Service("editor panicked".to_string())));
            let _ = self.sender.send(WorkerMessage {
                photo_id: job.photo_id,
                result,
            });
        }
    }
}

fn pop_job(queue: &JobQueue) -> Option<EditJob> {
    match queue.lock() {
        Ok(mut guard) => guard.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

/// A batch in flight. The holder of this value is the only writer of the
/// registry for the batch's results; it may add or remove photos between
/// settlements.
pub struct BatchRun {
    batch_id: String,
    prompt: String,
    started_at: String,
    total: usize,
    settled: usize,
    outstanding: HashSet<String>,
    receiver: mpsc::Receiver<WorkerMessage>,
    handles: Vec<thread::JoinHandle<()>>,
    events: Option<EventWriter>,
    settlements: Vec<Settlement>,
    progress_trail: Vec<u8>,
}

impl BatchRun {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn settled(&self) -> usize {
        self.settled
    }

    pub fn is_complete(&self) -> bool {
        self.settled >= self.total
    }

    /// Blocks for the next photo to settle, applies it to `registry`, and
    /// updates `ctx.progress`. Returns `None` once every photo has settled.
    pub fn next_settlement(
        &mut self,
        ctx: &mut BatchContext,
        registry: &mut PhotoRegistry,
    ) -> Option<Settlement> {
        if self.is_complete() {
            return None;
        }

        let message = loop {
            match self.receiver.recv() {
                Ok(message) if self.outstanding.remove(&message.photo_id) => break message,
                Ok(_) => continue,
                Err(_) => {
                    let orphan = self.orphaned_message()?;
                    self.outstanding.remove(&orphan.photo_id);
                    break orphan;
                }
            }
        };

        let photo_id = message.photo_id;
        let (status, failure, message_text, applied) = match message.result {
            Ok(edited) => {
                let applied = registry.mutate(&photo_id, PhotoStatus::Done, Some(edited));
                (PhotoStatus::Done, None, None, applied)
            }
            Err(err) => {
                let kind = err.kind();
                let applied = registry.mutate(&photo_id, PhotoStatus::Error, None);
                registry.record_failure(&photo_id, kind);
                (PhotoStatus::Error, Some(kind), Some(err.to_string()), applied)
            }
        };

        self.settled += 1;
        let progress = progress_percent(self.settled, self.total);
        ctx.progress = progress;
        self.progress_trail.push(progress);

        let settlement = Settlement {
            photo_id,
            status,
            failure,
            message: message_text,
            applied,
            progress,
        };
        emit_event(
            self.events.as_ref(),
            "photo_settled",
            json!({
                "photo_id": settlement.photo_id,
                "status": settlement.status.as_str(),
                "failure": settlement.failure.map(EditFailureKind::as_str),
                "message": settlement.message,
                "applied": settlement.applied,
                "settled": self.settled,
                "total": self.total,
                "progress": progress,
            }),
        );
        self.settlements.push(settlement.clone());

        if self.is_complete() {
            self.complete(ctx);
        }
        Some(settlement)
    }

    /// Waits for every remaining photo and returns the full report.
    pub fn finish(mut self, ctx: &mut BatchContext, registry: &mut PhotoRegistry) -> BatchReport {
        while self.next_settlement(ctx, registry).is_some() {}
        BatchReport {
            batch_id: Some(self.batch_id),
            prompt: Some(self.prompt),
            total: self.total,
            started_at: Some(self.started_at),
            finished_at: Some(now_utc_iso()),
            settlements: self.settlements,
            progress_trail: self.progress_trail,
        }
    }

    fn complete(&mut self, ctx: &mut BatchContext) {
        ctx.is_processing = false;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        let done = self
            .settlements
            .iter()
            .filter(|settlement| settlement.status == PhotoStatus::Done)
            .count();
        emit_event(
            self.events.as_ref(),
            "batch_finished",
            json!({
                "total": self.total,
                "done": done,
                "failed": self.total - done,
                "progress": ctx.progress,
            }),
        );
    }

    /// Every worker hung up with photos still unreported; settle one of them
    /// as a failure so the join still terminates.
    fn orphaned_message(&self) -> Option<WorkerMessage> {
        let photo_id = self.outstanding.iter().next()?.clone();
        Some(WorkerMessage {
            photo_id,
            result: Err(EditError::Service(
                "edit worker exited without reporting".to_string(),
            )),
        })
    }
}

fn emit_event(events: Option<&EventWriter>, event_type: &str, payload: Value) {
    let Some(events) = events else {
        return;
    };
    if let Err(err) = events.emit(event_type, map_object(payload)) {
        eprintln!("snapmagic: event log write failed: {err:#}");
    }
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
