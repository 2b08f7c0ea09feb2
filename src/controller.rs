//! Incremental page translation.
//!
//! The controller collects untranslated text nodes, translates them in
//! fixed-size batches and writes the results back in place. After the first
//! pass it watches the page for changes and, once they settle, translates
//! whatever is new.
//!
//! Its own writes never re-trigger it: each written node is recorded and
//! its owning element marked before the text is written, and mutations of
//! recorded nodes are ignored. Only written nodes are excluded, so a marked
//! element still picks up children added later and siblings that failed.
//!
//! The page is not `Send`; run the controller on a [`tokio::task::LocalSet`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::collector::{TextCollector, TextNodeRef};
use crate::dom::{parent_of, text_of, Mutation, MutationKind, Page};
use crate::engine::BatchTranslator;
use crate::request::TranslationRequest;
use crate::settings::{Settings, SettingsStore};

/// Tuning of the page controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Text nodes per `translate_batch` call
    pub batch_size: usize,
    /// Quiet interval after the last relevant mutation before a new pass
    pub debounce: Duration,
}

impl ControllerConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 150;
    pub const DEFAULT_DEBOUNCE_MS: u64 = 600;
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            debounce: Duration::from_millis(Self::DEFAULT_DEBOUNCE_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Collecting,
    Dispatching,
    Writing,
}

/// What one translation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Another pass was in flight; nothing was done
    pub skipped: bool,
    pub collected: usize,
    pub translated: usize,
    /// Items left untouched because their translation failed
    pub failed: usize,
    /// Items whose text changed while their batch was in flight
    pub stale: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Holds the single in-flight slot for the duration of a pass.
struct CycleGuard<'a> {
    in_flight: &'a Cell<bool>,
    state: &'a Cell<ControllerState>,
}

impl<'a> CycleGuard<'a> {
    fn acquire(in_flight: &'a Cell<bool>, state: &'a Cell<ControllerState>) -> Option<Self> {
        if in_flight.replace(true) {
            return None;
        }
        Some(Self { in_flight, state })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.state.set(ControllerState::Idle);
        self.in_flight.set(false);
    }
}

pub struct PageTranslationController {
    page: Rc<Page>,
    translator: Arc<dyn BatchTranslator>,
    settings: Arc<dyn SettingsStore>,
    config: ControllerConfig,
    /// Everything but the target language, which comes from the settings
    request: TranslationRequest,
    collector: RefCell<TextCollector>,
    state: Cell<ControllerState>,
    in_flight: Cell<bool>,
}

impl PageTranslationController {
    pub fn new(
        page: Rc<Page>,
        translator: Arc<dyn BatchTranslator>,
        settings: Arc<dyn SettingsStore>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            page,
            translator,
            settings,
            config,
            request: TranslationRequest::default(),
            collector: RefCell::new(TextCollector::new()),
            state: Cell::new(ControllerState::Idle),
            in_flight: Cell::new(false),
        }
    }

    /// Template for outgoing requests; its target is replaced per pass.
    pub fn with_request(mut self, request: TranslationRequest) -> Self {
        self.request = request;
        self
    }

    pub fn with_collector(mut self, collector: TextCollector) -> Self {
        self.collector = RefCell::new(collector);
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state.get()
    }

    pub fn page(&self) -> &Rc<Page> {
        &self.page
    }

    /// Spawn [`PageTranslationController::run`] on the current `LocalSet`.
    pub fn start(self: &Rc<Self>) -> JoinHandle<()> {
        tokio::task::spawn_local(Rc::clone(self).run())
    }

    /// Observe the page for its whole lifetime.
    ///
    /// Translates once on start when auto mode is on, then after every burst
    /// of relevant mutations followed by a quiet debounce interval. Returns
    /// only when the page stops reporting mutations.
    pub async fn run(self: Rc<Self>) {
        let mut mutations = self.page.observe();

        if Settings::load(self.settings.as_ref()).await.auto_translate {
            self.translate_page().await;
        }

        while let Some(mutation) = mutations.recv().await {
            if !self.is_relevant(&mutation) {
                continue;
            }
            if !self.debounce(&mut mutations).await {
                break;
            }

            debug!("Page settled after {:?}, re-checking auto mode", self.config.debounce);
            loop {
                if !Settings::load(self.settings.as_ref()).await.auto_translate {
                    debug!("Auto-translate is off, skipping pass");
                    break;
                }
                if !self.translate_page().await.skipped {
                    break;
                }
                // An explicitly requested pass owns the page; try again once it settles.
                // Mutations arriving meanwhile stay queued and are picked up by this
                // retried pass, then debounced once more by the outer loop.
                sleep(self.config.debounce).await;
            }
        }

        debug!("Page observer closed, controller stopping");
    }

    /// Wait until no relevant mutation arrived for a full debounce interval.
    ///
    /// Returns `false` if the mutation stream ended while waiting.
    async fn debounce(&self, mutations: &mut mpsc::UnboundedReceiver<Mutation>) -> bool {
        let timer = sleep(self.config.debounce);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return true,
                next = mutations.recv() => match next {
                    Some(mutation) if self.is_relevant(&mutation) => {
                        timer.as_mut().reset(Instant::now() + self.config.debounce);
                    }
                    Some(_) => {}
                    None => return false,
                },
            }
        }
    }

    /// Whether a mutation may have introduced untranslated text.
    ///
    /// Attribute changes never do. Text changes count unless the node was
    /// written by us, which covers our own writes.
    pub fn is_relevant(&self, mutation: &Mutation) -> bool {
        let collector = self.collector.borrow();
        match mutation.kind {
            MutationKind::Attributes(_) => false,
            MutationKind::CharacterData => {
                let Some(owner) = parent_of(&mutation.target) else {
                    return false;
                };
                let has_text = text_of(&mutation.target).is_some_and(|t| !t.trim().is_empty());
                has_text
                    && !collector.is_translated_text(&mutation.target)
                    && !collector.is_inside_skipped(&owner)
            }
            MutationKind::ChildList => !collector.is_inside_skipped(&mutation.target),
        }
    }

    /// Run one Collecting → Dispatching → Writing pass.
    ///
    /// If a pass is already in flight this returns a report with `skipped`
    /// set; the pending change is picked up by the next debounced pass.
    pub async fn translate_page(&self) -> CycleReport {
        let Some(_guard) = CycleGuard::acquire(&self.in_flight, &self.state) else {
            debug!("Translation pass already in flight, skipping");
            return CycleReport {
                skipped: true,
                ..CycleReport::default()
            };
        };

        let settings = Settings::load(self.settings.as_ref()).await;
        let request = self.request.for_target(settings.default_target);

        self.state.set(ControllerState::Collecting);
        let root = self.page.body().unwrap_or_else(|| self.page.document());
        let mut items = self.collector.borrow_mut().collect(&root);

        let mut report = CycleReport {
            collected: items.len(),
            ..CycleReport::default()
        };
        if items.is_empty() {
            debug!("Nothing to translate");
            return report;
        }

        for batch in items.chunks_mut(self.config.batch_size.max(1)) {
            self.state.set(ControllerState::Dispatching);
            report.batches += 1;

            let texts: Vec<String> = batch.iter().map(|i| i.source_text().to_string()).collect();
            let results = match self.translator.translate_batch(&texts, &request).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(
                        "Batch {} ({} node(s)) failed, leaving it untranslated: {}",
                        report.batches,
                        batch.len(),
                        e
                    );
                    report.failed_batches += 1;
                    report.failed += batch.len();
                    continue;
                }
            };

            if results.len() != batch.len() {
                warn!(
                    "Batch {} returned {} result(s) for {} node(s)",
                    report.batches,
                    results.len(),
                    batch.len()
                );
                report.failed += batch.len().saturating_sub(results.len());
            }

            self.state.set(ControllerState::Writing);
            for (item, result) in batch.iter_mut().zip(results) {
                match result {
                    Ok(translated) => {
                        if self.write(item, &translated) {
                            report.translated += 1;
                        } else {
                            report.stale += 1;
                        }
                    }
                    Err(e) => {
                        debug!("Leaving {:?} untranslated: {}", item.source_text(), e);
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            "✓ Page pass: {} collected, {} translated, {} failed, {} batch(es)",
            report.collected, report.translated, report.failed, report.batches
        );
        report
    }

    /// Record the node and mark its owner, then replace the text.
    ///
    /// Skips nodes whose text changed since collection.
    fn write(&self, item: &mut TextNodeRef, translated: &str) -> bool {
        if text_of(&item.node).as_deref() != Some(item.original_text.as_str()) {
            debug!("Text changed while in flight, not overwriting");
            return false;
        }

        self.collector.borrow_mut().record_written(item);
        self.page.mark_translated(&item.owner);
        item.owner_marked = true;
        self.page.set_text(&item.node, &item.rewrap(translated))
    }
}
