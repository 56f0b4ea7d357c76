//! Background worker owning one editing session and the backend handles.

use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::Config,
    errors::{Alert, Backend},
    product::{Category, Product, ProductDraft},
    repository::{ProductCatalog, ProductRepository, Reachability},
    submission::{Blocker, EditingSession, SubmissionState, SubmitOutcome, Submitter},
    validate::FieldErrorSet,
};

/// Number of products returned by [`WorkerCmd::FetchMostScanned`].
pub const MOST_SCANNED_LIMIT: usize = 5;

/// Commands sent from the shell to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Replace the draft (barcode stays if already set).
    ReplaceDraft(ProductDraft),
    /// Record a scanned barcode.
    SetBarcode(String),
    /// Attach image bytes to the draft.
    SelectImage(Vec<u8>),
    /// Append an empty ingredient slot.
    AddIngredientSlot,
    /// Validate and commit the draft.
    Submit,
    /// Reset the form.
    ClearAllFields,
    /// Load one product by barcode and bump its scan counter.
    FetchProduct { barcode: String },
    /// Load the most scanned products.
    FetchMostScanned,
    /// Load every product in a category.
    FetchCategory(Category),
    /// Apply updated settings.
    SaveSettings(Config),
}

/// Events emitted by the worker for the shell.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    /// Submission state changed during attempt `attempt`.
    StateChanged {
        attempt: Uuid,
        state: SubmissionState,
    },
    /// Field errors after a rejected submit.
    FieldErrors(FieldErrorSet),
    /// Submit stopped before validation.
    Blocked(Blocker),
    /// User-visible failure.
    Alert(Alert),
    /// Submit finished; carries the final outcome.
    SubmitFinished { attempt: Uuid, outcome: SubmitOutcome },
    ProductLoaded(Product),
    ProductsLoaded(Vec<Product>),
    /// Informational log message.
    Log(String),
    /// Command-level error (bad settings, rejected edit).
    Error(String),
}

/// Handles the worker talks to.
#[derive(Clone)]
pub struct Services {
    pub repository: Arc<dyn ProductRepository>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub network: Arc<dyn Reachability>,
}

/// Builds the backend handles for a given config.
pub type ServicesFactory = Arc<dyn Fn(&Config) -> Services + Send + Sync>;

/// Main worker loop: handle commands one at a time so only one submission runs.
pub async fn run(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::Sender<WorkerEvent>,
    factory: ServicesFactory,
    mut cfg: Config,
) {
    let mut services = factory(&cfg);
    let mut submitter = Submitter::new(services.repository.clone(), services.network.clone());
    let mut session = EditingSession::new();
    tracing::info!("worker started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::SaveSettings(new_cfg) => {
                tracing::info!("settings updated, rebuilding backend");
                cfg = new_cfg;
                services = factory(&cfg);
                submitter = Submitter::new(services.repository.clone(), services.network.clone());
                let _ = tx.send(WorkerEvent::Log("settings updated".into())).await;
            }

            WorkerCmd::ReplaceDraft(draft) => {
                if let Err(e) = session.replace_draft(draft) {
                    tracing::warn!("draft replace rejected: {e}");
                    let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                }
            }

            WorkerCmd::SetBarcode(code) => {
                if let Err(e) = session.set_barcode(&code) {
                    tracing::warn!("barcode rejected: {e}");
                    let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                }
            }

            WorkerCmd::SelectImage(bytes) => {
                if let Err(e) = session.select_image(bytes) {
                    let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                }
            }

            WorkerCmd::AddIngredientSlot => {
                if let Err(e) = session.edit_draft(|d| d.add_ingredient_slot()) {
                    let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                }
            }

            WorkerCmd::ClearAllFields => {
                tracing::info!("clear all fields");
                if let Err(e) = session.clear_all_fields() {
                    let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                }
            }

            WorkerCmd::Submit => {
                if !ensure_settings(&cfg, &tx).await {
                    continue;
                }
                submit(&submitter, &mut session, &tx).await;
            }

            WorkerCmd::FetchProduct { barcode } => {
                if !ensure_settings(&cfg, &tx).await {
                    continue;
                }
                tracing::info!("fetch product {barcode}");
                match services.catalog.fetch_product(&barcode).await {
                    Ok(product) => {
                        // Scan counting is best effort and never fails the fetch.
                        if let Some(scans) = product.scans
                            && let Err(e) = services.catalog.record_scan(&barcode, scans).await
                        {
                            tracing::warn!("scan count update for {barcode} failed: {e:?}");
                        }
                        let _ = tx.send(WorkerEvent::ProductLoaded(product)).await;
                    }
                    Err(kind) => {
                        tracing::error!("fetch product {barcode} failed: {kind:?}");
                        let _ = tx
                            .send(WorkerEvent::Alert(kind.alert(Backend::Database)))
                            .await;
                    }
                }
            }

            WorkerCmd::FetchMostScanned => {
                if !ensure_settings(&cfg, &tx).await {
                    continue;
                }
                let r = services.catalog.most_scanned(MOST_SCANNED_LIMIT).await;
                send_products(&tx, "most scanned", r).await;
            }

            WorkerCmd::FetchCategory(category) => {
                if !ensure_settings(&cfg, &tx).await {
                    continue;
                }
                let r = services.catalog.products_in_category(category).await;
                send_products(&tx, category.as_str(), r).await;
            }
        }
    }
    tracing::info!("worker stopped");
}

/// Refuse remote work while required settings are empty.
async fn ensure_settings(cfg: &Config, tx: &mpsc::Sender<WorkerEvent>) -> bool {
    let missing = cfg.missing_settings();
    if missing.is_empty() {
        return true;
    }
    tracing::warn!("command aborted: {} not set", missing.join(", "));
    let _ = tx
        .send(WorkerEvent::Error(format!("{} is not set", missing.join(", "))))
        .await;
    false
}

/// Run one submission, streaming state changes as they happen.
async fn submit(
    submitter: &Submitter,
    session: &mut EditingSession,
    tx: &mpsc::Sender<WorkerEvent>,
) {
    let attempt = Uuid::new_v4();
    tracing::info!("submit start: {attempt}");

    let progress = tx.clone();
    let outcome = submitter
        .submit_with(session, move |state| {
            let ev = WorkerEvent::StateChanged {
                attempt,
                state: state.clone(),
            };
            if let Err(e) = progress.try_send(ev) {
                tracing::warn!("state event dropped: {e}");
            }
        })
        .await;

    match &outcome {
        SubmitOutcome::Succeeded => tracing::info!("submit done: {attempt}"),
        SubmitOutcome::Blocked(blocker) => {
            let _ = tx.send(WorkerEvent::Blocked(*blocker)).await;
            let _ = tx.send(WorkerEvent::Alert(blocker.alert())).await;
        }
        SubmitOutcome::InvalidFields => {
            let _ = tx
                .send(WorkerEvent::FieldErrors(session.errors().clone()))
                .await;
        }
        SubmitOutcome::Failed(failure) => {
            tracing::error!("submit failed: {attempt}: {failure:?}");
            let _ = tx.send(WorkerEvent::Alert(failure.alert())).await;
        }
        SubmitOutcome::AlreadyInFlight => {
            let _ = tx
                .send(WorkerEvent::Error("a submission is already running".into()))
                .await;
        }
    }
    let _ = tx
        .send(WorkerEvent::SubmitFinished { attempt, outcome })
        .await;
}

async fn send_products(
    tx: &mpsc::Sender<WorkerEvent>,
    what: &str,
    r: Result<Vec<Product>, crate::errors::ErrorKind>,
) {
    match r {
        Ok(products) => {
            tracing::info!("{what}: {} products", products.len());
            let _ = tx.send(WorkerEvent::ProductsLoaded(products)).await;
        }
        Err(kind) => {
            tracing::error!("{what} fetch failed: {kind:?}");
            let _ = tx
                .send(WorkerEvent::Alert(kind.alert(Backend::Database)))
                .await;
        }
    }
}
