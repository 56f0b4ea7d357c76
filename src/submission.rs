//! Editing session state and the two-phase add-product commit.
//!
//! A submission validates the whole draft, checks connectivity once, creates
//! the product row, then uploads its image. A failure after the row exists is
//! not rolled back: the row stays without an image and a later resubmit of the
//! same barcode collides with `AlreadyExists`.

use std::sync::Arc;

use crate::{
    errors::{Alert, Backend, ErrorKind},
    product::ProductDraft,
    repository::{ProductRepository, Reachability},
    validate::{self, FieldErrorSet, Rejection},
};

/// Where the current submission stands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Validating,
    CreatingRecord,
    UploadingImage,
    Succeeded,
    Failed(Failure),
}

impl SubmissionState {
    /// A submission is running and new input must wait.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SubmissionState::Validating
                | SubmissionState::CreatingRecord
                | SubmissionState::UploadingImage
        )
    }
}

/// Terminal failure of a submission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    /// Row creation failed; nothing was written. Also covers the
    /// connectivity check, which fails as `NoInternet` before the table is
    /// contacted.
    Record(ErrorKind),
    /// Row created but no image was selected.
    NoImageSelected,
    /// Row created but the image upload failed.
    Image(ErrorKind),
}

impl Failure {
    /// Remote kind behind the failure, if any.
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Failure::Record(k) | Failure::Image(k) => Some(k),
            Failure::NoImageSelected => None,
        }
    }

    /// The product row exists even though the submission failed.
    pub fn record_created(&self) -> bool {
        !matches!(self, Failure::Record(_))
    }

    pub fn alert(&self) -> Alert {
        match self {
            Failure::Record(k) => k.alert(Backend::Database),
            Failure::Image(k) => k.alert(Backend::Storage),
            Failure::NoImageSelected => Alert::no_image_selected(),
        }
    }
}

/// Precondition that stops a submission before validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blocker {
    /// Prompts the user to scan a barcode.
    MissingBarcode,
}

impl Blocker {
    pub fn alert(self) -> Alert {
        match self {
            Blocker::MissingBarcode => Alert::missing_barcode(),
        }
    }
}

/// Rejected edits to a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("barcode is already set to {current}")]
    BarcodeAlreadySet { current: String },
    #[error("barcode is empty")]
    EmptyBarcode,
    #[error("a submission is in flight")]
    SubmissionInFlight,
}

/// Result of one submit call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Succeeded,
    /// Stopped before validation; the session is back to idle.
    Blocked(Blocker),
    /// Field errors were recorded on the session; no remote call was made.
    InvalidFields,
    Failed(Failure),
    /// Another submission is still running.
    AlreadyInFlight,
}

/// One in-progress add-product form.
#[derive(Clone, Debug, Default)]
pub struct EditingSession {
    draft: ProductDraft,
    errors: FieldErrorSet,
    state: SubmissionState,
    blocker: Option<Blocker>,
}

impl EditingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &ProductDraft {
        &self.draft
    }

    pub fn errors(&self) -> &FieldErrorSet {
        &self.errors
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn blocker(&self) -> Option<Blocker> {
        self.blocker
    }

    /// Edit the draft while no submission runs. The barcode is owned by
    /// [`Self::set_barcode`]; changes made to it here are discarded.
    pub fn edit_draft<R>(&mut self, f: impl FnOnce(&mut ProductDraft) -> R) -> Result<R, DraftError> {
        self.ensure_idle()?;
        let barcode = self.draft.barcode.take();
        let out = f(&mut self.draft);
        self.draft.barcode = barcode;
        Ok(out)
    }

    /// Set the barcode once; it can't change until the form is cleared.
    pub fn set_barcode(&mut self, code: &str) -> Result<(), DraftError> {
        self.ensure_idle()?;
        if code.is_empty() {
            return Err(DraftError::EmptyBarcode);
        }
        match self.draft.barcode.as_deref().filter(|c| !c.is_empty()) {
            Some(current) if current == code => Ok(()),
            Some(current) => Err(DraftError::BarcodeAlreadySet {
                current: current.to_string(),
            }),
            None => {
                self.draft.barcode = Some(code.to_string());
                if self.blocker == Some(Blocker::MissingBarcode) {
                    self.blocker = None;
                }
                Ok(())
            }
        }
    }

    /// Replace every editable field, keeping an already-set barcode.
    pub fn replace_draft(&mut self, mut draft: ProductDraft) -> Result<(), DraftError> {
        self.ensure_idle()?;
        // An empty barcode counts as not scanned.
        draft.barcode = draft.barcode.filter(|c| !c.is_empty());
        if let Some(current) = &self.draft.barcode {
            match &draft.barcode {
                Some(next) if next != current => {
                    return Err(DraftError::BarcodeAlreadySet {
                        current: current.clone(),
                    });
                }
                _ => draft.barcode = Some(current.clone()),
            }
        }
        draft.ensure_min_ingredient_slots();
        self.draft = draft;
        Ok(())
    }

    /// Attach the selected image bytes.
    pub fn select_image(&mut self, bytes: Vec<u8>) -> Result<(), DraftError> {
        self.ensure_idle()?;
        self.draft.image = Some(bytes);
        Ok(())
    }

    /// Reset the form: empty draft, no errors, idle state.
    pub fn clear_all_fields(&mut self) -> Result<(), DraftError> {
        self.ensure_idle()?;
        self.draft = ProductDraft::default();
        self.errors = FieldErrorSet::default();
        self.state = SubmissionState::Idle;
        self.blocker = None;
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), DraftError> {
        if self.state.is_in_flight() {
            return Err(DraftError::SubmissionInFlight);
        }
        Ok(())
    }

    fn enter(&mut self, next: SubmissionState, on_change: &mut impl FnMut(&SubmissionState)) {
        tracing::debug!("submission state: {:?} -> {:?}", self.state, next);
        self.state = next;
        on_change(&self.state);
    }
}

/// Sequences validation, connectivity, record creation and image upload.
#[derive(Clone)]
pub struct Submitter {
    repository: Arc<dyn ProductRepository>,
    network: Arc<dyn Reachability>,
}

impl Submitter {
    pub fn new(repository: Arc<dyn ProductRepository>, network: Arc<dyn Reachability>) -> Self {
        Self {
            repository,
            network,
        }
    }

    /// Submit the session's draft.
    pub async fn submit(&self, session: &mut EditingSession) -> SubmitOutcome {
        self.submit_with(session, |_| {}).await
    }

    /// Submit, reporting every state change to `on_change`.
    pub async fn submit_with<F>(&self, session: &mut EditingSession, mut on_change: F) -> SubmitOutcome
    where
        F: FnMut(&SubmissionState) + Send,
    {
        if session.state.is_in_flight() {
            tracing::warn!("submit ignored: submission already in flight");
            return SubmitOutcome::AlreadyInFlight;
        }

        session.blocker = None;
        session.enter(SubmissionState::Validating, &mut on_change);

        let product = match validate::validate_product(&session.draft) {
            Ok(p) => {
                session.errors = FieldErrorSet::default();
                p
            }
            Err(Rejection::MissingBarcode) => {
                tracing::info!("submit blocked: barcode missing");
                session.blocker = Some(Blocker::MissingBarcode);
                session.enter(SubmissionState::Idle, &mut on_change);
                return SubmitOutcome::Blocked(Blocker::MissingBarcode);
            }
            Err(Rejection::Fields(errors)) => {
                tracing::info!("submit rejected: {} field error(s)", errors.len());
                session.errors = errors;
                session.enter(SubmissionState::Idle, &mut on_change);
                return SubmitOutcome::InvalidFields;
            }
        };
        let barcode = product.barcode().to_string();

        // Phase 1: the row.
        session.enter(SubmissionState::CreatingRecord, &mut on_change);
        if !self.network.is_network_reachable().await {
            tracing::warn!("submit aborted: network unreachable");
            return fail(session, Failure::Record(ErrorKind::NoInternet), &mut on_change);
        }
        tracing::info!("creating product {barcode}");
        if let Err(kind) = self.repository.create_product(&product).await {
            tracing::error!("create product {barcode} failed: {kind:?}");
            return fail(session, Failure::Record(kind), &mut on_change);
        }

        // Phase 2: the image. The row is not rolled back on failure.
        let Some(bytes) = session.draft.image.clone() else {
            tracing::warn!("product {barcode} created without image: none selected");
            return fail(session, Failure::NoImageSelected, &mut on_change);
        };
        session.enter(SubmissionState::UploadingImage, &mut on_change);
        tracing::info!("uploading image for {barcode} ({} bytes)", bytes.len());
        if let Err(kind) = self.repository.upload_product_image(&barcode, &bytes).await {
            tracing::warn!("product {barcode} created without image: upload failed: {kind:?}");
            return fail(session, Failure::Image(kind), &mut on_change);
        }

        tracing::info!("product {barcode} submitted");
        session.enter(SubmissionState::Succeeded, &mut on_change);
        SubmitOutcome::Succeeded
    }
}

fn fail(
    session: &mut EditingSession,
    failure: Failure,
    on_change: &mut impl FnMut(&SubmissionState),
) -> SubmitOutcome {
    session.enter(SubmissionState::Failed(failure.clone()), on_change);
    SubmitOutcome::Failed(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        image::{ImagePolicy, webp_bytes},
        repository::{FixedReachability, InMemoryProductRepository},
        validate::FieldId,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::product::ValidatedProduct;

    /// Repository answering from fixed results and recording calls.
    #[derive(Default)]
    struct ScriptedRepo {
        create_result: Option<ErrorKind>,
        upload_result: Option<ErrorKind>,
        created: Mutex<Vec<ValidatedProduct>>,
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProductRepository for ScriptedRepo {
        async fn create_product(&self, product: &ValidatedProduct) -> Result<(), ErrorKind> {
            self.created.lock().unwrap().push(product.clone());
            self.create_result.clone().map_or(Ok(()), Err)
        }

        async fn upload_product_image(&self, id: &str, _bytes: &[u8]) -> Result<(), ErrorKind> {
            self.uploads.lock().unwrap().push(id.to_string());
            self.upload_result.clone().map_or(Ok(()), Err)
        }
    }

    fn submitter(repo: Arc<dyn ProductRepository>, online: bool) -> Submitter {
        Submitter::new(repo, Arc::new(FixedReachability(online)))
    }

    fn ready_session() -> EditingSession {
        let mut s = EditingSession::new();
        s.replace_draft(ProductDraft::pepsi_diet()).unwrap();
        s.select_image(webp_bytes(16)).unwrap();
        s
    }

    #[tokio::test]
    async fn test_happy_path_walks_every_state() {
        // A valid draft creates the row once, uploads, and succeeds.
        let repo = Arc::new(ScriptedRepo::default());
        let sub = submitter(repo.clone(), true);
        let mut session = ready_session();
        let mut seen = Vec::new();

        let outcome = sub.submit_with(&mut session, |s| seen.push(s.clone())).await;

        assert_eq!(outcome, SubmitOutcome::Succeeded);
        assert_eq!(
            seen,
            vec![
                SubmissionState::Validating,
                SubmissionState::CreatingRecord,
                SubmissionState::UploadingImage,
                SubmissionState::Succeeded,
            ]
        );
        let created = repo.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].barcode(), "6223001360186");
        assert_eq!(created[0].nutrients().calories_per_100g, 1.0);
        assert_eq!(*repo.uploads.lock().unwrap(), vec!["6223001360186".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_barcode_never_creates() {
        // Without a barcode the submit is blocked and nothing is called.
        let repo = Arc::new(ScriptedRepo::default());
        let sub = submitter(repo.clone(), true);
        let mut session = EditingSession::new();
        let mut draft = ProductDraft::pepsi_diet();
        draft.barcode = None;
        session.replace_draft(draft).unwrap();

        let outcome = sub.submit(&mut session).await;

        assert_eq!(outcome, SubmitOutcome::Blocked(Blocker::MissingBarcode));
        assert_eq!(session.state(), &SubmissionState::Idle);
        assert_eq!(session.blocker(), Some(Blocker::MissingBarcode));
        assert!(session.errors().is_empty());
        assert!(repo.created.lock().unwrap().is_empty());

        // Scanning a barcode clears the blocker.
        session.set_barcode("6223001360186").unwrap();
        assert_eq!(session.blocker(), None);
    }

    #[tokio::test]
    async fn test_invalid_fields_stay_idle_and_replace_errors() {
        // Field errors are recorded wholesale and no remote call is made.
        let repo = Arc::new(ScriptedRepo::default());
        let sub = submitter(repo.clone(), true);
        let mut session = ready_session();
        session
            .edit_draft(|d| {
                d.fat = "lots".into();
                d.name.clear();
            })
            .unwrap();

        assert_eq!(sub.submit(&mut session).await, SubmitOutcome::InvalidFields);
        assert_eq!(session.state(), &SubmissionState::Idle);
        assert!(session.errors().contains(FieldId::Fat));
        assert!(session.errors().contains(FieldId::Name));

        // Fixing one field drops only that identifier on the next attempt.
        session.edit_draft(|d| d.fat = "3.5".into()).unwrap();
        assert_eq!(sub.submit(&mut session).await, SubmitOutcome::InvalidFields);
        assert!(!session.errors().contains(FieldId::Fat));
        assert!(session.errors().contains(FieldId::Name));
        assert!(repo.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_short_circuits_before_create() {
        // An unreachable network fails the record phase without calling the table.
        let repo = Arc::new(ScriptedRepo::default());
        let sub = submitter(repo.clone(), false);
        let mut session = ready_session();

        let outcome = sub.submit(&mut session).await;

        assert_eq!(outcome, SubmitOutcome::Failed(Failure::Record(ErrorKind::NoInternet)));
        assert!(repo.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_skips_upload() {
        // A forbidden insert never reaches the bucket.
        let repo = Arc::new(ScriptedRepo {
            create_result: Some(ErrorKind::Forbidden),
            ..ScriptedRepo::default()
        });
        let sub = submitter(repo.clone(), true);
        let mut session = ready_session();

        sub.submit(&mut session).await;

        let failure = Failure::Record(ErrorKind::Forbidden);
        assert_eq!(session.state(), &SubmissionState::Failed(failure.clone()));
        assert!(!failure.record_created());
        assert!(repo.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_image_leaves_record_behind() {
        // The image check happens after the row is created.
        let repo = Arc::new(ScriptedRepo::default());
        let sub = submitter(repo.clone(), true);
        let mut session = EditingSession::new();
        session.replace_draft(ProductDraft::pepsi_diet()).unwrap();

        let outcome = sub.submit(&mut session).await;

        assert_eq!(outcome, SubmitOutcome::Failed(Failure::NoImageSelected));
        assert_eq!(repo.created.lock().unwrap().len(), 1);
        assert!(repo.uploads.lock().unwrap().is_empty());
        assert_eq!(Failure::NoImageSelected.alert().title, "No Image Selected!");
    }

    #[tokio::test]
    async fn test_upload_failure_then_resubmit_collides() {
        // The row survives a failed upload, so the retry hits AlreadyExists.
        let repo = Arc::new(InMemoryProductRepository::new(ImagePolicy {
            max_bytes: 8,
            ..ImagePolicy::default()
        }));
        let sub = submitter(repo.clone(), true);
        let mut session = ready_session();

        let first = sub.submit(&mut session).await;
        assert_eq!(first, SubmitOutcome::Failed(Failure::Image(ErrorKind::TooLarge)));
        assert!(repo.row("6223001360186").await.is_some());

        let second = sub.submit(&mut session).await;
        assert_eq!(
            second,
            SubmitOutcome::Failed(Failure::Record(ErrorKind::AlreadyExists))
        );
        assert_eq!(repo.create_calls(), 2);
        assert_eq!(repo.upload_calls(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_session_rejects_submit_and_edits() {
        // A session mid-commit refuses another submit and any edit.
        let sub = submitter(Arc::new(ScriptedRepo::default()), true);
        let mut session = ready_session();
        session.state = SubmissionState::UploadingImage;

        assert_eq!(sub.submit(&mut session).await, SubmitOutcome::AlreadyInFlight);
        assert_eq!(session.clear_all_fields(), Err(DraftError::SubmissionInFlight));
        assert_eq!(
            session.edit_draft(|d| d.add_ingredient_slot()),
            Err(DraftError::SubmissionInFlight)
        );
    }

    #[tokio::test]
    async fn test_clear_all_fields_is_idempotent() {
        // Clearing twice equals clearing once: empty draft, no errors, idle.
        let sub = submitter(Arc::new(ScriptedRepo::default()), true);
        let mut session = ready_session();
        assert_eq!(sub.submit(&mut session).await, SubmitOutcome::Succeeded);

        session.clear_all_fields().unwrap();
        let once = session.clone();
        session.clear_all_fields().unwrap();

        assert_eq!(session.draft(), once.draft());
        assert_eq!(session.draft(), &ProductDraft::default());
        assert_eq!(session.state(), &SubmissionState::Idle);
        assert!(session.errors().is_empty());
        assert_eq!(session.draft().image, None);
    }

    #[test]
    fn test_barcode_is_immutable_until_cleared() {
        // A set barcode can't be replaced, but clearing frees it.
        let mut session = EditingSession::new();
        session.set_barcode("111").unwrap();
        assert_eq!(session.set_barcode("111"), Ok(()));
        assert_eq!(
            session.set_barcode("222"),
            Err(DraftError::BarcodeAlreadySet {
                current: "111".into()
            })
        );
        let mut other = ProductDraft::pepsi_diet();
        assert!(session.replace_draft(other.clone()).is_err());
        other.barcode = None;
        session.replace_draft(other).unwrap();
        assert_eq!(session.draft().barcode.as_deref(), Some("111"));

        session.clear_all_fields().unwrap();
        session.set_barcode("222").unwrap();
        assert_eq!(session.set_barcode(""), Err(DraftError::EmptyBarcode));
    }

    #[test]
    fn test_edit_draft_cannot_touch_barcode() {
        // Field edits go through, barcode edits are dropped.
        let mut session = EditingSession::new();
        session.set_barcode("111").unwrap();
        session
            .edit_draft(|d| {
                d.barcode = Some("999".into());
                d.name = "Pepsi".into();
            })
            .unwrap();
        assert_eq!(session.draft().barcode.as_deref(), Some("111"));
        assert_eq!(session.draft().name, "Pepsi");

        // An unscanned form can't gain a barcode through an edit either.
        session.clear_all_fields().unwrap();
        session.edit_draft(|d| d.barcode = Some("999".into())).unwrap();
        assert_eq!(session.draft().barcode, None);
    }

    #[tokio::test]
    async fn test_loaded_empty_barcode_can_still_be_scanned() {
        // A draft carrying an empty barcode blocks, then accepts the scan.
        let sub = submitter(Arc::new(ScriptedRepo::default()), true);
        let mut session = EditingSession::new();
        let mut draft = ProductDraft::pepsi_diet();
        draft.barcode = Some(String::new());
        session.replace_draft(draft).unwrap();
        assert_eq!(session.draft().barcode, None);

        assert_eq!(
            sub.submit(&mut session).await,
            SubmitOutcome::Blocked(Blocker::MissingBarcode)
        );
        assert_eq!(session.set_barcode("6223001360186"), Ok(()));
        assert_eq!(session.blocker(), None);
        assert_eq!(session.draft().barcode.as_deref(), Some("6223001360186"));
    }

    #[tokio::test]
    async fn test_missing_barcode_keeps_previous_field_errors() {
        // A blocked submit leaves the last validation result untouched.
        let sub = submitter(Arc::new(ScriptedRepo::default()), true);
        let mut session = EditingSession::new();
        session.set_barcode("42").unwrap();
        assert_eq!(sub.submit(&mut session).await, SubmitOutcome::InvalidFields);
        let before = session.errors().clone();
        assert!(!before.is_empty());

        session.clear_all_fields().unwrap();
        session.errors = before.clone();
        assert_eq!(
            sub.submit(&mut session).await,
            SubmitOutcome::Blocked(Blocker::MissingBarcode)
        );
        assert_eq!(session.errors(), &before);
    }
}
