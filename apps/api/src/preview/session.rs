//! Preview sessions — one mounted document preview with its own fit controller.
//!
//! A session wires the pieces together the way a browser preview would:
//! `MetricSurface` (render) ← `SessionObserver` (applies scale) ← `FitController`
//! ← `NotificationAdapter` ← document edits and layout-observer events.
//! Server-side there is no layout observer to report the re-layout that follows a
//! rescale, so a relayout task forwards one `content_changed` whenever the rendered scale
//! changed and the controller's cooldown lock has been released.
//! Dropping the session aborts that task and drops every handle, which stops the rest.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{
    ContentKind, FitController, FitObserver, FitPolicy, FitSnapshot, FontFamily,
    MetricSurface, NotificationAdapter, OverflowWarning, PageConfig, PageId,
};
use crate::models::preview::PreviewDocument;

pub const NOTICE_CAPACITY: usize = 20;
pub const MIN_BASE_FONT_SIZE_PT: f32 = 6.0;
pub const MAX_BASE_FONT_SIZE_PT: f32 = 24.0;

// ────────────────────────────────────────────────────────────────────────────
// Notices (user-notification channel)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeKind {
    ScaleChanged { font_size_pt: Option<f32> },
    OverflowWarning { message: String, cannot_fit: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: NoticeKind,
}

/// Bounded log of the most recent notices, newest last.
#[derive(Default)]
pub struct NoticeLog {
    entries: Mutex<VecDeque<Notice>>,
}

impl NoticeLog {
    pub fn push(&self, kind: NoticeKind) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == NOTICE_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(Notice {
            at: Utc::now(),
            kind,
        });
    }

    pub fn recent(&self) -> Vec<Notice> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Applies controller decisions to the session's surface and records them as notices.
struct SessionObserver {
    session_id: Uuid,
    surface: Arc<MetricSurface>,
    notices: Arc<NoticeLog>,
}

impl FitObserver for SessionObserver {
    fn on_scale_changed(&self, scale: Option<f32>) {
        self.surface.apply_scale(scale);
        self.notices.push(NoticeKind::ScaleChanged {
            font_size_pt: scale,
        });
    }

    fn on_overflow_warning(&self, warning: &OverflowWarning) {
        info!(session_id = %self.session_id, cannot_fit = warning.cannot_fit, "overflow warning raised");
        self.notices.push(NoticeKind::OverflowWarning {
            message: warning.message().to_string(),
            cannot_fit: warning.cannot_fit,
        });
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// Parameters for mounting a preview.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub document: PreviewDocument,
    pub font: FontFamily,
    pub base_font_size_pt: f32,
    pub content_kind: ContentKind,
    /// Per-document hysteresis override.
    pub tolerance_ratio: Option<f32>,
}

/// What clients see of a session.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub font: FontFamily,
    pub content_kind: ContentKind,
    pub base_font_size_pt: f32,
    pub effective_font_size_pt: f32,
    /// Content height over page height at the effective size; `None` for a blank document.
    pub fill_ratio: Option<f32>,
    pub fit: FitSnapshot,
    pub notices: Vec<Notice>,
}

pub struct PreviewSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub content_kind: ContentKind,
    surface: Arc<MetricSurface>,
    controller: FitController,
    adapter: NotificationAdapter,
    notices: Arc<NoticeLog>,
    relayout: JoinHandle<()>,
}

impl PreviewSession {
    /// Mounts a preview: builds its surface, starts the controller and adapter, and
    /// schedules the first fit evaluation.
    pub fn open(
        spec: SessionSpec,
        template: &FitPolicy,
        page: PageConfig,
        adapter_quiet: Duration,
    ) -> Result<Self, AppError> {
        validate_font_size(spec.base_font_size_pt)?;

        let policy = FitPolicy {
            settle_delay: template.settle_delay.max(spec.content_kind.settle_delay()),
            tolerance_ratio: spec.tolerance_ratio.unwrap_or(template.tolerance_ratio),
            ..template.clone()
        };

        let id = Uuid::new_v4();
        let surface = Arc::new(MetricSurface::new(
            page,
            spec.document,
            spec.font,
            spec.base_font_size_pt,
        ));
        let notices = Arc::new(NoticeLog::default());
        let observer = Arc::new(SessionObserver {
            session_id: id,
            surface: Arc::clone(&surface),
            notices: Arc::clone(&notices),
        });

        let controller =
            FitController::spawn(policy, PageId::FIRST, surface.clone(), observer)?;
        controller.reset(
            spec.base_font_size_pt,
            context_key(spec.font, spec.base_font_size_pt),
        );
        let adapter = NotificationAdapter::spawn(controller.clone(), adapter_quiet);
        let relayout = tokio::spawn(forward_relayouts(controller.subscribe(), adapter.clone()));

        info!(
            session_id = %id,
            font = spec.font.as_str(),
            base_font_size_pt = spec.base_font_size_pt,
            "preview session opened"
        );

        Ok(Self {
            id,
            created_at: Utc::now(),
            content_kind: spec.content_kind,
            surface,
            controller,
            adapter,
            notices,
            relayout,
        })
    }

    /// Swaps the rendered content. The size change reaches the controller through the adapter.
    pub fn replace_document(&self, document: PreviewDocument) {
        self.surface.replace_document(document);
        self.adapter.content_changed();
    }

    /// Forwards a layout-observer event from the client.
    pub fn observe_resize(&self, width: f32, height: f32) {
        self.adapter.resized(width, height);
    }

    /// Template or font change: new base scale, fit state starts over.
    pub fn retemplate(&self, font: FontFamily, base_font_size_pt: f32) -> Result<(), AppError> {
        validate_font_size(base_font_size_pt)?;
        self.surface.set_base(font, base_font_size_pt);
        self.controller
            .reset(base_font_size_pt, context_key(font, base_font_size_pt));
        Ok(())
    }

    pub fn view(&self) -> PreviewView {
        PreviewView {
            id: self.id,
            created_at: self.created_at,
            font: self.surface.font(),
            content_kind: self.content_kind,
            base_font_size_pt: self.surface.base_font_size_pt(),
            effective_font_size_pt: self.surface.effective_font_size_pt(),
            fill_ratio: self.surface.measure_now().ok().map(|m| m.fill_ratio()),
            fit: self.controller.snapshot(),
            notices: self.notices.recent(),
        }
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        // The relayout task holds an adapter handle, which keeps the controller alive.
        self.relayout.abort();
    }
}

/// Reports the re-layout caused by a rescale back to the adapter, once the controller
/// can accept notifications again.
async fn forward_relayouts(
    mut snapshots: watch::Receiver<FitSnapshot>,
    adapter: NotificationAdapter,
) {
    let mut rendered = snapshots.borrow().current_scale;
    let mut pending = false;

    while snapshots.changed().await.is_ok() {
        let (scale, locked) = {
            let snapshot = snapshots.borrow_and_update();
            (snapshot.current_scale, snapshot.locked)
        };
        if scale != rendered {
            rendered = scale;
            pending = true;
        }
        if pending && !locked {
            pending = false;
            adapter.content_changed();
        }
    }
}

fn validate_font_size(size: f32) -> Result<(), AppError> {
    if !(MIN_BASE_FONT_SIZE_PT..=MAX_BASE_FONT_SIZE_PT).contains(&size) {
        return Err(AppError::Validation(format!(
            "base_font_size_pt must be between {MIN_BASE_FONT_SIZE_PT} and {MAX_BASE_FONT_SIZE_PT} (got {size})"
        )));
    }
    Ok(())
}

fn context_key(font: FontFamily, size: f32) -> String {
    format!("{}/{size}", font.as_str())
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

/// In-memory set of mounted previews. Sessions are never shared between previews.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<PreviewSession>>>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
        }
    }

    pub async fn insert(&self, session: PreviewSession) -> Result<Arc<PreviewSession>, AppError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(AppError::TooManySessions(self.max_sessions));
        }
        let session = Arc::new(session);
        sessions.insert(session.id, Arc::clone(&session));
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<PreviewSession>, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("preview session {id}")))
    }

    /// Unmounts a session. Its tasks stop once in-flight requests release their handles.
    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!(session_id = %id, "preview session closed");
                Ok(())
            }
            None => Err(AppError::NotFound(format!("preview session {id}"))),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::controller::FitPhase;
    use crate::layout::{default_page_config, PaperSize};
    use crate::models::preview::PreviewSection;
    use tokio::time::sleep;

    fn make_document(items: usize) -> PreviewDocument {
        PreviewDocument {
            name: "Grace Hopper".to_string(),
            headline: Some("grace@example.com".to_string()),
            sections: vec![PreviewSection {
                heading: "Experience".to_string(),
                items: (0..items)
                    .map(|i| {
                        format!(
                            "Built compiler pass {i} that translated English-like statements \
                             into machine code, cutting programming time for the team"
                        )
                    })
                    .collect(),
            }],
        }
    }

    fn make_spec(items: usize) -> SessionSpec {
        SessionSpec {
            document: make_document(items),
            font: FontFamily::Inter,
            base_font_size_pt: 11.0,
            content_kind: ContentKind::SinglePass,
            tolerance_ratio: None,
        }
    }

    fn open(spec: SessionSpec) -> Result<PreviewSession, AppError> {
        PreviewSession::open(
            spec,
            &FitPolicy::default(),
            default_page_config(PaperSize::Letter),
            Duration::from_millis(50),
        )
    }

    #[test]
    fn test_notice_log_is_bounded() {
        let log = NoticeLog::default();
        for i in 0..(NOTICE_CAPACITY + 5) {
            log.push(NoticeKind::ScaleChanged {
                font_size_pt: Some(i as f32),
            });
        }
        let recent = log.recent();
        assert_eq!(recent.len(), NOTICE_CAPACITY);
        assert_eq!(
            recent.last().map(|n| n.kind.clone()),
            Some(NoticeKind::ScaleChanged {
                font_size_pt: Some((NOTICE_CAPACITY + 4) as f32)
            })
        );
    }

    #[test]
    fn test_context_key_format() {
        assert_eq!(context_key(FontFamily::EbGaramond, 10.5), "eb_garamond/10.5");
    }

    #[tokio::test]
    async fn test_out_of_range_font_size_rejected() {
        let spec = SessionSpec {
            base_font_size_pt: 40.0,
            ..make_spec(3)
        };
        assert!(matches!(open(spec), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_invalid_tolerance_rejected() {
        let spec = SessionSpec {
            tolerance_ratio: Some(-0.1),
            ..make_spec(3)
        };
        assert!(matches!(open(spec), Err(AppError::Policy(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflowing_document_is_shrunk_and_warned() {
        let session = open(make_spec(60)).unwrap();
        sleep(Duration::from_millis(1000)).await;

        let view = session.view();
        assert!(view.effective_font_size_pt < 11.0, "got {}", view.effective_font_size_pt);
        assert_eq!(view.fit.current_scale, Some(view.effective_font_size_pt));
        assert!(view
            .notices
            .iter()
            .any(|n| matches!(n.kind, NoticeKind::OverflowWarning { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescale_schedules_a_follow_up_fit() {
        let session = open(make_spec(60)).unwrap();

        // Applied at 250ms, locked until 850ms; the re-layout is reported 50ms later.
        sleep(Duration::from_millis(600)).await;
        assert_eq!(session.view().fit.phase, FitPhase::Applying);
        sleep(Duration::from_millis(400)).await;
        let view = session.view();
        assert_eq!(view.fit.adjustments_applied, 1);
        assert_eq!(view.fit.phase, FitPhase::Scheduled, "re-measure without a client call");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retemplate_clears_override() {
        let session = open(make_spec(60)).unwrap();
        sleep(Duration::from_millis(1000)).await;
        assert!(session.view().fit.current_scale.is_some());

        session.retemplate(FontFamily::Oswald, 10.0).unwrap();
        sleep(Duration::from_millis(1)).await;

        let view = session.view();
        assert_eq!(view.font, FontFamily::Oswald);
        assert_eq!(view.fit.base_scale, Some(10.0));
        assert_eq!(view.fit.current_scale, None);
        assert_eq!(view.effective_font_size_pt, 10.0);
    }

    #[tokio::test]
    async fn test_registry_enforces_capacity() {
        let registry = SessionRegistry::new(1);
        let first = registry.insert(open(make_spec(3)).unwrap()).await.unwrap();
        assert!(matches!(
            registry.insert(open(make_spec(3)).unwrap()).await,
            Err(AppError::TooManySessions(1))
        ));

        assert!(registry.get(first.id).await.is_ok());
        registry.remove(first.id).await.unwrap();
        assert!(matches!(
            registry.get(first.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(registry.insert(open(make_spec(3)).unwrap()).await.is_ok());
    }
}
