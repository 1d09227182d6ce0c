//! Render surface seam — the controller's only view of the rendered document.
//!
//! The controller never inspects content. It asks a `RenderSurface` for the height the
//! content currently occupies on a page and reacts to the number. `MetricSurface` is the
//! server-side implementation: it estimates heights from static font metrics.

use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::font_metrics::{get_metrics, FontFamily, PageConfig};
use crate::models::preview::PreviewDocument;

// ────────────────────────────────────────────────────────────────────────────
// Seam types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    pub const FIRST: PageId = PageId(0);
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One probe result. Both heights share a unit; only their ratio matters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub content_height: f32,
    pub page_height: f32,
}

impl Measurement {
    pub fn fill_ratio(&self) -> f32 {
        self.content_height / self.page_height
    }
}

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("render surface is not mounted")]
    Unavailable,

    #[error("page {0} does not exist on this surface")]
    UnknownPage(PageId),

    #[error("measurement did not resolve within {0:?}")]
    TimedOut(Duration),
}

/// Anything that can report how tall its content renders at the currently applied scale.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    async fn measure(&self, page: PageId) -> Result<Measurement, MeasureError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Metric-based surface
// ────────────────────────────────────────────────────────────────────────────

/// Name line, relative to body line height.
const NAME_SCALE: f32 = 1.8;
const HEADING_SCALE: f32 = 1.2;
/// Vertical gaps, in em of the body font.
const SECTION_GAP_EM: f32 = 0.8;
const ITEM_GAP_EM: f32 = 0.15;
const BULLET_INDENT_EM: f32 = 1.5;

#[derive(Debug, Clone)]
struct SurfaceState {
    document: PreviewDocument,
    font: FontFamily,
    base_font_size_pt: f32,
    /// Fit override applied by the controller's observer. `None` renders at the base size.
    applied_font_size_pt: Option<f32>,
}

/// Single-page surface that estimates rendered height from font metrics.
pub struct MetricSurface {
    page: PageConfig,
    state: RwLock<SurfaceState>,
}

impl MetricSurface {
    pub fn new(
        page: PageConfig,
        document: PreviewDocument,
        font: FontFamily,
        base_font_size_pt: f32,
    ) -> Self {
        Self {
            page,
            state: RwLock::new(SurfaceState {
                document,
                font,
                base_font_size_pt,
                applied_font_size_pt: None,
            }),
        }
    }

    pub fn replace_document(&self, document: PreviewDocument) {
        self.write().document = document;
    }

    /// Switches template font and nominal size. Any fit override is dropped.
    pub fn set_base(&self, font: FontFamily, base_font_size_pt: f32) {
        let mut state = self.write();
        state.font = font;
        state.base_font_size_pt = base_font_size_pt;
        state.applied_font_size_pt = None;
    }

    pub fn apply_scale(&self, font_size_pt: Option<f32>) {
        self.write().applied_font_size_pt = font_size_pt;
    }

    pub fn font(&self) -> FontFamily {
        self.read().font
    }

    pub fn base_font_size_pt(&self) -> f32 {
        self.read().base_font_size_pt
    }

    pub fn effective_font_size_pt(&self) -> f32 {
        let state = self.read();
        state
            .applied_font_size_pt
            .unwrap_or(state.base_font_size_pt)
    }

    /// Synchronous probe at the currently applied size.
    pub fn measure_now(&self) -> Result<Measurement, MeasureError> {
        let state = self.read();
        if state.document.is_blank() {
            return Err(MeasureError::Unavailable);
        }
        let size = state
            .applied_font_size_pt
            .unwrap_or(state.base_font_size_pt);
        Ok(Measurement {
            content_height: estimate_height_pt(&state.document, state.font, size, &self.page),
            page_height: self.page.usable_height_pt(),
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SurfaceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SurfaceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RenderSurface for MetricSurface {
    async fn measure(&self, page: PageId) -> Result<Measurement, MeasureError> {
        if page != PageId::FIRST {
            return Err(MeasureError::UnknownPage(page));
        }
        self.measure_now()
    }
}

/// Estimated rendered height of `document`, in points, at `font_size_pt`.
pub fn estimate_height_pt(
    document: &PreviewDocument,
    font: FontFamily,
    font_size_pt: f32,
    page: &PageConfig,
) -> f32 {
    if font_size_pt <= 0.0 {
        return 0.0;
    }

    let metrics = get_metrics(font);
    let line = font_size_pt * font.line_height();
    let width_em = page.text_width_pt() / font_size_pt;
    let mut height = 0.0_f32;

    if !document.name.trim().is_empty() {
        height += line * NAME_SCALE;
    }
    if let Some(headline) = document.headline.as_deref() {
        height += metrics.estimated_lines(headline, width_em) as f32 * line;
    }

    for section in &document.sections {
        height += font_size_pt * SECTION_GAP_EM + line * HEADING_SCALE;
        for item in &section.items {
            let lines = metrics.estimated_lines(item, width_em - BULLET_INDENT_EM);
            height += lines as f32 * line + font_size_pt * ITEM_GAP_EM;
        }
    }

    height
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
