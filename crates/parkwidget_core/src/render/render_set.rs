//! Fan-out of one Note snapshot to every surface variant.

use super::relative_time::relative_time_label_for;
use super::surface::{
    MediumSurface, RenderTarget, SquareSurface, SurfaceVariant, WideSurface, WidgetSurface,
};
use crate::clock::Clock;
use crate::model::note::Note;
use log::warn;
use std::sync::Arc;

/// Result of rendering one surface variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceStatus {
    Rendered { instances: usize },
    /// No placed instances; nothing to do for this variant.
    NoActiveSurfaces,
    /// Enumeration failed, or at least one instance push failed.
    Failed {
        rendered: usize,
        failed: usize,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOutcome {
    pub variant: SurfaceVariant,
    pub status: SurfaceStatus,
}

/// Summary of one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    /// The single snapshot every surface rendered from.
    pub note: Note,
    /// The relative-time label shared by every surface, if any.
    pub relative_time: Option<String>,
    pub outcomes: Vec<SurfaceOutcome>,
}

impl RenderReport {
    /// Number of instances that received a view.
    pub fn rendered_instances(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match &outcome.status {
                SurfaceStatus::Rendered { instances } => *instances,
                SurfaceStatus::Failed { rendered, .. } => *rendered,
                SurfaceStatus::NoActiveSurfaces => 0,
            })
            .sum()
    }

    pub fn failed_variants(&self) -> Vec<SurfaceVariant> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, SurfaceStatus::Failed { .. }))
            .map(|outcome| outcome.variant)
            .collect()
    }

    pub fn status_of(&self, variant: SurfaceVariant) -> Option<&SurfaceStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.variant == variant)
            .map(|outcome| &outcome.status)
    }
}

/// The set of surface variants sharing one render target.
pub struct WidgetRenderSet {
    surfaces: Vec<Box<dyn WidgetSurface>>,
    target: Arc<dyn RenderTarget>,
    clock: Arc<dyn Clock>,
}

impl WidgetRenderSet {
    /// Empty set; add variants with [`WidgetRenderSet::with_surface`].
    pub fn new(target: Arc<dyn RenderTarget>, clock: Arc<dyn Clock>) -> Self {
        Self {
            surfaces: Vec::new(),
            target,
            clock,
        }
    }

    /// Set with the wide, medium and square variants.
    pub fn standard(target: Arc<dyn RenderTarget>, clock: Arc<dyn Clock>) -> Self {
        Self::new(target, clock)
            .with_surface(WideSurface)
            .with_surface(MediumSurface)
            .with_surface(SquareSurface)
    }

    pub fn with_surface(mut self, surface: impl WidgetSurface + 'static) -> Self {
        self.surfaces.push(Box::new(surface));
        self
    }

    pub fn variants(&self) -> Vec<SurfaceVariant> {
        self.surfaces.iter().map(|surface| surface.variant()).collect()
    }

    /// Renders `note` on every active instance of every variant.
    pub fn render_all(&self, note: &Note, now_ms: i64) -> RenderReport {
        let relative_time = note
            .display_text()
            .and(note.saved_at)
            .map(|saved_at| relative_time_label_for(self.clock.as_ref(), saved_at, now_ms));

        let outcomes = self
            .surfaces
            .iter()
            .map(|surface| SurfaceOutcome {
                variant: surface.variant(),
                status: self.render_surface(surface.as_ref(), note, relative_time.as_deref()),
            })
            .collect();

        RenderReport {
            note: note.clone(),
            relative_time,
            outcomes,
        }
    }

    fn render_surface(
        &self,
        surface: &dyn WidgetSurface,
        note: &Note,
        relative_time: Option<&str>,
    ) -> SurfaceStatus {
        let variant = surface.variant();
        let instances = match self.target.active_instances(variant) {
            Ok(instances) => instances,
            Err(err) => {
                warn!(
                    "event=surface_render module=render status=error variant={} error={}",
                    variant.as_str(),
                    err
                );
                return SurfaceStatus::Failed {
                    rendered: 0,
                    failed: 0,
                    error: err.to_string(),
                };
            }
        };
        if instances.is_empty() {
            return SurfaceStatus::NoActiveSurfaces;
        }

        // Built once per variant: every instance of a variant shows the same view.
        let view = surface.present(note, relative_time);
        let mut rendered = 0;
        let mut failures = Vec::new();
        for instance in instances {
            match self.target.push(variant, instance, &view) {
                Ok(()) => rendered += 1,
                Err(err) => failures.push(err),
            }
        }

        match failures.first() {
            None => SurfaceStatus::Rendered {
                instances: rendered,
            },
            Some(first) => {
                warn!(
                    "event=surface_render module=render status=error variant={} rendered={} failed={} error={}",
                    variant.as_str(),
                    rendered,
                    failures.len(),
                    first
                );
                SurfaceStatus::Failed {
                    rendered,
                    failed: failures.len(),
                    error: first.to_string(),
                }
            }
        }
    }
}
