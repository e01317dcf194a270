//! Widget rendering surfaces.
//!
//! # Responsibility
//! - Turn one Note snapshot into per-instance `WidgetView`s for every size
//!   variant.
//! - Format the relative save-time label shown under the note.
//!
//! # Invariants
//! - One render pass uses one Note and one relative-time label for every
//!   surface, so all variants agree.
//! - A failing or empty surface never stops the remaining surfaces.

pub mod relative_time;
pub mod render_set;
pub mod surface;
