//! # Producers
//!
//! Typed helpers that storefront UI code binds to a component. Each one knows how to
//! build a single kind of event and hands it to the pipeline; none of them see the
//! queue or the delivery mode.
//!
//! - Callback style ([`ProductClick`], [`AddToCart`], [`EmailSubmit`], [`ImageSwipe`],
//!   [`SectionExpand`], [`GiftWrappingToggle`], [`FilterSelect`]): bind parameters once,
//!   call `track` on each UI action.
//! - Passive ([`ProductExposure`], [`PageDwell`], [`ScrollDepth`],
//!   [`ProductDetailView`]): the host forwards viewport / lifecycle signals and the
//!   producer decides when to fire.

mod actions;
mod dwell;
mod exposure;
mod scroll;

pub use actions::{
    AddToCart, EmailSubmit, FilterSelect, GiftWrappingToggle, ImageSwipe, ProductClick,
    ProductDetailView, SectionExpand,
};
pub use dwell::PageDwell;
pub use exposure::{EXPOSURE_VISIBILITY_THRESHOLD, IntersectionEntry, ProductExposure};
pub use scroll::{ScrollDepth, ScrollMetrics};

/// A product as referenced by events: catalog id plus URL slug.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProductRef {
    pub id: String,
    pub slug: String,
}

impl ProductRef {
    pub fn new(id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
        }
    }
}
