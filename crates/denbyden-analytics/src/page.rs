use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

/// Returned by [`Page::source_page`] when there is no usable referrer.
pub const DIRECT_SOURCE: &str = "direct";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Default)]
struct PageState {
    path: Option<String>,
    referrer: Option<String>,
}

/// The page the visitor is currently on.
///
/// Shared handle: the host updates it on navigation, the pipeline and producers read it.
#[derive(Debug, Clone, Default)]
pub struct Page {
    state: Arc<RwLock<PageState>>,
}

impl Page {
    pub fn new(path: impl Into<String>) -> Self {
        let page = Self::default();
        page.navigate(path, None);
        page
    }

    /// A page with no location, as seen outside a browser-like host.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn navigate(&self, path: impl Into<String>, referrer: Option<String>) {
        let mut state = self.state.write();
        state.path = Some(path.into());
        state.referrer = referrer;
    }

    pub fn path(&self) -> String {
        self.state.read().path.clone().unwrap_or_default()
    }

    pub fn referrer(&self) -> Option<String> {
        self.state.read().referrer.clone()
    }

    /// The path component of the referrer, or `"direct"`.
    pub fn source_page(&self) -> String {
        source_page_from(self.state.read().referrer.as_deref())
    }
}

pub fn source_page_from(referrer: Option<&str>) -> String {
    referrer
        .filter(|r| !r.is_empty())
        .and_then(|r| Url::parse(r).ok())
        .map(|url| url.path().to_string())
        .unwrap_or_else(|| DIRECT_SOURCE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_page_is_referrer_path() {
        assert_eq!(
            source_page_from(Some("https://example.com/shop?x=1")),
            "/shop"
        );
    }

    #[test]
    fn source_page_defaults_to_direct() {
        assert_eq!(source_page_from(None), "direct");
        assert_eq!(source_page_from(Some("")), "direct");
        assert_eq!(source_page_from(Some("not a url")), "direct");
    }

    #[test]
    fn navigation_updates_shared_handle() {
        let page = Page::new("/");
        let view = page.clone();
        page.navigate(
            "/product/cozy-mug",
            Some("https://denbyden.com/shop/kitchen".to_string()),
        );
        assert_eq!(view.path(), "/product/cozy-mug");
        assert_eq!(view.source_page(), "/shop/kitchen");
        assert_eq!(Page::detached().path(), "");
    }
}
