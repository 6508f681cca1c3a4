// ============================================================================
// spark-tracked - ReactiveUrl
// A WHATWG URL with one cell per component and live search params
// ============================================================================
//
// Component getters read their own cell; composite getters (`href`, `host`,
// `origin`) read every cell they are made of. Setters go through the
// `url::quirks` setters, which apply the WHATWG rules, and then copy every
// component back into its cell. Equal values are ignored by the cells, so
// only the components that actually moved notify.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use url::{quirks, Url};

use crate::core::types::default_equals;
use crate::error::Result;
use crate::primitives::block::{Block, BlockInner};
use crate::primitives::scope::safe_scope;
use crate::primitives::tracked::Tracked;

use super::search_params::ReactiveSearchParams;

#[cfg(test)]
thread_local! {
    static SEARCH_WRITES: std::cell::Cell<u32> = const { std::cell::Cell::new(0) };
}

// =============================================================================
// URL INNER
// =============================================================================

pub(crate) struct UrlInner {
    url: RefCell<Url>,
    protocol: Tracked<String>,
    username: Tracked<String>,
    password: Tracked<String>,
    hostname: Tracked<String>,
    port: Tracked<String>,
    pathname: Tracked<String>,
    search: Tracked<String>,
    hash: Tracked<String>,
    params: ReactiveSearchParams,
    block: Option<Weak<BlockInner>>,
}

impl UrlInner {
    fn new(url: Url, block: Option<Weak<BlockInner>>) -> Rc<Self> {
        Rc::new_cyclic(|weak| {
            let cell = |value: &str| Tracked::with_owner(value.to_string(), default_equals, block.clone());
            Self {
                protocol: cell(quirks::protocol(&url)),
                username: cell(quirks::username(&url)),
                password: cell(quirks::password(&url)),
                hostname: cell(quirks::hostname(&url)),
                port: cell(quirks::port(&url)),
                pathname: cell(quirks::pathname(&url)),
                search: cell(quirks::search(&url)),
                hash: cell(quirks::hash(&url)),
                params: ReactiveSearchParams::bound(quirks::search(&url), block.clone(), weak.clone()),
                url: RefCell::new(url),
                block,
            }
        })
    }

    /// Copy every component of the native URL into its cell. Re-parses the
    /// search params if the search moved.
    fn sync(&self) {
        let (protocol, username, password, hostname, port, pathname, search, hash) = {
            let url = self.url.borrow();
            (
                quirks::protocol(&url).to_string(),
                quirks::username(&url).to_string(),
                quirks::password(&url).to_string(),
                quirks::hostname(&url).to_string(),
                quirks::port(&url).to_string(),
                quirks::pathname(&url).to_string(),
                quirks::search(&url).to_string(),
                quirks::hash(&url).to_string(),
            )
        };

        self.protocol.set(protocol);
        self.username.set(username);
        self.password.set(password);
        self.hostname.set(hostname);
        self.port.set(port);
        self.pathname.set(pathname);
        self.hash.set(hash);
        if self.search.set(search.clone()) {
            self.params.replace_from_url(&search);
        }
    }

    fn write_native(&self, f: impl FnOnce(&mut Url)) {
        f(&mut self.url.borrow_mut());
        self.sync();
    }

    /// Set the search component. Used by the bound params to write their
    /// serialization back.
    pub(crate) fn write_search(&self, search: &str) {
        #[cfg(test)]
        SEARCH_WRITES.with(|writes| writes.set(writes.get() + 1));

        self.write_native(|url| quirks::set_search(url, search));
    }
}

// =============================================================================
// REACTIVE URL
// =============================================================================

/// A URL whose components are reactive.
///
/// # Example
///
/// ```
/// use spark_tracked::ReactiveUrl;
///
/// let url = ReactiveUrl::parse("https://example.com/docs?page=1").unwrap();
/// assert_eq!(url.search_params().get("page").as_deref(), Some("1"));
///
/// url.search_params().set("page", "2");
/// assert_eq!(url.search(), "?page=2");
///
/// url.set_search("?tab=api");
/// assert_eq!(url.search_params().get("tab").as_deref(), Some("api"));
/// assert_eq!(url.href(), "https://example.com/docs?tab=api");
/// ```
pub struct ReactiveUrl {
    inner: Rc<UrlInner>,
}

impl Clone for ReactiveUrl {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl ReactiveUrl {
    /// Parse an absolute URL, owned by the ambient scope.
    pub fn parse(input: &str) -> Result<Self> {
        Self::new_in(&safe_scope(), input)
    }

    /// Resolve `input` against `base`, owned by the ambient scope.
    pub fn parse_with_base(input: &str, base: &str) -> Result<Self> {
        let url = Url::parse(base)?.join(input)?;
        Ok(Self::from_url_in(url, &safe_scope()))
    }

    /// Parse an absolute URL, owned by `block`.
    pub fn new_in(block: &Block, input: &str) -> Result<Self> {
        Ok(Self::from_url_in(Url::parse(input)?, block))
    }

    /// Wrap an already parsed URL, owned by `block`.
    pub fn from_url_in(url: Url, block: &Block) -> Self {
        Self {
            inner: UrlInner::new(url, Some(block.downgrade_inner())),
        }
    }

    /// Block that owns this URL's cells, if it is still alive.
    pub fn block(&self) -> Option<Block> {
        self.inner
            .block
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Block::from_inner)
    }

    /// Snapshot of the native URL, untracked.
    pub fn to_url(&self) -> Url {
        self.inner.url.borrow().clone()
    }

    // =========================================================================
    // GETTERS
    // =========================================================================

    /// The whole serialized URL. Depends on every component.
    pub fn href(&self) -> String {
        let i = &self.inner;
        for cell in [&i.protocol, &i.username, &i.password, &i.hostname, &i.port, &i.pathname, &i.hash, &i.search] {
            cell.track();
        }
        quirks::href(&i.url.borrow()).to_string()
    }

    /// Scheme followed by `:`.
    pub fn protocol(&self) -> String {
        self.inner.protocol.get()
    }

    pub fn username(&self) -> String {
        self.inner.username.get()
    }

    pub fn password(&self) -> String {
        self.inner.password.get()
    }

    /// Hostname and, if not the default, `:port`.
    pub fn host(&self) -> String {
        self.inner.hostname.track();
        self.inner.port.track();
        quirks::host(&self.inner.url.borrow()).to_string()
    }

    pub fn hostname(&self) -> String {
        self.inner.hostname.get()
    }

    /// Port as written, empty when it is the scheme's default.
    pub fn port(&self) -> String {
        self.inner.port.get()
    }

    /// Scheme, host and port; `"null"` for opaque origins.
    pub fn origin(&self) -> String {
        self.inner.protocol.track();
        self.inner.hostname.track();
        self.inner.port.track();
        quirks::origin(&self.inner.url.borrow())
    }

    pub fn pathname(&self) -> String {
        self.inner.pathname.get()
    }

    /// Query with its leading `?`, or empty.
    pub fn search(&self) -> String {
        self.inner.search.get()
    }

    /// Fragment with its leading `#`, or empty.
    pub fn hash(&self) -> String {
        self.inner.hash.get()
    }

    /// Live params bound to this URL.
    pub fn search_params(&self) -> ReactiveSearchParams {
        self.inner.params.clone()
    }

    /// Same as [`href`](Self::href).
    pub fn to_json(&self) -> String {
        self.href()
    }

    // =========================================================================
    // SETTERS
    // =========================================================================

    /// Replace the whole URL. Fails, leaving everything unchanged, if `value`
    /// does not parse.
    pub fn set_href(&self, value: &str) -> Result<()> {
        quirks::set_href(&mut self.inner.url.borrow_mut(), value)?;
        self.inner.sync();
        Ok(())
    }

    fn set_component(&self, component: &str, value: &str, f: fn(&mut Url, &str) -> std::result::Result<(), ()>) {
        let accepted = f(&mut self.inner.url.borrow_mut(), value).is_ok();
        if !accepted {
            tracing::debug!(component, value, "ignoring invalid URL component");
            return;
        }
        self.inner.sync();
    }

    pub fn set_protocol(&self, value: &str) {
        self.set_component("protocol", value, quirks::set_protocol);
    }

    pub fn set_username(&self, value: &str) {
        self.set_component("username", value, quirks::set_username);
    }

    pub fn set_password(&self, value: &str) {
        self.set_component("password", value, quirks::set_password);
    }

    /// Set hostname and port together (`"example.org:8080"`).
    pub fn set_host(&self, value: &str) {
        self.set_component("host", value, quirks::set_host);
    }

    pub fn set_hostname(&self, value: &str) {
        self.set_component("hostname", value, quirks::set_hostname);
    }

    pub fn set_port(&self, value: &str) {
        self.set_component("port", value, quirks::set_port);
    }

    pub fn set_pathname(&self, value: &str) {
        self.inner.write_native(|url| quirks::set_pathname(url, value));
    }

    /// Set the query (with or without `?`); the search params follow.
    pub fn set_search(&self, value: &str) {
        self.inner.write_search(value);
    }

    pub fn set_hash(&self, value: &str) {
        self.inner.write_native(|url| quirks::set_hash(url, value));
    }
}

impl fmt::Display for ReactiveUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

impl fmt::Debug for ReactiveUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReactiveUrl")
            .field(&quirks::href(&self.inner.url.borrow()))
            .finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ReactiveUrl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.href())
    }
}

// =============================================================================
// TESTS
// =============================================================================
