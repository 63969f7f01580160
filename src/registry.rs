//! Method-token → variant-kind registry (spec §4.3).
//!
//! The source registry maps a method token to a request *subclass*; in a
//! statically typed rewrite there is no subclass to install, only a
//! classification tag (Design Notes §9). Construct a fresh `Registry` per
//! handler rather than relying on process-wide state (spec §9).

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Http,
    Json,
    Xml,
    WebSocket,
    /// No registration claims this token and no default has been pointed
    /// elsewhere (spec §4.8: dispatch logs an error and replies nothing).
    Unknown,
}

const STANDARD_HTTP_METHODS: &[&str] =
    &["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "TRACE", "CONNECT"];

#[derive(Clone)]
pub struct Registry {
    entries: IndexMap<String, VariantKind>,
    default: VariantKind,
    /// the fallthrough kind this registry was constructed with; re-pointing
    /// the default away from it purges stale entries that used to coincide
    /// with it (spec §4.3).
    base_variant: VariantKind,
}

impl Registry {
    /// A registry pre-populated with the out-of-the-box taxonomy: standard
    /// HTTP verbs, `JSON`, `XML`, `WEBSOCKET`; anything else is `Unknown`
    /// until registered or until the default is re-pointed.
    pub fn new() -> Self {
        let mut entries = IndexMap::new();
        for verb in STANDARD_HTTP_METHODS {
            entries.insert((*verb).to_string(), VariantKind::Http);
        }
        entries.insert("JSON".to_string(), VariantKind::Json);
        entries.insert("XML".to_string(), VariantKind::Xml);
        entries.insert("WEBSOCKET".to_string(), VariantKind::WebSocket);
        Registry { entries, default: VariantKind::Unknown, base_variant: VariantKind::Unknown }
    }

    /// An empty registry with no built-in taxonomy at all, for callers that
    /// want to define method tokens from scratch.
    pub fn empty() -> Self {
        Registry { entries: IndexMap::new(), default: VariantKind::Unknown, base_variant: VariantKind::Unknown }
    }

    /// Install `method_token → kind`.
    pub fn register(&mut self, method_token: impl Into<String>, kind: VariantKind) {
        self.entries.insert(method_token.into(), kind);
    }

    /// Replace the fallthrough used for unregistered tokens, purging any
    /// entry still pointing at the original base variant.
    pub fn register_default(&mut self, kind: VariantKind) {
        self.entries.retain(|_, v| *v != self.base_variant);
        self.default = kind;
    }

    pub fn classify(&self, method_token: &str) -> VariantKind {
        self.entries.get(method_token).copied().unwrap_or(self.default)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_token_falls_through_to_unknown() {
        let reg = Registry::new();
        assert_eq!(reg.classify("FOO"), VariantKind::Unknown);
    }

    #[test]
    fn standard_verbs_and_message_methods_are_built_in() {
        let reg = Registry::new();
        assert_eq!(reg.classify("GET"), VariantKind::Http);
        assert_eq!(reg.classify("POST"), VariantKind::Http);
        assert_eq!(reg.classify("JSON"), VariantKind::Json);
        assert_eq!(reg.classify("XML"), VariantKind::Xml);
        assert_eq!(reg.classify("WEBSOCKET"), VariantKind::WebSocket);
    }

    #[test]
    fn explicit_registration_wins() {
        let mut reg = Registry::empty();
        reg.register("JSON", VariantKind::Json);
        assert_eq!(reg.classify("JSON"), VariantKind::Json);
        assert_eq!(reg.classify("GET"), VariantKind::Unknown);
    }

    #[test]
    fn re_registering_default_purges_stale_base_entries() {
        let mut reg = Registry::empty();
        // registered explicitly, but it coincides with the original base (Unknown)
        reg.register("WEIRD", VariantKind::Unknown);
        reg.register_default(VariantKind::Json);
        // the stale entry pointing at the original base variant is gone
        assert_eq!(reg.classify("WEIRD"), VariantKind::Json);
        // the new default now applies to anything unregistered too
        assert_eq!(reg.classify("ANYTHING"), VariantKind::Json);
    }

    #[test]
    fn entries_not_matching_base_variant_survive_default_swap() {
        let mut reg = Registry::new();
        reg.register_default(VariantKind::Json);
        // "XML" was registered at construction to Xml, not to the original
        // base (Unknown), so it survives the default swap.
        assert_eq!(reg.classify("XML"), VariantKind::Xml);
    }
}
