//! The one piece of the configuration store this crate depends on (spec
//! §1, §6): a lookup from `send_ident` to the two transport endpoint
//! specs. The database, its schema, and the DSL that populates it are all
//! out of scope — callers supply an implementation, or skip this and pass
//! `(app_id, send_spec, recv_spec)` directly to their own transport setup.

/// Endpoint pair for one handler row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    pub send_spec: String,
    pub recv_spec: String,
}

pub trait ConfigLookup {
    fn find_handler_by_send_ident(&self, send_ident: &str) -> Option<HandlerSpec>;
}

/// A fixed-table lookup, useful for tests and small static deployments.
pub struct StaticConfig {
    entries: std::collections::HashMap<String, HandlerSpec>,
}

impl StaticConfig {
    pub fn new() -> Self {
        StaticConfig { entries: std::collections::HashMap::new() }
    }

    pub fn insert(&mut self, send_ident: impl Into<String>, spec: HandlerSpec) {
        self.entries.insert(send_ident.into(), spec);
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLookup for StaticConfig {
    fn find_handler_by_send_ident(&self, send_ident: &str) -> Option<HandlerSpec> {
        self.entries.get(send_ident).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_config_round_trips() {
        let mut cfg = StaticConfig::new();
        cfg.insert("app", HandlerSpec { send_spec: "tcp://a".into(), recv_spec: "tcp://b".into() });
        assert_eq!(
            cfg.find_handler_by_send_ident("app"),
            Some(HandlerSpec { send_spec: "tcp://a".into(), recv_spec: "tcp://b".into() })
        );
        assert_eq!(cfg.find_handler_by_send_ident("missing"), None);
    }
}
