//! Deterministic playground addressing.
//!
//! A playground id is the UUID v5 of its domain in the OID namespace, so
//! every node derives the same id for the same hostname without a lookup
//! table.

use uuid::Uuid;

pub fn playground_id(domain: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, domain.as_bytes()).to_string()
}

/// Strips a `:port` suffix by keeping everything before the first colon.
///
/// Bracketed IPv6 literals (`[::1]:8080`) are not understood and come back
/// as `[`; callers only use this for `host:port` style domains.
pub fn host_without_port(domain: &str) -> Option<&str> {
    domain.split_once(':').map(|(host, _)| host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn same_domain_yields_same_id() {
        assert_eq!(
            playground_id("play.example.com"),
            playground_id("play.example.com")
        );
    }

    #[test_timeout::timeout]
    fn different_domains_yield_different_ids() {
        let ids: std::collections::HashSet<String> = ["a.test", "b.test", "a.test:80", "localhost"]
            .iter()
            .map(|d| playground_id(d))
            .collect();
        assert_eq!(ids.len(), 4);
    }

    #[test_timeout::timeout]
    fn id_is_a_stable_v5_uuid() {
        let id = playground_id("localhost");
        let parsed = Uuid::parse_str(&id).expect("uuid");
        assert_eq!(parsed.get_version_num(), 5);
        assert_eq!(id, id.to_lowercase());
    }

    #[test_timeout::timeout]
    fn matches_ids_already_issued_by_other_nodes() {
        assert_eq!(
            playground_id("localhost"),
            "4a24b940-e23f-54f5-8867-137433240dd7"
        );
    }

    #[test_timeout::timeout]
    fn port_is_cut_at_first_colon() {
        assert_eq!(host_without_port("host:1234"), Some("host"));
        assert_eq!(host_without_port("host:1234:extra"), Some("host"));
        assert_eq!(host_without_port("host"), None);
        assert_eq!(host_without_port("[::1]:8080"), Some("["));
    }
}
