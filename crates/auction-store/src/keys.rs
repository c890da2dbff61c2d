//! Redis key naming convention. All keys share the
//! `nellis:` namespace so the tracker can share a Redis instance with other
//! tools without collision.

pub fn auction(auction_id: &str) -> String {
    format!("nellis:auction:{auction_id}")
}

pub fn auction_index() -> &'static str {
    "nellis:auctions:index"
}

pub fn bid_history(auction_id: &str) -> String {
    format!("nellis:bid_history:{auction_id}")
}

pub fn settings() -> &'static str {
    "nellis:system:settings"
}

/// Holds the encrypted cookie/session blob.
pub fn auth_cookies() -> &'static str {
    "nellis:auth:cookies"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_the_nellis_namespace() {
        assert_eq!(auction("abc123"), "nellis:auction:abc123");
        assert_eq!(bid_history("abc123"), "nellis:bid_history:abc123");
        assert_eq!(settings(), "nellis:system:settings");
        assert_eq!(auth_cookies(), "nellis:auth:cookies");
    }
}
