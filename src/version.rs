//! Version information.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Value sent as `X-API-Version` unless configured otherwise.
pub const API_VERSION: &str = "1.0.0";

/// `User-Agent` for the reqwest transport: `weub/{version}`.
pub fn user_agent() -> String {
    format!("weub/{PKG_VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_contains_pkg_version() {
        let ua = user_agent();
        assert!(ua.starts_with("weub/"));
        assert!(ua.ends_with(PKG_VERSION), "user agent should end with pkg version");
    }
}
