// modgraph-net/src/validation.rs
use modgraph_common::error::{ModgraphError, Result};
use url::{Host, Url};

/// Validates a proxy base URL. HTTPS is required except for loopback hosts.
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| ModgraphError::Config(format!("Failed to parse URL '{url_str}': {e}")))?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        scheme => Err(ModgraphError::Config(format!(
            "Invalid URL scheme for '{url_str}': Must be https, but got '{scheme}'"
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_and_loopback_http() {
        assert!(validate_url("https://proxy.golang.org").is_ok());
        assert!(validate_url("http://127.0.0.1:8080").is_ok());
        assert!(validate_url("http://localhost:3000/proxy").is_ok());
    }

    #[test]
    fn rejects_plain_http_and_garbage() {
        assert!(validate_url("http://proxy.golang.org").is_err());
        assert!(validate_url("ftp://proxy.golang.org").is_err());
        assert!(validate_url("not a url").is_err());
    }
}
