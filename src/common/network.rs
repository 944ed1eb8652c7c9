use anyhow::{Context, Result};
use std::time::Duration;

/// Looks up the address this server is reachable on from the outside
pub trait PublicIpResolver {
    fn public_ip(&self) -> Result<String>;
}

/// Resolver backed by a plain-text "what is my IP" endpoint
pub struct HttpIpResolver {
    url: String,
    timeout: Duration,
}

impl HttpIpResolver {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl PublicIpResolver for HttpIpResolver {
    fn public_ip(&self) -> Result<String> {
        let ip = fetch_text(&self.url, self.timeout)?;
        if ip.is_empty() {
            anyhow::bail!("No public IP returned by {}", self.url);
        }
        Ok(ip)
    }
}

/// GET `url` and return the trimmed body; non-2xx answers are errors
pub fn fetch_text(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")?;
    let body = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("querying {}", url))?
        .text()
        .with_context(|| format!("reading response from {}", url))?;
    Ok(body.trim().to_string())
}

/// Resolver that always answers with the same address
#[cfg(test)]
pub struct StaticIpResolver(pub String);

#[cfg(test)]
impl PublicIpResolver for StaticIpResolver {
    fn public_ip(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
