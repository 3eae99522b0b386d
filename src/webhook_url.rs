//! Checks applied to outbound webhook URLs.
//!
//! [`validate_https_url`] enforces the shape CircleCI accepts.
//! [`validate_webhook_url`] rejects destinations on loopback, private or
//! reserved networks. The second check is purely syntactic: hostnames are
//! never resolved.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use regex::Regex;
use url::{Host, Url};

use crate::schema::Diagnostic;

const URL_ATTRIBUTE: &str = "url";

static HTTPS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https://[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*(:[0-9]{1,5})?(/.*)?$",
    )
    .unwrap_or_else(|err| panic!("invalid built-in URL pattern: {err}"))
});

/// Require `raw` to be an `https://` URL with a well-formed hostname.
pub fn validate_https_url(raw: &str) -> Result<(), Diagnostic> {
    if HTTPS_URL.is_match(raw) {
        return Ok(());
    }
    Err(Diagnostic::error("Invalid Attribute Value Match")
        .with_detail(format!(
            "Attribute url URL must be a valid HTTPS URL with a proper hostname, got: {}",
            raw
        ))
        .with_attribute(URL_ATTRIBUTE))
}

/// Reject webhook URLs that point at the local machine or at non-public
/// address space.
pub fn validate_webhook_url(raw: &str) -> Result<(), Diagnostic> {
    let parsed = Url::parse(raw).map_err(|err| {
        invalid("Invalid URL", format!("Unable to parse URL: {}", err))
    })?;

    let host = match parsed.host() {
        Some(Host::Domain(d)) if !d.is_empty() => Host::Domain(d.to_ascii_lowercase()),
        Some(Host::Domain(_)) | None => {
            return Err(invalid("Invalid URL", "URL must contain a hostname"));
        },
        Some(Host::Ipv4(ip)) => Host::Ipv4(ip),
        Some(Host::Ipv6(ip)) => Host::Ipv6(ip),
    };

    let display = match &host {
        Host::Domain(d) => d.clone(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    };

    if is_localhost(&host) {
        return Err(invalid(
            "Invalid Webhook URL",
            format!(
                "Webhook URL cannot point to localhost or loopback addresses (got: {}). This is a security risk.",
                display
            ),
        ));
    }

    match host {
        Host::Ipv4(ip) if is_reserved(IpAddr::V4(ip)) => Err(reserved(&display)),
        Host::Ipv6(ip) if is_reserved(IpAddr::V6(ip)) => Err(reserved(&display)),
        Host::Domain(d) if d.ends_with(".local") || d.ends_with(".internal") => Err(invalid(
            "Invalid Webhook URL",
            format!(
                "Webhook URL cannot use hostname '{}'. This is a security risk.",
                d
            ),
        )),
        _ => Ok(()),
    }
}

fn invalid(summary: &str, detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(summary)
        .with_detail(detail)
        .with_attribute(URL_ATTRIBUTE)
}

fn reserved(host: &str) -> Diagnostic {
    invalid(
        "Invalid Webhook URL",
        format!(
            "Webhook URL cannot point to private, loopback, or link-local IP addresses (got: {}). This is a security risk.",
            host
        ),
    )
}

fn is_localhost(host: &Host<String>) -> bool {
    match host {
        Host::Domain(d) => {
            d == "localhost" || d == "localhost.localdomain" || d.ends_with(".localhost")
        },
        Host::Ipv4(ip) => ip.is_loopback(),
        Host::Ipv6(ip) => ip.is_loopback(),
    }
}

fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_reserved_v4(ip),
        IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
            Some(v4) => is_reserved_v4(v4),
            None => is_reserved_v6(ip),
        },
    }
}

fn is_reserved_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_loopback()
        || ip.is_link_local()
        || a == 10
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
        || a == 0
        || (a == 100 && (b & 0xC0) == 64)
        || (a == 192 && b == 0 && (c == 0 || c == 2))
        || (a == 198 && (b == 18 || b == 19))
        || (a == 198 && b == 51 && c == 100)
        || (a == 203 && b == 0 && c == 113)
        || a >= 224
}

fn is_reserved_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (first & 0xFE00) == 0xFC00
        || (first & 0xFFC0) == 0xFE80
}
