use crate::cookies::canonical_cookie::CanonicalCookie;
use crate::cookies::CookieJar;
use dashmap::DashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use url::Url;

/// Maximum cookies per domain (Chromium default).
const MAX_COOKIES_PER_DOMAIN: usize = 50;

/// Maximum total cookies.
/// Chromium uses 3300, but we use a slightly lower limit to keep memory usage predictable.
const MAX_COOKIES_TOTAL: usize = 3000;

/// In-memory cookie jar.
/// Modeled after Chromium's `net::CookieMonster`.
#[derive(Clone, Default)]
pub struct CookieMonster {
    // Map<Domain, List<Cookie>>
    store: Arc<DashMap<String, Vec<CanonicalCookie>>>,
}

impl std::fmt::Debug for CookieMonster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieMonster")
            .field("domains", &self.store.len())
            .field("cookies", &self.total_cookie_count())
            .finish()
    }
}

impl CookieMonster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_canonical_cookie(&self, cookie: CanonicalCookie) {
        let mut entry = self.store.entry(cookie.domain.clone()).or_default();

        // Remove existing if name/path match
        entry.retain(|c| c.name != cookie.name || c.path != cookie.path);

        // An already-expired cookie is a deletion.
        if cookie.is_expired(OffsetDateTime::now_utc()) {
            return;
        }

        // Enforce per-domain limit with LRU eviction
        while entry.len() >= MAX_COOKIES_PER_DOMAIN {
            let Some(oldest_idx) = entry
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.creation_time)
                .map(|(i, _)| i)
            else {
                break;
            };
            entry.remove(oldest_idx);
        }

        entry.push(cookie);
        drop(entry); // Release lock before checking global count

        self.enforce_global_limit();
    }

    /// Enforce the global cookie limit by evicting oldest cookies.
    fn enforce_global_limit(&self) {
        while self.total_cookie_count() > MAX_COOKIES_TOTAL {
            let mut oldest: Option<(String, usize, OffsetDateTime)> = None;

            for entry in self.store.iter() {
                for (idx, cookie) in entry.value().iter().enumerate() {
                    let older = oldest
                        .as_ref()
                        .map_or(true, |(_, _, t)| cookie.creation_time < *t);
                    if older {
                        oldest = Some((entry.key().clone(), idx, cookie.creation_time));
                    }
                }
            }

            match oldest {
                Some((domain, idx, _)) => {
                    if let Some(mut entry) = self.store.get_mut(&domain) {
                        entry.remove(idx);
                    }
                }
                None => break,
            }
        }
    }

    /// Get cookies matching the URL with proper domain suffix matching.
    pub fn get_cookies_for_url(&self, url: &Url) -> Vec<CanonicalCookie> {
        let mut result = Vec::new();
        let host = url.host_str().unwrap_or("");
        let now = OffsetDateTime::now_utc();

        for domain in Self::get_matching_domains(host) {
            if let Some(entry) = self.store.get(&domain) {
                for cookie in entry.iter() {
                    if !Self::domain_matches(&cookie.domain, host, cookie.host_only) {
                        continue;
                    }
                    if !Self::path_matches(&cookie.path, url.path()) {
                        continue;
                    }
                    if cookie.secure && url.scheme() != "https" {
                        continue;
                    }
                    if cookie.is_expired(now) {
                        continue;
                    }
                    result.push(cookie.clone());
                }
            }
        }

        // Sort by path length (longest first) then creation time
        result.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| a.creation_time.cmp(&b.creation_time))
        });

        result
    }

    /// Check if cookie domain matches request host.
    /// Implements RFC 6265 domain matching.
    fn domain_matches(cookie_domain: &str, request_host: &str, host_only: bool) -> bool {
        if host_only {
            return cookie_domain.eq_ignore_ascii_case(request_host);
        }

        let cookie_domain = cookie_domain.trim_start_matches('.');
        if request_host.eq_ignore_ascii_case(cookie_domain) {
            return true;
        }

        // request_host must end with ".cookie_domain"
        request_host.len() > cookie_domain.len()
            && request_host
                .get(request_host.len() - cookie_domain.len()..)
                .is_some_and(|suffix| suffix.eq_ignore_ascii_case(cookie_domain))
            && request_host.as_bytes()[request_host.len() - cookie_domain.len() - 1] == b'.'
    }

    /// Check if request path matches cookie path.
    /// Implements RFC 6265 path matching.
    fn path_matches(cookie_path: &str, request_path: &str) -> bool {
        if request_path == cookie_path {
            return true;
        }

        if let Some(rest) = request_path.strip_prefix(cookie_path) {
            return cookie_path.ends_with('/') || rest.starts_with('/');
        }

        false
    }

    /// The host itself and all parent domains.
    fn get_matching_domains(host: &str) -> Vec<String> {
        let mut domains = vec![host.to_string()];

        // "foo.bar.example.com" -> "bar.example.com", "example.com"
        let parts: Vec<&str> = host.split('.').collect();
        for i in 1..parts.len().saturating_sub(1) {
            domains.push(parts[i..].join("."));
        }

        domains
    }

    /// Default cookie path per RFC 6265 §5.1.4.
    fn default_path(url: &Url) -> String {
        let path = url.path();
        match path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => path[..idx].to_string(),
        }
    }

    pub fn parse_and_save_cookie(&self, url: &Url, cookie_line: &str) {
        use cookie::Cookie;

        let parsed = match Cookie::parse(cookie_line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "ignoring unparsable Set-Cookie");
                return;
            }
        };

        let host = url.host_str().unwrap_or("").to_lowercase();
        let now = OffsetDateTime::now_utc();

        let (domain, host_only) = match parsed.domain() {
            Some(d) => {
                let d = d.trim_start_matches('.').to_lowercase();
                // A response may only set cookies for its own domain or a parent of it.
                if !Self::domain_matches(&d, &host, false) {
                    tracing::debug!(url = %url, domain = %d, "rejecting cookie for foreign domain");
                    return;
                }
                (d, false)
            }
            None => (host, true),
        };

        let path = match parsed.path() {
            Some(p) if p.starts_with('/') => p.to_string(),
            _ => Self::default_path(url),
        };

        // Max-Age wins over Expires.
        let expiration_time = match parsed.max_age() {
            Some(max_age) => Some(now + max_age),
            None => parsed.expires_datetime(),
        };

        let mut cookie = CanonicalCookie::new(
            parsed.name().to_string(),
            parsed.value().to_string(),
            domain,
            path,
            now,
            expiration_time,
        );
        cookie.secure = parsed.secure().unwrap_or(false);
        cookie.http_only = parsed.http_only().unwrap_or(false);
        cookie.host_only = host_only;

        self.set_canonical_cookie(cookie);
    }

    /// Get total cookie count.
    pub fn total_cookie_count(&self) -> usize {
        self.store.iter().map(|e| e.value().len()).sum()
    }
}

impl CookieJar for CookieMonster {
    fn get_cookies(&self, url: &Url) -> Vec<String> {
        self.get_cookies_for_url(url)
            .iter()
            .map(CanonicalCookie::to_pair)
            .collect()
    }

    fn set_cookies(&self, set_cookie: &[String], url: &Url) {
        for line in set_cookie {
            self.parse_and_save_cookie(url, line);
        }
    }
}
