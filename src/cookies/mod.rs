//! Cookie storage.
//!
//! The engine talks to cookie storage only through the [`CookieJar`]
//! capability: a snapshot of `name=value` strings for a URL, and a sink for
//! raw `Set-Cookie` values observed in responses.
//! [`CookieMonster`](monster::CookieMonster) is the in-memory implementation.
//!
//! | Chromium (C++) | unifetch (Rust) | Responsibility |
//! |----------------|-----------------|----------------|
//! | `net::CookieMonster` | [`CookieMonster`](monster::CookieMonster) | Cookie jar with LRU eviction |
//! | `net::CanonicalCookie` | [`CanonicalCookie`](canonical_cookie::CanonicalCookie) | Single cookie representation |

use url::Url;

pub mod canonical_cookie;
pub mod monster;

/// Cookie-jar capability consumed by the fetch engine.
pub trait CookieJar: Send + Sync {
    /// Cookies to send to `url`, each formatted as `name=value`, in send order.
    fn get_cookies(&self, url: &Url) -> Vec<String>;

    /// Store raw `Set-Cookie` header values received from `url`.
    fn set_cookies(&self, set_cookie: &[String], url: &Url);
}
