//! Session carrier: binds a session token to a signed cookie
//!
//! The cookie wrapper is signed independently of the token it carries, so a
//! token is only read back when both the cookie signature and (later) the
//! token signature check out.

use axum_extra::extract::cookie::{Cookie, CookieJar, Key, SameSite, SignedCookieJar};
use time::{Duration, OffsetDateTime};

/// Lifetime of the session cookie
pub const SESSION_TTL_HOURS: i64 = 24;

/// Derive the cookie signing key from the process-wide secret.
///
/// The secret must be at least 32 bytes long.
pub fn cookie_key(secret: &[u8]) -> Key {
    Key::derive_from(secret)
}

/// Writes, reads and clears the session cookie
#[derive(Debug, Clone)]
pub struct SessionCarrier {
    cookie_name: String,
    secure: bool,
}

impl SessionCarrier {
    /// `secure` should only be set for production deployments served over TLS
    pub fn new(cookie_name: impl Into<String>, secure: bool) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            secure,
        }
    }

    /// Attach the token, replacing any session the client already holds
    pub fn set_session(&self, jar: SignedCookieJar, token: String) -> SignedCookieJar {
        let cookie = Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::hours(SESSION_TTL_HOURS))
            .expires(OffsetDateTime::now_utc() + Duration::hours(SESSION_TTL_HOURS));

        jar.add(cookie)
    }

    /// Expire the session cookie.
    ///
    /// The removal is emitted unconditionally, even when the incoming cookie
    /// was missing or failed its signature check.
    pub fn clear_session(&self) -> CookieJar {
        let mut cookie = Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .build();
        cookie.make_removal();

        CookieJar::new().add(cookie)
    }

    /// Token carried by a correctly signed session cookie, if any
    pub fn read_session(&self, jar: &SignedCookieJar) -> Option<String> {
        jar.get(&self.cookie_name)
            .map(|cookie| cookie.value().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::header, response::IntoResponse};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef-cookie-tests";

    fn jar_from(cookie_header: &str) -> SignedCookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, cookie_header.parse().unwrap());
        SignedCookieJar::from_headers(&headers, cookie_key(SECRET))
    }

    fn set_cookie_headers(jar: impl IntoResponse) -> Vec<String> {
        jar.into_response()
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn key_derivation_is_deterministic() {
        assert_eq!(cookie_key(SECRET).master(), cookie_key(SECRET).master());
        assert_ne!(
            cookie_key(SECRET).master(),
            cookie_key(b"another-secret-another-secret-another").master()
        );
    }

    #[test]
    fn sets_hardened_cookie() {
        let carrier = SessionCarrier::new("jwt", false);
        let jar = SignedCookieJar::new(cookie_key(SECRET));
        let headers = set_cookie_headers(carrier.set_session(jar, "token-value".to_string()));

        assert_eq!(headers.len(), 1);
        let cookie = &headers[0];
        assert!(cookie.starts_with("jwt="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));
        // Signed, not the bare token.
        assert!(!cookie.starts_with("jwt=token-value;"));
    }

    #[test]
    fn secure_flag_follows_configuration() {
        let carrier = SessionCarrier::new("jwt", true);
        let jar = SignedCookieJar::new(cookie_key(SECRET));
        let headers = set_cookie_headers(carrier.set_session(jar, "t".to_string()));
        assert!(headers[0].contains("Secure"));
    }

    #[test]
    fn reads_back_signed_value() {
        let carrier = SessionCarrier::new("jwt", false);
        let jar = carrier.set_session(SignedCookieJar::new(cookie_key(SECRET)), "abc".to_string());
        let header = set_cookie_headers(jar).remove(0);
        let pair = header.split(';').next().unwrap();

        assert_eq!(carrier.read_session(&jar_from(pair)).as_deref(), Some("abc"));
    }

    #[test]
    fn unsigned_or_tampered_cookie_is_no_session() {
        let carrier = SessionCarrier::new("jwt", false);
        assert_eq!(carrier.read_session(&jar_from("jwt=abc")), None);

        let other_key = Key::derive_from(b"another-secret-another-secret-another");
        let foreign = carrier.set_session(SignedCookieJar::new(other_key), "abc".to_string());
        let header = set_cookie_headers(foreign).remove(0);
        let pair = header.split(';').next().unwrap();
        assert_eq!(carrier.read_session(&jar_from(pair)), None);
    }

    #[test]
    fn absent_cookie_is_no_session() {
        let carrier = SessionCarrier::new("jwt", false);
        assert_eq!(carrier.read_session(&jar_from("other=1")), None);
    }

    #[test]
    fn clearing_always_emits_removal() {
        let carrier = SessionCarrier::new("jwt", false);
        let headers = set_cookie_headers(carrier.clear_session());

        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("jwt=;"));
        assert!(headers[0].contains("Max-Age=0"));
        assert!(headers[0].contains("Path=/"));
    }
}
