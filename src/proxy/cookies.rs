//! Cookie contract for the credential pair.
//!
//! Both tokens live exclusively in HttpOnly cookies read and written per
//! request; no in-process cache of the current token exists anywhere in the
//! gateway. Page script can never observe either value.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Access tokens are valid for ~24h backend-side; the cookie mirrors that.
const ACCESS_TOKEN_MAX_AGE_HOURS: i64 = 24;

/// Freshly rotated access-token cookie
pub fn access_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::hours(ACCESS_TOKEN_MAX_AGE_HOURS))
        .build()
}

/// Immediate-expiry stamp (Max-Age=0) forcing the browser to drop the cookie
pub fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::ZERO)
        .build()
}

/// Stamp both credential cookies expired; used on any unrecoverable 401/403
pub fn clear_auth_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(expired_cookie(ACCESS_TOKEN_COOKIE, secure))
        .add(expired_cookie(REFRESH_TOKEN_COOKIE, secure))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_cookie_attributes() {
        let cookie = access_cookie("tok".to_string(), true);
        assert_eq!(cookie.name(), "access_token");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(Duration::hours(24)));
    }

    #[test]
    fn test_access_cookie_insecure_in_dev() {
        let cookie = access_cookie("tok".to_string(), false);
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn test_expired_cookie_is_max_age_zero() {
        let cookie = expired_cookie(REFRESH_TOKEN_COOKIE, false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn test_clear_stamps_both_cookies() {
        let jar = clear_auth_cookies(CookieJar::new(), false);
        let names: Vec<_> = jar.iter().map(|c| c.name().to_string()).collect();
        assert!(names.contains(&"access_token".to_string()));
        assert!(names.contains(&"refresh_token".to_string()));
        for cookie in jar.iter() {
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }
}
