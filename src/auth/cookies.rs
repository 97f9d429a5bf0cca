use std::time::Duration;

use axum::http::{header, HeaderMap};

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Finds a cookie value across all `Cookie` headers.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value for a token cookie that only the server can read.
pub fn token_cookie(name: &str, value: &str, max_age: Duration) -> String {
    format!(
        "{name}={value}; Path=/; Max-Age={}; HttpOnly; Secure",
        max_age.as_secs()
    )
}

/// `Set-Cookie` value that makes the browser drop the cookie.
pub fn cleared_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; HttpOnly; Secure")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_named_cookie_from_any_header() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("accessToken=abc.def; refreshToken=ghi.jkl"),
        );
        assert_eq!(get_cookie(&headers, ACCESS_COOKIE_NAME), Some("abc.def"));
        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), Some("ghi.jkl"));
        assert_eq!(get_cookie(&headers, "theme"), Some("dark"));
        assert_eq!(get_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("refreshToken="));
        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), None);
    }

    #[test]
    fn token_cookie_is_http_only_and_secure() {
        let c = token_cookie(ACCESS_COOKIE_NAME, "tok", Duration::from_secs(900));
        assert!(c.starts_with("accessToken=tok;"));
        assert!(c.contains("HttpOnly"));
        assert!(c.contains("Secure"));
        assert!(c.contains("Max-Age=900"));

        let cleared = cleared_cookie(REFRESH_COOKIE_NAME);
        assert!(cleared.starts_with("refreshToken=;"));
        assert!(cleared.contains("Max-Age=0"));
    }
}
