//! Notification endpoint URL derivation.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// Derive the websocket notification URL for `application` from the HTTP API
/// base URL.
///
/// `http` becomes `ws`, `https` becomes `wss` (websocket schemes pass through
/// unchanged), `/api/v1alpha1/things/{application}/notifications` is appended
/// to the base path, and the access token is carried as the `token` query
/// parameter.
pub fn notification_url(
    api: &Url,
    application: &str,
    token: &SecretString,
) -> Result<Url, Error> {
    let scheme = match api.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(Error::UnsupportedScheme(other.to_owned())),
    };

    let mut url = api.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::UnsupportedScheme(api.scheme().to_owned()))?;
    url.path_segments_mut()
        .map_err(|()| Error::CannotBeABase(api.to_string()))?
        .pop_if_empty()
        .extend(["api", "v1alpha1", "things", application, "notifications"]);
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("token", token.expose_secret());

    Ok(url)
}

/// Render a URL for logging with its query string (and thus any token) removed.
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    let _ = shown.set_password(None);
    shown.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token() -> SecretString {
        SecretString::from("abc123".to_string())
    }

    #[test]
    fn http_becomes_ws() {
        let api = Url::parse("http://localhost:8080").unwrap();
        let url = notification_url(&api, "my-app", &token()).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:8080/api/v1alpha1/things/my-app/notifications?token=abc123"
        );
    }

    #[test]
    fn https_becomes_wss_and_keeps_base_path() {
        let api = Url::parse("https://api.example.com/twins/").unwrap();
        let url = notification_url(&api, "my-app", &token()).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.example.com/twins/api/v1alpha1/things/my-app/notifications?token=abc123"
        );
    }

    #[test]
    fn existing_query_is_replaced() {
        let api = Url::parse("https://api.example.com/?debug=1#frag").unwrap();
        let url = notification_url(&api, "app", &token()).unwrap();
        assert_eq!(url.query(), Some("token=abc123"));
        assert!(url.fragment().is_none());
    }

    #[test]
    fn application_is_percent_encoded() {
        let api = Url::parse("http://localhost").unwrap();
        let url = notification_url(&api, "my app/x", &token()).unwrap();
        assert_eq!(
            url.path(),
            "/api/v1alpha1/things/my%20app%2Fx/notifications"
        );
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let api = Url::parse("ftp://example.com").unwrap();
        let err = notification_url(&api, "app", &token()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn redacted_hides_token() {
        let api = Url::parse("https://api.example.com").unwrap();
        let url = notification_url(&api, "app", &token()).unwrap();
        let shown = redacted(&url);
        assert!(!shown.contains("abc123"));
        assert!(shown.starts_with("wss://api.example.com/api/"));
    }
}
