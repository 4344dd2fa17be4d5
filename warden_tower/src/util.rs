//! Utilities for generating HTTP responses on authorization failures

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};

const INVALID_TOKEN: &str = r#"Bearer error="invalid_token""#;

/// Build a JSON error response
///
/// The prepared response will have the form:
///
/// ```http
/// HTTP/1.1 {status}
/// content-type: application/json
///
/// {"error":"{code}","message":"{message}"}
/// ```
pub fn error_response<Body: From<Bytes>>(
    status: StatusCode,
    code: &str,
    message: &str,
) -> Response<Body> {
    let body = serde_json::json!({
        "error": code,
        "message": message,
    })
    .to_string();

    let mut resp = Response::new(Body::from(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

/// Build a `401 Unauthorized` JSON response with the appropriate
/// `www-authenticate` header
///
/// The description provided will be automatically escaped to make sure it
/// is header-friendly.
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// www-authenticate: Bearer error="invalid_token" error_description="{description}"
/// content-type: application/json
/// ```
///
/// `error_description` is omitted if `description` is empty.
pub fn unauthorized<Body: From<Bytes>>(description: &str) -> Response<Body> {
    let mut resp = error_response(
        StatusCode::UNAUTHORIZED,
        "invalid_token",
        "authentication required",
    );
    resp.headers_mut()
        .insert(header::WWW_AUTHENTICATE, invalid_token(description));
    resp
}

fn invalid_token(description: &str) -> HeaderValue {
    if description.is_empty() {
        return HeaderValue::from_static(INVALID_TOKEN);
    }

    // `escape_default` leaves only printable ASCII, which is always a valid
    // header value.
    HeaderValue::try_from(format!(
        r#"{INVALID_TOKEN} error_description="{}""#,
        description.escape_default()
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(INVALID_TOKEN))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use http_body_util::Full;

    use super::*;

    #[test]
    fn in_unauthorized_description_unicode_and_non_printing_description_does_not_panic() {
        let resp = unauthorized::<Full<Bytes>>(
            "\0\n\ttest™: \"Ĉu oni povas bone ŝanĝi ĉi tiu mesaĝon en respondon?\"",
        );

        let headers = extract_www_authenticate_headers(&resp);

        let expected = BTreeSet::from([
            r#"Bearer error="invalid_token" error_description="\u{0}\n\ttest\u{2122}: \"\u{108}u oni povas bone \u{15d}an\u{11d}i \u{109}i tiu mesa\u{11d}on en respondon?\"""#,
        ]);

        assert_eq!(headers, expected);
    }

    #[test]
    fn in_unauthorized_with_empty_description_doesnt_include_description() {
        let resp = unauthorized::<Full<Bytes>>("");

        let headers = extract_www_authenticate_headers(&resp);

        assert_eq!(headers, BTreeSet::from([INVALID_TOKEN]));
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn error_response_is_json() {
        let resp = error_response::<Vec<u8>>(
            StatusCode::FORBIDDEN,
            "permission_denied",
            "caller lacks required \"usr\" permission",
        );

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "permission_denied",
                "message": "caller lacks required \"usr\" permission",
            })
        );
    }

    fn extract_www_authenticate_headers<B>(resp: &Response<B>) -> BTreeSet<&str> {
        resp.headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect::<BTreeSet<_>>()
    }
}
