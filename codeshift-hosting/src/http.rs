//! Shared plumbing for the REST providers

use reqwest::Response;

use crate::{Error, Result};

/// Turn a non-success response into [`Error::Status`]
pub(crate) async fn check(provider: &'static str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response".to_string());
    Err(Error::Status {
        provider,
        status,
        body,
    })
}

/// Map a "not found" error to `None`
pub(crate) fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Percent-encode a single path segment
pub(crate) fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("group/sub project"), "group%2Fsub%20project");
        assert_eq!(encode_segment("src/main.rs"), "src%2Fmain.rs");
    }

    #[test]
    fn test_optional_maps_not_found() {
        let missing: Result<u8> = Err(Error::NotFound("x".to_string()));
        assert_eq!(optional(missing).unwrap(), None);

        let failed: Result<u8> = Err(Error::Auth("bad".to_string()));
        assert!(optional(failed).is_err());
        assert_eq!(optional(Ok(3)).unwrap(), Some(3));
    }
}
