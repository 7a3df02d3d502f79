//! Service endpoint parsing shared by the HTTP clients.

use url::Url;

/// Parse `raw` as a service base URL whose path ends in `/`, so relative
/// joins append to it rather than replacing its last segment.
pub fn normalize_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let mut path = url.path().trim_end_matches('/').to_owned();
        path.push('/');
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_added_once() {
        for raw in [
            "https://api.pinata.cloud/v1",
            "https://api.pinata.cloud/v1/",
            "https://api.pinata.cloud/v1//",
        ] {
            let url = normalize_base_url(raw).unwrap();
            assert_eq!(url.as_str(), "https://api.pinata.cloud/v1/");
            assert_eq!(
                url.join("pinning/pinFileToIPFS").unwrap().as_str(),
                "https://api.pinata.cloud/v1/pinning/pinFileToIPFS"
            );
        }
    }

    #[test]
    fn test_bare_host() {
        let url = normalize_base_url("http://localhost:8000").unwrap();
        assert_eq!(url.join("api/upload").unwrap().as_str(), "http://localhost:8000/api/upload");
    }

    #[test]
    fn test_rejects_relative() {
        assert!(normalize_base_url("not a url").is_err());
        assert!(normalize_base_url("/api").is_err());
    }
}
