use url::Url;

/// Last non-empty path segment of `url`, percent-decoded. Query and fragment
/// are ignored.
pub(crate) fn basename_from_url(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .filter(|s| !s.is_empty()),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            path.rsplit('/')
                .find(|s| !s.is_empty())
                .map(str::to_string)
        }
    }
}
