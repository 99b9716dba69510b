use url::Url;

/// Reduce an absolute http(s) image URL to its host-relative form so stored
/// references survive moving between dev, tunnel, and production hosts.
/// Relative paths and non-http schemes pass through unchanged.
pub fn normalize_image_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            let mut relative = url.path().to_string();
            if let Some(query) = url.query() {
                relative.push('?');
                relative.push_str(query);
            }
            relative
        }
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_url_becomes_relative() {
        assert_eq!(
            normalize_image_url("https://example.com/uploads/hero.png"),
            "/uploads/hero.png"
        );
        assert_eq!(
            normalize_image_url("http://localhost:4000/uploads/a.jpg?v=2"),
            "/uploads/a.jpg?v=2"
        );
    }

    #[test]
    fn relative_path_unchanged() {
        assert_eq!(normalize_image_url("/uploads/hero.png"), "/uploads/hero.png");
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(normalize_image_url("  /uploads/x.png "), "/uploads/x.png");
    }

    #[test]
    fn data_uri_unchanged() {
        let uri = "data:image/png;base64,AAAA";
        assert_eq!(normalize_image_url(uri), uri);
    }
}
