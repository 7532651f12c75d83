use crate::UrlError;
use url::{ParseError, Url};

/// Resolves an href into an absolute, normalized URL
///
/// # Resolution Steps
///
/// 1. A reference with a scheme is parsed as-is
/// 2. A reference without one (`/path`, `page.html`, `//host/path`) is joined
///    onto `origin`
/// 3. Only `http` and `https` results are kept
/// 4. The fragment is dropped, so `page.html#top` and `page.html` are one URL
///
/// Everything else (host lowercasing, dot segments, default ports) is the
/// `url` crate's RFC 3986 behaviour. No other rewriting happens: two URLs that
/// differ textually after this step are distinct.
///
/// # Examples
///
/// ```
/// use cctld_crawler::url::resolve_reference;
/// use url::Url;
///
/// let origin = Url::parse("http://a.pt/dir/index.html").unwrap();
/// let url = resolve_reference("../b.html#x", Some(&origin)).unwrap();
/// assert_eq!(url.as_str(), "http://a.pt/b.html");
/// ```
pub fn resolve_reference(href: &str, origin: Option<&Url>) -> Result<Url, UrlError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(UrlError::Parse("empty reference".to_string()));
    }

    let mut url = match Url::parse(href) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => {
            let base = origin.ok_or_else(|| {
                UrlError::Parse(format!("relative reference '{}' without origin", href))
            })?;
            base.join(href).map_err(|e| UrlError::Parse(e.to_string()))?
        }
        Err(e) => return Err(UrlError::Parse(e.to_string())),
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns the lowercase file extension of the URL's last path segment
///
/// The extension is the text from the last `.` of the segment, provided that
/// dot is neither its first nor its last character. Directory-style paths
/// (`/`, `/shop/`, `/about`) have the empty extension.
pub fn path_extension(url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match name.rfind('.') {
        Some(i) if i > 0 && i < name.len() - 1 => name[i..].to_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://a.pt/dir/page.html").unwrap()
    }

    #[test]
    fn test_absolute_reference_kept() {
        let url = resolve_reference("https://b.pt/x.html", Some(&origin())).unwrap();
        assert_eq!(url.as_str(), "https://b.pt/x.html");
    }

    #[test]
    fn test_root_relative_reference() {
        let url = resolve_reference("/b.html", Some(&origin())).unwrap();
        assert_eq!(url.as_str(), "http://a.pt/b.html");
    }

    #[test]
    fn test_path_relative_reference() {
        let url = resolve_reference("other.html", Some(&origin())).unwrap();
        assert_eq!(url.as_str(), "http://a.pt/dir/other.html");
    }

    #[test]
    fn test_scheme_relative_reference() {
        let url = resolve_reference("//c.pt/", Some(&origin())).unwrap();
        assert_eq!(url.as_str(), "http://c.pt/");
    }

    #[test]
    fn test_fragment_removed() {
        let url = resolve_reference("/b.html#section", Some(&origin())).unwrap();
        assert_eq!(url.as_str(), "http://a.pt/b.html");
    }

    #[test]
    fn test_relative_without_origin_fails() {
        assert!(matches!(
            resolve_reference("/b.html", None),
            Err(UrlError::Parse(_))
        ));
    }

    #[test]
    fn test_special_schemes_rejected() {
        for href in ["mailto:a@a.pt", "javascript:void(0)", "tel:+351", "ftp://a.pt/"] {
            assert!(
                matches!(
                    resolve_reference(href, Some(&origin())),
                    Err(UrlError::InvalidScheme(_))
                ),
                "{} should be rejected",
                href
            );
        }
    }

    #[test]
    fn test_empty_reference_rejected() {
        assert!(resolve_reference("   ", Some(&origin())).is_err());
    }

    #[test]
    fn test_path_extension() {
        let ext = |s: &str| path_extension(&Url::parse(s).unwrap());

        assert_eq!(ext("http://a.pt/"), "");
        assert_eq!(ext("http://a.pt/shop/"), "");
        assert_eq!(ext("http://a.pt/about"), "");
        assert_eq!(ext("http://a.pt/cart.html"), ".html");
        assert_eq!(ext("http://a.pt/CART.HTML"), ".html");
        assert_eq!(ext("http://a.pt/file.tar.gz"), ".gz");
        assert_eq!(ext("http://a.pt/image.png?x=1"), ".png");
        assert_eq!(ext("http://a.pt/.hidden"), "");
        assert_eq!(ext("http://a.pt/trailing."), "");
    }
}
