use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Post,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Bearer tokens end up in logs otherwise.
        let headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let v = if k.eq_ignore_ascii_case("authorization") {
                    "[REDACTED]".into()
                } else {
                    v.clone()
                };
                (k.clone(), v)
            })
            .collect();

        let body = match &self.body {
            Body::Empty => "Empty".to_string(),
            Body::MultipartFormData { boundary, bytes } => {
                format!("MultipartFormData(boundary={boundary}, bytes_len={})", bytes.len())
            }
        };

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &body)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    Empty,
    MultipartFormData { boundary: String, bytes: Vec<u8> },
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: Method::Post,
            url: "https://example.com".into(),
            headers: vec![("Accept".into(), "application/json".into())],
            body: Body::Empty,
        };
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn debug_hides_bearer_token() {
        let req = HttpRequest {
            method: Method::Post,
            url: "https://example.com/api/ai/disease-detection".into(),
            headers: vec![
                ("Authorization".into(), "Bearer jwt-abc".into()),
                ("Accept".into(), "application/json".into()),
            ],
            body: Body::MultipartFormData {
                boundary: "b".into(),
                bytes: vec![0; 4],
            },
        };

        let s = format!("{req:?}");
        assert!(!s.contains("jwt-abc"));
        assert!(s.contains("[REDACTED]"));
        assert!(s.contains("bytes_len=4"));
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("https://api.example.com/api/", "/ai/disease-detection"),
            "https://api.example.com/api/ai/disease-detection"
        );
        assert_eq!(
            join_url("https://api.example.com/api", "ai/disease-detection"),
            "https://api.example.com/api/ai/disease-detection"
        );
    }
}
