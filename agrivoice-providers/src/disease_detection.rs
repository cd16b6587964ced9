use crate::request::{Body, HttpRequest, Method, join_url};
use agrivoice_core::BearerToken;

pub const DISEASE_DETECTION_PATH: &str = "/ai/disease-detection";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseDetectionConfig {
    pub api_base_url: String,
    pub token: BearerToken,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

pub fn build_disease_detection_request(
    cfg: &DiseaseDetectionConfig,
    image: &ImageFile,
) -> HttpRequest {
    let boundary = format!("Boundary-{}", uuid::Uuid::new_v4());

    let mut body: Vec<u8> = Vec::with_capacity(image.bytes.len() + 256);
    append_file(
        &mut body,
        &boundary,
        "file",
        &image.filename,
        &image.mime_type,
        &image.bytes,
    );
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    HttpRequest {
        method: Method::Post,
        url: join_url(&cfg.api_base_url, DISEASE_DETECTION_PATH),
        headers: vec![
            (
                "Content-Type".into(),
                format!("multipart/form-data; boundary={boundary}"),
            ),
            ("Accept".into(), "application/json".into()),
            ("Authorization".into(), cfg.token.authorization_value()),
        ],
        body: Body::MultipartFormData {
            boundary,
            bytes: body,
        },
    }
}

fn append_file(
    body: &mut Vec<u8>,
    boundary: &str,
    name: &str,
    filename: &str,
    mime_type: &str,
    bytes: &[u8],
) {
    // Quotes would terminate the disposition parameter early.
    let filename = filename.replace('"', "_");
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> ImageFile {
        ImageFile {
            filename: "leaf.jpg".into(),
            mime_type: "image/jpeg".into(),
            bytes: vec![0xff, 0xd8, 0xff, 0xe0],
        }
    }

    #[test]
    fn builds_authorized_multipart_post() {
        let cfg = DiseaseDetectionConfig {
            api_base_url: "https://farm.example.com/api/".into(),
            token: BearerToken::new("jwt"),
        };
        let req = build_disease_detection_request(&cfg, &leaf());

        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "https://farm.example.com/api/ai/disease-detection");
        assert_eq!(req.header("authorization"), Some("Bearer jwt"));

        let ct = req.header("content-type").unwrap();
        assert!(ct.starts_with("multipart/form-data; boundary=Boundary-"));

        match &req.body {
            Body::MultipartFormData { boundary, bytes } => {
                assert!(ct.ends_with(boundary.as_str()));
                let s = String::from_utf8_lossy(&bytes);
                assert!(s.contains("name=\"file\"; filename=\"leaf.jpg\""));
                assert!(s.contains("Content-Type: image/jpeg"));
                assert!(s.ends_with(&format!("--{boundary}--\r\n")));
            }
            _ => panic!("expected multipart"),
        }
    }

    #[test]
    fn quotes_in_filename_are_neutralized() {
        let cfg = DiseaseDetectionConfig {
            api_base_url: "http://localhost".into(),
            token: BearerToken::new("t"),
        };
        let mut img = leaf();
        img.filename = "a\"b.png".into();
        let req = build_disease_detection_request(&cfg, &img);
        let Body::MultipartFormData { bytes, .. } = req.body else {
            panic!("expected multipart");
        };
        assert!(String::from_utf8_lossy(&bytes).contains("filename=\"a_b.png\""));
    }
}
