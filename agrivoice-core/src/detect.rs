use crate::types::{IncomingMessage, MessageKind, Role};

const UPLOAD_TOKEN: &str = "upload";
const SUBJECT_TOKENS: [&str; 2] = ["image", "leaf"];

/// True when `text` asks the user for a picture: "upload" together with
/// "image" or "leaf", in any case. Plain substring match: "uploading" counts,
/// "leaves" does not.
pub fn requests_image_upload(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains(UPLOAD_TOKEN) && SUBJECT_TOKENS.iter().any(|t| lower.contains(t))
}

/// Only finished assistant turns are inspected; live transcripts would fire
/// on half-spoken sentences.
pub fn is_upload_request(msg: &IncomingMessage) -> bool {
    msg.role == Role::Assistant
        && msg.kind == MessageKind::Message
        && !msg.text.trim().is_empty()
        && requests_image_upload(&msg.text)
}
