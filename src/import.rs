use serde_json::Value;

use crate::post::Post;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("payload is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("payload is neither a list of posts nor an object with a `posts` list")]
    UnrecognizedShape,
    #[error("record {index} is not a JSON object")]
    InvalidRecord { index: usize },
}

/// Accepted payload shapes, tried in order.
#[derive(Debug)]
enum Payload {
    Bare(Vec<Value>),
    Enveloped(Vec<Value>),
}

impl Payload {
    fn classify(root: Value) -> Result<Self, ImportError> {
        match root {
            Value::Array(items) => Ok(Payload::Bare(items)),
            Value::Object(mut map) => {
                if let Some(Value::Array(items)) = map.remove("posts") {
                    return Ok(Payload::Enveloped(items));
                }
                // Saved-session response: { "session_id": .., "data": { "posts": [..] } }
                match map.remove("data") {
                    Some(Value::Object(mut data)) => match data.remove("posts") {
                        Some(Value::Array(items)) => Ok(Payload::Enveloped(items)),
                        _ => Err(ImportError::UnrecognizedShape),
                    },
                    _ => Err(ImportError::UnrecognizedShape),
                }
            }
            _ => Err(ImportError::UnrecognizedShape),
        }
    }

    fn into_records(self) -> Vec<Value> {
        match self {
            Payload::Bare(items) | Payload::Enveloped(items) => items,
        }
    }
}

pub fn decode_payload(bytes: &[u8]) -> Result<Vec<Post>, ImportError> {
    let root: Value = serde_json::from_slice(bytes)?;
    decode_value(root)
}

pub fn decode_value(root: Value) -> Result<Vec<Post>, ImportError> {
    let payload = Payload::classify(root)?;
    let shape = match payload {
        Payload::Bare(_) => "bare",
        Payload::Enveloped(_) => "enveloped",
    };
    let posts = payload
        .into_records()
        .iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .as_object()
                .map(|map| Post::from_object(index, map))
                .ok_or(ImportError::InvalidRecord { index })
        })
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(shape, count = posts.len(), "decoded post payload");
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_collection() {
        let posts = decode_payload(br#"[{"post_number": 1, "content": "a"}]"#).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "a");
    }

    #[test]
    fn accepts_enveloped_collection() {
        let raw = br#"{"session_id": "x", "total_posts": 2,
            "posts": [{"post_number": 1, "content": "a"}, {"post_number": 2, "content": "b"}]}"#;
        let posts = decode_payload(raw).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].sequence_number, 2);
    }

    #[test]
    fn accepts_saved_session_response() {
        let raw = br#"{"session_id": "x", "data": {"posts": [{"content": "a"}]}}"#;
        let posts = decode_payload(raw).unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[test]
    fn rejects_invalid_json() {
        let err = decode_payload(b"{not json").unwrap_err();
        assert!(matches!(err, ImportError::Syntax(_)));
    }

    #[test]
    fn rejects_unknown_shape() {
        let err = decode_payload(br#"{"items": []}"#).unwrap_err();
        assert!(matches!(err, ImportError::UnrecognizedShape));
        let err = decode_payload(b"42").unwrap_err();
        assert!(matches!(err, ImportError::UnrecognizedShape));
    }

    #[test]
    fn rejects_non_object_records() {
        let err = decode_payload(br#"[{"content": "a"}, "oops"]"#).unwrap_err();
        assert!(matches!(err, ImportError::InvalidRecord { index: 1 }));
    }

    #[test]
    fn positions_fill_missing_sequence_numbers() {
        let posts = decode_payload(br#"[{"content": "a"}, {"content": "b"}]"#).unwrap();
        assert_eq!(posts[0].sequence_number, 1);
        assert_eq!(posts[1].sequence_number, 2);
    }
}
