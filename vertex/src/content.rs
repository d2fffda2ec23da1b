//! Conversation content in the Gemini wire format.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::schema::{FunctionCall, FunctionResponse};

/// Fallback MIME type when none can be inferred.
const OCTET_STREAM: &str = "application/octet-stream";

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Raw bytes sent inline, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// A reference to a file the service fetches itself (`gs://` or `https://`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

/// One piece of a content turn.
///
/// Each variant serializes to a single-key object (`{"text": ...}`,
/// `{"fileData": {...}}`, ...). Unknown sibling keys in responses are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: Blob,
    },
    #[serde(rename_all = "camelCase")]
    FileData {
        file_data: FileData,
    },
    #[serde(rename_all = "camelCase")]
    FunctionCall {
        function_call: FunctionCall,
    },
    #[serde(rename_all = "camelCase")]
    FunctionResponse {
        function_response: FunctionResponse,
    },
}

impl Part {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Inline bytes with an explicit MIME type.
    pub fn inline_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: STANDARD.encode(bytes),
            },
        }
    }

    /// A file reference whose MIME type is inferred from the URI extension.
    pub fn file_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let mime_type = mime_type_for_uri(&uri);
        Self::file_data(mime_type, uri)
    }

    /// A file reference with an explicit MIME type.
    pub fn file_data(mime_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::FileData {
            file_data: FileData {
                mime_type: mime_type.into(),
                file_uri: uri.into(),
            },
        }
    }

    /// The text of a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// The call carried by a function-call part.
    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::FunctionCall { function_call } => Some(function_call),
            _ => None,
        }
    }
}

impl From<FunctionCall> for Part {
    fn from(function_call: FunctionCall) -> Self {
        Self::FunctionCall { function_call }
    }
}

impl From<FunctionResponse> for Part {
    fn from(function_response: FunctionResponse) -> Self {
        Self::FunctionResponse { function_response }
    }
}

/// Infer a MIME type from the path component of a URI.
pub fn mime_type_for_uri(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// A single conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Absent for system instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn.
    pub fn user(parts: impl IntoIterator<Item = Part>) -> Self {
        Self {
            role: Some(Role::User),
            parts: parts.into_iter().collect(),
        }
    }

    /// A model turn.
    pub fn model(parts: impl IntoIterator<Item = Part>) -> Self {
        Self {
            role: Some(Role::Model),
            parts: parts.into_iter().collect(),
        }
    }

    /// A system instruction.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }
}
