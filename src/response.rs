//! Response values produced by the request pipeline.

/// Encoded image ready to be written to the cache and sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl ImageResponse {
    pub fn ok(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            body,
        }
    }
}

/// Redirect to a cached variant that already exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub status: u16,
}

impl Redirect {
    /// 301, so browsers remember the corrected URL.
    pub fn permanent(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: 301,
        }
    }
}
