//! Core data models for downloadable assets
//!
//! An asset descriptor identifies one downloadable content bundle as published
//! in the manifest: a stable id, the fetch path, the expected byte count, and
//! the published digest. Content types are derived from the path's extension
//! family purely so downstream consumers retrieve blobs with the right
//! semantics; they carry no behavioral weight inside this subsystem.

use serde::{Deserialize, Serialize};

use crate::app::hash::ExpectedDigest;

/// One downloadable unit as enumerated by the content manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Stable identifier, unique within the manifest and the queue
    pub id: String,
    /// Asset category as published by the manifest (e.g. "text", "audio", "index")
    #[serde(rename = "type")]
    pub kind: String,
    /// Fetch path, relative to the configured base URL; also the cache key
    pub path: String,
    /// Published size in bytes, used for capacity accounting
    pub bytes: u64,
    /// Expected content digest, or the unverified sentinel
    pub digest: ExpectedDigest,
}

impl AssetDescriptor {
    /// Create a descriptor (primarily for tests and embedding callers)
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        path: impl Into<String>,
        bytes: u64,
        digest: ExpectedDigest,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            path: path.into(),
            bytes,
            digest,
        }
    }

    /// Content type for this asset's cached bytes
    pub fn content_type(&self) -> ContentType {
        ContentType::from_path(&self.path)
    }
}

/// Extension family of a cached blob
///
/// Mirrors the manifest's published payload formats: structured data ships as
/// JSON, audio as MP3, artwork as SVG, everything else is opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Structured data payloads (.json)
    Json,
    /// Audio payloads (.mp3)
    Audio,
    /// Vector image payloads (.svg)
    Svg,
    /// Anything else
    Binary,
}

impl ContentType {
    /// Derive the content type from a path's extension
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".json") {
            ContentType::Json
        } else if path.ends_with(".mp3") {
            ContentType::Audio
        } else if path.ends_with(".svg") {
            ContentType::Svg
        } else {
            ContentType::Binary
        }
    }

    /// MIME type string for downstream consumers
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Audio => "audio/mpeg",
            ContentType::Svg => "image/svg+xml",
            ContentType::Binary => "application/octet-stream",
        }
    }
}
