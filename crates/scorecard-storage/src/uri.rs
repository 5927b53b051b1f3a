//! `gs://` URIs and public object URLs.

use std::fmt;
use std::str::FromStr;

use crate::error::{StorageError, StorageResult};

const GS_SCHEME: &str = "gs://";
const PUBLIC_HOST: &str = "https://storage.googleapis.com/";

/// Location of an object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GcsUri {
    pub bucket: String,
    pub object: String,
}

impl GcsUri {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Parse `gs://bucket/object` or `https://storage.googleapis.com/bucket/object`.
    pub fn parse(s: &str) -> StorageResult<Self> {
        let s = s.trim();
        let rest = s
            .strip_prefix(GS_SCHEME)
            .or_else(|| s.strip_prefix(PUBLIC_HOST))
            .ok_or_else(|| StorageError::invalid_uri(s))?;

        let (bucket, object) = rest
            .split_once('/')
            .ok_or_else(|| StorageError::invalid_uri(s))?;

        if bucket.is_empty() || object.is_empty() {
            return Err(StorageError::invalid_uri(s));
        }

        let object = urlencoding::decode(object)
            .map(|o| o.into_owned())
            .unwrap_or_else(|_| object.to_string());

        Ok(Self::new(bucket, object))
    }

    /// True when `s` looks like something [`GcsUri::parse`] accepts.
    pub fn is_uri(s: &str) -> bool {
        s.starts_with(GS_SCHEME) || s.starts_with(PUBLIC_HOST)
    }

    /// The public HTTPS address of the object.
    pub fn public_url(&self) -> String {
        let object = self
            .object
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{}/{}", PUBLIC_HOST, self.bucket, object)
    }

    /// Final path segment of the object name.
    pub fn file_name(&self) -> &str {
        self.object.rsplit('/').next().unwrap_or(&self.object)
    }
}

impl fmt::Display for GcsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", GS_SCHEME, self.bucket, self.object)
    }
}

impl FromStr for GcsUri {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
