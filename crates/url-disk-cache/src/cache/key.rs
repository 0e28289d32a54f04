//! # Cache keys and on-disk paths
//!
//! A key is the lowercase hex MD5 of the URL's serialized form. It alone
//! decides lookups. The host and path fragments embedded in the relative
//! path only make the tree browsable:
//!
//! ```text
//! <sanitized host>/<first hex digit of key>/<key>.<sanitized path and query>
//! ```
//!
//! Anything reading the tree must split file names on the first `.` to
//! recover the key.

use std::path::PathBuf;

use md5::{Digest, Md5};
use url::Url;

/// Longest suffix kept after `<key>.`, so a file name stays within the
/// usual 255 byte limit.
pub const MAX_SUFFIX_LEN: usize = 200;

/// Stable key for a URL
pub fn derive_key(url: &Url) -> String {
    hex::encode(Md5::digest(url.as_str().as_bytes()))
}

/// Path of a URL's content relative to the cache root
pub fn derive_path(url: &Url) -> PathBuf {
    relative_path(url, &derive_key(url))
}

pub(crate) fn relative_path(url: &Url, key: &str) -> PathBuf {
    let mut path = PathBuf::new();
    if let Some(host) = url.host_str().filter(|host| !host.is_empty()) {
        path.push(sanitize(host));
    }
    path.push(&key[..1]);
    path.push(format!("{key}.{}", path_suffix(url)));
    path
}

/// Split a cache file name into key and suffix
pub fn split_file_name(name: &str) -> Option<(&str, &str)> {
    name.split_once('.')
}

fn path_suffix(url: &Url) -> String {
    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut suffix = match url.query() {
        Some(query) => sanitize(&format!("{path}__{query}")),
        None => sanitize(path),
    };
    suffix.truncate(MAX_SUFFIX_LEN);
    suffix
}

/// Replace every character that is not ASCII alphanumeric with `_`
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
