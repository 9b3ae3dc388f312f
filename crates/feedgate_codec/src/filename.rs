//! Filename sanitizing for legacy filesystems.

use crate::option::ContentOption;

/// Default maximum length of a sanitized filename.
pub const MAX_FILE_NAME_LEN: usize = 15;

/// Raster extensions that get rewritten to `.jpg`, since every image
/// response is transcoded to JPEG downstream.
const NON_JPEG_EXTENSIONS: [&str; 6] = [".png", ".webp", ".gif", ".bmp", ".tiff", ".heic"];

const DEFAULT_FILE_NAME: &str = "file.bin";

/// Squeezes a URL path into a filename old clients and XML parsers accept.
///
/// Takes the final path segment (`file.bin` when the path has none). For
/// image targets, a missing or non-JPEG raster extension becomes `.jpg` so
/// the advertised name matches the transcoded payload. Characters outside
/// `[A-Za-z0-9.-]` become `_`. Over-long names keep their **last**
/// `max_len` characters; the extension matters more to a legacy client
/// than the name.
#[must_use]
pub fn sanitize_file_name(raw_path: &str, option: ContentOption, max_len: usize) -> String {
    let mut file_name = raw_path
        .split('/')
        .filter(|s| !s.is_empty())
        .next_back()
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();

    if option == ContentOption::Image {
        let (stem, extension) = match file_name.rfind('.') {
            Some(dot) => (
                file_name[..dot].to_string(),
                file_name[dot..].to_ascii_lowercase(),
            ),
            None => (file_name.clone(), String::new()),
        };
        if extension.is_empty() || NON_JPEG_EXTENSIONS.contains(&extension.as_str()) {
            file_name = format!("{stem}.jpg");
        }
    }

    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.len() > max_len {
        sanitized[sanitized.len() - max_len..].to_string()
    } else {
        sanitized
    }
}
