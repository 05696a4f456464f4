//! Destination naming for preserved files.

/// Characters never allowed in a preserved file name
const ILLEGAL_CHARACTERS: &[char] = &['/', '*', ':', '<', '>', '?', '%', '|'];

/// Replace illegal characters in a suggested name with underscores
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_CHARACTERS.contains(&c) { '_' } else { c })
        .collect()
}

/// Infer a file extension from the transfer's declared filename,
/// falling back to a generic binary extension
pub fn infer_extension(suggested_filename: Option<&str>) -> &str {
    suggested_filename
        .and_then(|name| name.rsplit('.').next())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin")
}

/// Compute the final relative file name for a preserved resource.
///
/// Returns `None` when the sanitized name comes out empty, which means
/// no destination can be derived.
pub fn destination_name(display_name: &str, suggested_filename: Option<&str>) -> Option<String> {
    let stem = sanitize_file_name(display_name);
    if stem.trim_matches('_').trim().is_empty() {
        return None;
    }

    Some(format!("{}.{}", stem, infer_extension(suggested_filename)))
}
