//! Folder name validation.

/// Maximum folder name length in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Check whether `candidate` collides with a sibling name.
///
/// Comparison is case-insensitive and only against the given siblings, never
/// the whole tree. `exclude` skips one sibling position, which is how a node
/// being renamed is compared against everyone but itself.
pub fn is_duplicate<'a, I>(candidate: &str, siblings: I, exclude: Option<usize>) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate = candidate.to_lowercase();
    siblings
        .into_iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != exclude)
        .any(|(_, name)| name.to_lowercase() == candidate)
}

/// Validate a folder name.
pub fn validate_folder_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty".into());
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Name is too long (max {MAX_NAME_LEN} characters)"));
    }

    for c in ['/', '\0'] {
        if name.contains(c) {
            return Err(format!("Name cannot contain {c:?}"));
        }
    }

    if name.starts_with(char::is_whitespace) || name.ends_with(char::is_whitespace) {
        return Err("Name cannot start or end with spaces".into());
    }

    if name == "." || name == ".." {
        return Err("'.' and '..' are reserved names".into());
    }

    Ok(())
}
