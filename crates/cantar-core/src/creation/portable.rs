//! Windows portability checks for entry names.

use crate::error::{ArchiveError, Result};

/// Characters Windows forbids in file names.
const ILLEGAL_CHARS: &[char] = &['"', '*', ':', '<', '>', '?', '\\', '|'];

/// Device names Windows reserves, with or without an extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Verifies every component of `path` can exist on a Windows filesystem.
///
/// # Errors
///
/// [`ArchiveError::PortabilityError`] naming the first offending
/// component.
pub(crate) fn check_portable(path: &str) -> Result<()> {
    for component in path.split('/') {
        if component.is_empty() || component == "." {
            continue;
        }
        check_component(path, component)?;
    }
    Ok(())
}

fn check_component(path: &str, component: &str) -> Result<()> {
    for ch in component.chars() {
        if (ch as u32) < 0x20 {
            return Err(portability(path, component, "control character"));
        }
        if ILLEGAL_CHARS.contains(&ch) {
            return Err(portability(
                path,
                component,
                &format!("illegal character {ch:?}"),
            ));
        }
    }

    let stem = component.split('.').next().unwrap_or(component);
    if RESERVED_NAMES
        .iter()
        .any(|name| stem.eq_ignore_ascii_case(name))
    {
        return Err(portability(path, component, "reserved device name"));
    }

    Ok(())
}

fn portability(path: &str, component: &str, reason: &str) -> ArchiveError {
    ArchiveError::PortabilityError {
        path: path.to_string(),
        component: component.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_names_pass() {
        assert!(check_portable("src/main.rs").is_ok());
        assert!(check_portable("weird but ok/~$name.txt").is_ok());
        assert!(check_portable(".").is_ok());
    }

    #[test]
    fn illegal_characters_fail() {
        for bad in ["a:b", "que?", "star*", "pipe|", "back\\slash", "lt<gt>"] {
            assert!(check_portable(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn control_characters_fail() {
        assert!(check_portable("bell\u{7}").is_err());
        assert!(check_portable("tab\tname").is_err());
    }

    #[test]
    fn reserved_names_fail_case_insensitively_with_extensions() {
        for bad in ["CON", "con", "Con.txt", "dir/NUL", "COM7.log", "lpt9"] {
            assert!(check_portable(bad).is_err(), "{bad} should fail");
        }
        // Similar but not reserved.
        for ok in ["CONSOLE", "COM10", "LPT0", "NULL.txt", "common"] {
            assert!(check_portable(ok).is_ok(), "{ok} should pass");
        }
    }
}
