//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn url() -> Option<String> {
        None
    }

    pub fn author() -> String {
        "<YOUR_NAME>".into()
    }

    pub fn language() -> String {
        "en".into()
    }

    pub fn locale() -> String {
        "en_US".into()
    }

    pub fn timezone() -> String {
        "UTC".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::{collections::BTreeMap, path::PathBuf};

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn source() -> PathBuf {
        ".".into()
    }

    pub fn output() -> PathBuf {
        "_build".into()
    }

    pub fn templates() -> PathBuf {
        "_templates".into()
    }

    pub fn static_folder() -> PathBuf {
        "static".into()
    }

    pub fn modules() -> Vec<String> {
        ["blog", "highlight", "tags"].map(String::from).to_vec()
    }

    pub fn ignore() -> Vec<String> {
        ["*.pyc", "*~", "*.swp"].map(String::from).to_vec()
    }

    pub fn programs() -> BTreeMap<String, String> {
        [("rst", "rst"), ("md", "markdown"), ("markdown", "markdown")]
            .into_iter()
            .map(|(ext, program)| (ext.to_owned(), program.to_owned()))
            .collect()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5000
    }
}
