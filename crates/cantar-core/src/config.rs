//! Option types for the public operations.

/// Whether the extractor materializes symlinks as copies of their targets.
///
/// Copying sidesteps hosts where symlink creation is unavailable (Windows
/// without the right privilege) while keeping the extracted tree usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopySymlinks {
    /// Create real symlinks; fail if the host cannot.
    Never,
    /// Copy link targets instead of creating symlinks.
    Always,
    /// Probe the target directory once and pick whichever works.
    #[default]
    Auto,
}

/// Options for [`crate::extract_archive`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Symlink materialization strategy.
    pub copy_symlinks: CopySymlinks,
    /// Re-apply archive permission bits to extracted files.
    ///
    /// Off by default: files are created with the host umask. When on, the
    /// archive's owner-executable bit is reproduced even under a
    /// restrictive umask.
    pub set_permissions: bool,
}

impl ExtractOptions {
    /// Returns the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the symlink materialization strategy.
    #[must_use]
    pub fn with_copy_symlinks(mut self, mode: CopySymlinks) -> Self {
        self.copy_symlinks = mode;
        self
    }

    /// Enables or disables permission re-application.
    #[must_use]
    pub fn with_set_permissions(mut self, on: bool) -> Self {
        self.set_permissions = on;
        self
    }
}

/// Options for [`crate::create_archive`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Reject entry names that cannot exist on Windows.
    pub portable: bool,
}

impl CreateOptions {
    /// Returns the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the Windows portability check.
    #[must_use]
    pub fn with_portable(mut self, on: bool) -> Self {
        self.portable = on;
        self
    }
}

/// Options for [`crate::list_archive`].
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Yield extension headers (`x`, `g`, GNU `L`/`K`) as entries instead
    /// of coalescing them into the following standard header.
    pub raw: bool,
    /// Fail on structurally invalid or unsupported entries instead of
    /// listing them anyway.
    pub strict: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            raw: false,
            strict: true,
        }
    }
}

impl ListOptions {
    /// Returns the default options (coalescing, strict).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables raw-header listing.
    #[must_use]
    pub fn with_raw(mut self, on: bool) -> Self {
        self.raw = on;
        self
    }

    /// Enables or disables strict validation.
    #[must_use]
    pub fn with_strict(mut self, on: bool) -> Self {
        self.strict = on;
        self
    }
}

/// Options for [`crate::rewrite_archive`].
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// Reject entry names that cannot exist on Windows.
    pub portable: bool,
}

impl RewriteOptions {
    /// Returns the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the Windows portability check.
    #[must_use]
    pub fn with_portable(mut self, on: bool) -> Self {
        self.portable = on;
        self
    }
}
