//! Configuration options for resultstore.

/// How a table's backing files are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Appends, finalize and reads are allowed.
    #[default]
    ReadWrite,

    /// Only reads and searches are allowed; appends fail with
    /// [`Error::ReadOnly`](crate::Error::ReadOnly).
    ReadOnly,
}

/// Configuration options for opening a database or a single table.
#[derive(Debug, Clone)]
pub struct Options {
    /// Access mode for the backing files.
    /// Default: ReadWrite
    pub access_mode: AccessMode,

    /// Create the root directory and table files if they don't exist.
    /// Default: true
    pub create_if_missing: bool,

    /// Error if a table file already exists when opening read-write.
    /// Default: false
    pub error_if_exists: bool,

    /// fsync the table file after every domain batch.
    /// Default: true
    pub sync_on_write: bool,

    /// Maximum number of contiguous rows fetched by a single read when
    /// reading by offsets.
    /// Default: 4096
    pub read_coalesce_rows: usize,

    /// Maximum number of decoded secondary-index blocks kept in memory.
    /// Set to 0 to disable caching.
    /// Default: 1024
    pub block_cache_entries: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            access_mode: AccessMode::ReadWrite,
            create_if_missing: true,
            error_if_exists: false,
            sync_on_write: true,
            read_coalesce_rows: 4096,
            block_cache_entries: 1024,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates read-only options.
    pub fn read_only() -> Self {
        Self { access_mode: AccessMode::ReadOnly, create_if_missing: false, ..Self::default() }
    }

    /// Sets the access mode.
    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = mode;
        self
    }

    /// Sets whether to create missing files.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether an existing table is an error.
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Enables or disables fsync after every batch.
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the maximum rows per coalesced read.
    pub fn read_coalesce_rows(mut self, rows: usize) -> Self {
        self.read_coalesce_rows = rows;
        self
    }

    /// Sets the decoded block cache size.
    pub fn block_cache_entries(mut self, entries: usize) -> Self {
        self.block_cache_entries = entries;
        self
    }

    /// Returns true if the options only allow reads.
    pub fn is_read_only(&self) -> bool {
        self.access_mode == AccessMode::ReadOnly
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.read_coalesce_rows == 0 {
            return Err(crate::Error::invalid_argument("read_coalesce_rows must be > 0"));
        }
        if self.is_read_only() && self.create_if_missing {
            return Err(crate::Error::invalid_argument(
                "create_if_missing cannot be combined with read-only access",
            ));
        }
        if self.is_read_only() && self.error_if_exists {
            return Err(crate::Error::invalid_argument(
                "error_if_exists cannot be combined with read-only access",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.access_mode, AccessMode::ReadWrite);
        assert!(opts.create_if_missing);
        assert!(!opts.error_if_exists);
        assert!(opts.sync_on_write);
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new().sync_on_write(false).read_coalesce_rows(128).block_cache_entries(0);

        assert!(!opts.sync_on_write);
        assert_eq!(opts.read_coalesce_rows, 128);
        assert_eq!(opts.block_cache_entries, 0);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        assert!(opts.validate().is_ok());

        opts.read_coalesce_rows = 0;
        assert!(opts.validate().is_err());

        assert!(Options::read_only().validate().is_ok());
        assert!(Options::read_only().create_if_missing(true).validate().is_err());
    }
}
