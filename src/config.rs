/// Knobs shared by table creation and edit sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefix prepended to the file name of the working copy made by an edit session.
    pub clone_prefix: String,
    /// Write a trailing `0x1A` after the last record.
    pub write_eof_marker: bool,
    /// `fsync` the working copy before it replaces the original.
    pub sync_on_save: bool,
    /// Block size for newly created dBase IV / FoxPro memo files.
    /// dBase III memo files always use 512-byte blocks.
    pub memo_block_size: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            clone_prefix: "~".to_string(),
            write_eof_marker: true,
            sync_on_save: true,
            memo_block_size: None,
        }
    }
}

impl Config {
    pub fn with_clone_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.clone_prefix = prefix.into();
        self
    }

    pub fn with_memo_block_size(mut self, block_size: u16) -> Self {
        self.memo_block_size = Some(block_size);
        self
    }

    pub fn without_sync(mut self) -> Self {
        self.sync_on_save = false;
        self
    }
}
