use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Presentation order of the album list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlbumSortOrder {
    /// Newest month first (load order).
    #[default]
    DateDesc,
    DateAsc,
    /// Most photos first.
    SizeDesc,
    SizeAsc,
    /// Most undecided photos first.
    UnfinishedDesc,
    UnfinishedAsc,
}

impl AlbumSortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumSortOrder::DateDesc => "date-desc",
            AlbumSortOrder::DateAsc => "date-asc",
            AlbumSortOrder::SizeDesc => "size-desc",
            AlbumSortOrder::SizeAsc => "size-asc",
            AlbumSortOrder::UnfinishedDesc => "unfinished-desc",
            AlbumSortOrder::UnfinishedAsc => "unfinished-asc",
        }
    }

    /// Parse a value stored in preferences.
    pub fn from_stored(s: &str) -> Option<Self> {
        <Self as clap::ValueEnum>::from_str(s, true).ok()
    }
}
