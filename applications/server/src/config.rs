/// Server configuration, read from the process environment.
use std::path::PathBuf;

/// `itunes:explicit` channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Explicit {
    Yes,
    #[default]
    No,
    Clean,
}

impl Explicit {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "yes" => Self::Yes,
            "clean" => Self::Clean,
            _ => Self::No,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Clean => "clean",
        }
    }
}

/// Channel-level feed metadata, consumed only by the feed renderer.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub title: String,
    pub description: String,
    pub language: String,
    pub copyright: Option<String>,
    pub author: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub explicit: Explicit,
    pub category: Option<String>,
    /// `episodic` or `serial`.
    pub feed_type: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Persistent state root: the three JSON documents, extracted covers,
    /// transcode outputs, and the API key file.
    pub data_dir: PathBuf,
    pub port: u16,
    pub channel: ChannelConfig,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let data_dir = env_opt("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("shelfcast-transcodes"));
        let port = env_opt("PORT").and_then(|p| p.parse().ok()).unwrap_or(80);

        let channel = ChannelConfig {
            title: env_opt("POD_TITLE").unwrap_or_else(|| "Audiobooks".to_string()),
            description: env_opt("POD_DESCRIPTION")
                .unwrap_or_else(|| "Audiobooks served from the local shelf".to_string()),
            language: env_opt("POD_LANGUAGE").unwrap_or_else(|| "en".to_string()),
            copyright: env_opt("POD_COPYRIGHT"),
            author: env_opt("POD_AUTHOR"),
            owner_name: env_opt("POD_OWNER_NAME"),
            owner_email: env_opt("POD_OWNER_EMAIL"),
            explicit: env_opt("POD_EXPLICIT")
                .map(|v| Explicit::parse(&v))
                .unwrap_or_default(),
            category: env_opt("POD_CATEGORY"),
            feed_type: env_opt("POD_TYPE")
                .filter(|t| t == "episodic" || t == "serial")
                .unwrap_or_else(|| "episodic".to_string()),
            image_url: env_opt("POD_IMAGE_URL"),
        };

        Self {
            data_dir,
            port,
            channel,
        }
    }
}
