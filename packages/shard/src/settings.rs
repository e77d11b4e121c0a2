
use gump::ManagerConfig;
use std::{
    path::Path,
    fs::File,
    io::{
        BufReader,
        BufWriter,
    },
};
use serde::{Serialize, Deserialize};
use anyhow::*;


pub const SETTINGS_FILE_NAME: &'static str = "shard.json";


/// Shard settings, read from a JSON file at startup. Missing fields take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub manager: ManagerConfig,
    /// Give dialogs randomized entry ids so client-side scripts can't hard-code them.
    pub macro_protection: bool,
    /// Log the text layout of every dialog opened.
    pub log_layouts: bool,
    pub board_title: String,
    /// Oldest posts are dropped from the board beyond this many.
    pub max_posts: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            manager: ManagerConfig::default(),
            macro_protection: true,
            log_layouts: false,
            board_title: "Town Crier".to_owned(),
            max_posts: 10,
        }
    }
}

impl Settings {
    pub fn read(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::try_read(path)
            .map_err(|e| {
                debug!(%e, ?path, "using default settings");
            })
            .unwrap_or_default()
    }

    pub fn try_read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }
}


#[test]
fn test_partial_settings_take_defaults() {
    let settings: Settings = serde_json::from_str(r#"{
        "log_layouts": true,
        "manager": { "close_replaced": false }
    }"#).unwrap();
    assert!(settings.log_layouts);
    assert!(settings.macro_protection);
    assert!(!settings.manager.close_replaced);
    assert!(settings.manager.resend_shared_after_reply);
    assert_eq!(settings.max_posts, 10);
}

#[test]
fn test_settings_file_round_trip() {
    let path = std::env::temp_dir().join(format!("shard-settings-{}.json", std::process::id()));
    let settings = Settings {
        board_title: "Britain Bank".into(),
        max_posts: 3,
        ..Default::default()
    };
    settings.write(&path).unwrap();
    assert_eq!(Settings::try_read(&path).unwrap(), settings);
    std::fs::remove_file(&path).unwrap();
    assert!(Settings::try_read(&path).is_err());
    assert_eq!(Settings::read(&path), Settings::default());
}
