use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ScreenDimensions;

/// Everything a run needs. Loaded once and not changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub max_tokens: u32,
    pub target_width: u32,
    pub target_height: u32,
    pub dump_dir: PathBuf,
    pub dump_prefix: String,
    pub dump_start: u32,
    pub keep_last_screenshots: usize,
    pub keep_last_reasoning: usize,
    pub max_steps: usize,
    pub step_delay_secs: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:1234/v1/chat/completions".into(),
            model: "qwen3-vl-8b-instruct".into(),
            timeout_secs: 240,
            temperature: 0.6,
            max_tokens: 2048,
            target_width: 1536,
            target_height: 864,
            dump_dir: PathBuf::from("dumps"),
            dump_prefix: "screen_".into(),
            dump_start: 1,
            keep_last_screenshots: 2,
            keep_last_reasoning: 2,
            max_steps: 10,
            step_delay_secs: 0.4,
        }
    }
}

fn parsed<T: FromStr>(var: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| Error::Config(format!("{}: cannot parse '{}'", var, raw)))
}

impl Settings {
    /// Read a JSON settings file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Override from `PILOT_*` process environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override from any variable lookup. A set but unparsable value is an error.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        macro_rules! text {
            ($var:literal, $field:expr) => {
                if let Some(v) = lookup($var) {
                    $field = v.into();
                }
            };
        }
        macro_rules! number {
            ($var:literal, $field:expr) => {
                if let Some(v) = lookup($var) {
                    $field = parsed($var, &v)?;
                }
            };
        }

        text!("PILOT_ENDPOINT", self.endpoint);
        text!("PILOT_MODEL", self.model);
        number!("PILOT_TIMEOUT", self.timeout_secs);
        number!("PILOT_TEMPERATURE", self.temperature);
        number!("PILOT_MAX_TOKENS", self.max_tokens);
        number!("PILOT_IMAGE_W", self.target_width);
        number!("PILOT_IMAGE_H", self.target_height);
        text!("PILOT_DUMP_DIR", self.dump_dir);
        text!("PILOT_DUMP_PREFIX", self.dump_prefix);
        number!("PILOT_DUMP_START", self.dump_start);
        number!("PILOT_KEEP_LAST_SCREENSHOTS", self.keep_last_screenshots);
        number!("PILOT_KEEP_LAST_THINKS", self.keep_last_reasoning);
        number!("PILOT_MAX_STEPS", self.max_steps);
        number!("PILOT_STEP_DELAY", self.step_delay_secs);
        Ok(())
    }

    pub fn target(&self) -> ScreenDimensions {
        ScreenDimensions::new(self.target_width, self.target_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut s = Settings::default();
        s.apply_vars(vars(&[
            ("PILOT_MODEL", "other"),
            ("PILOT_MAX_STEPS", " 25 "),
            ("PILOT_STEP_DELAY", "0"),
            ("PILOT_DUMP_DIR", "/tmp/shots"),
            ("PILOT_KEEP_LAST_THINKS", "0"),
        ]))
        .unwrap();
        assert_eq!(s.model, "other");
        assert_eq!(s.max_steps, 25);
        assert_eq!(s.step_delay_secs, 0.0);
        assert_eq!(s.dump_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(s.keep_last_reasoning, 0);
        assert_eq!(s.endpoint, Settings::default().endpoint);
    }

    #[test]
    fn test_unparsable_env_is_error_naming_variable() {
        let mut s = Settings::default();
        let err = s.apply_vars(vars(&[("PILOT_TIMEOUT", "soon")])).unwrap_err();
        assert!(err.to_string().contains("PILOT_TIMEOUT"), "{}", err);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pilot.json");
        std::fs::write(&path, r#"{"max_tokens": 512, "target_width": 800}"#).unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.max_tokens, 512);
        assert_eq!(s.target(), ScreenDimensions::new(800, 864));
        assert_eq!(s.keep_last_screenshots, 2);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pilot.json");
        let mut s = Settings::default();
        s.dump_prefix = "shot_".into();
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
    }
}
