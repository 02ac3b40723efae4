use std::{
    collections::HashMap,
    env, fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

pub const PYTHON: &str = "PANEL_WORKER_PYTHON";
pub const PROGRAM: &str = "PANEL_WORKER_PROGRAM";
pub const SKIP_INSTALL: &str = "PANEL_WORKER_SKIP_INSTALL";
pub const LOG: &str = "PANEL_WORKER_LOG";

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(default_config_path())
    }

    /// Defaults, then the rc file at `config_path`, then environment variables.
    pub fn load_from(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let mut map = default_map();

        if config_path.exists() {
            read_rc_file(&config_path, &mut map);
        }

        // Environment variables take precedence
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).filter(|v| !v.is_empty()).map(PathBuf::from)
    }

    pub fn python(&self) -> String {
        self.get(PYTHON).unwrap_or_else(|| "python".into())
    }

    pub fn log_filter(&self) -> String {
        self.get(LOG).unwrap_or_else(|| "info".into())
    }
}

fn read_rc_file(path: &Path, map: &mut HashMap<String, String>) {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read config file");
            return;
        }
    };
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[PYTHON, PROGRAM, SKIP_INSTALL, LOG];
    KEYS.contains(&k) || k.starts_with("PANEL_WORKER_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("panel_worker").join(".workerrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert(PYTHON.into(), "python".into());
    m.insert(SKIP_INSTALL.into(), "false".into());
    m.insert(LOG.into(), "info".into());
    m
}
