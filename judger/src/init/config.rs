use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncReadExt, sync::OnceCell};

use crate::sandbox::Settings;

pub static CONFIG: OnceCell<GlobalConfig> = OnceCell::const_new();

static CONFIG_PATH: &str = "config/config.toml";
static CONFIG_DIR: &str = "config";

// config
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    #[serde(default)]
    pub log_level: usize,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub nsjail: Nsjail,
    #[serde(default)]
    pub storage: Storage,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Platform {
    /// bytes of stdout/checker output kept in a report
    pub report_limit: usize,
}

impl Default for Platform {
    fn default() -> Self {
        Self { report_limit: 1024 }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Nsjail {
    pub runtime: PathBuf,
    pub compiler_uid: u32,
    pub compiler_gid: u32,
    pub runner_uid: u32,
    pub runner_gid: u32,
    /// environment variables forwarded into the sandbox
    pub env: Vec<String>,
    /// largest file a sandboxed program may write, MiB
    pub output_limit: u64,
    /// pass `--use_cgroupv2`, must match the host hierarchy
    pub cgroup_v2: bool,
}

impl Default for Nsjail {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            runtime: PathBuf::from("./nsjail-3.1"),
            compiler_uid: settings.compiler_uid,
            compiler_gid: settings.compiler_gid,
            runner_uid: settings.runner_uid,
            runner_gid: settings.runner_gid,
            env: settings.env,
            output_limit: settings.output_limit,
            cgroup_v2: settings.cgroup_v2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Runtime {
    pub temp: PathBuf,
    pub problems: PathBuf,
    pub submissions: PathBuf,
    /// extra language table merged over the built-in one
    pub langs: Option<PathBuf>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            temp: PathBuf::from(".temp"),
            problems: PathBuf::from("problems"),
            submissions: PathBuf::from("submissions"),
            langs: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Storage {
    /// root of the local object store
    pub root: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
        }
    }
}

impl GlobalConfig {
    /// sandbox settings derived from the config
    pub fn settings(&self) -> Settings {
        Settings {
            temp: self.runtime.temp.clone(),
            compiler_uid: self.nsjail.compiler_uid,
            compiler_gid: self.nsjail.compiler_gid,
            runner_uid: self.nsjail.runner_uid,
            runner_gid: self.nsjail.runner_gid,
            env: self.nsjail.env.clone(),
            output_limit: self.nsjail.output_limit,
            report_limit: self.platform.report_limit,
            cgroup_v2: self.nsjail.cgroup_v2,
        }
    }
}

fn config_path() -> PathBuf {
    std::env::var_os("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_PATH))
}

pub async fn init() {
    let path = config_path();
    let mut buf = Vec::new();

    if CONFIG.get().is_some() {
        #[cfg(not(test))]
        panic!("config have been set twice, which indicated a bug in the program");
        #[cfg(test)]
        return;
    }

    let config: GlobalConfig = match fs::File::open(&path).await {
        Ok(mut x) => {
            if x.metadata().await.unwrap().is_file() {
                x.read_to_end(&mut buf).await.unwrap();
                let config = std::str::from_utf8(&buf)
                    .expect("Unable to parse config, Check config is correct");
                toml::from_str(config)
                    .unwrap_or_else(|err| panic!("Malformed config {}: {}", path.to_string_lossy(), err))
            } else {
                panic!(
                    "Unable to open config file, {} should not be symlink or folder",
                    path.to_string_lossy()
                );
            }
        }
        Err(_) => {
            println!(
                "Unable to find {}, generating default config",
                path.to_string_lossy()
            );

            let dir = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(CONFIG_DIR));
            fs::create_dir_all(dir).await.unwrap();

            let config = GlobalConfig::default();
            let config_txt = toml::to_string(&config).unwrap();
            fs::write(&path, config_txt).await.unwrap();

            println!("Finished, exiting...");
            std::process::exit(0);
        }
    };

    CONFIG.set(config).ok();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.platform.report_limit, 1024);
        assert_eq!(config.nsjail.output_limit, 64);
        assert!(config.runtime.langs.is_none());

        let settings = config.settings();
        assert_eq!(settings.temp, PathBuf::from(".temp"));
        assert_eq!(settings.runner_uid, 1501);
    }

    #[test]
    fn partial_section() {
        let config: GlobalConfig = toml::from_str(
            r#"
            log_level = 2

            [platform]
            report_limit = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, 2);
        assert_eq!(config.settings().report_limit, 64);
    }

    #[test]
    fn partial_nsjail() {
        let config: GlobalConfig =
            toml::from_str("[nsjail]\nruntime = \"/usr/bin/nsjail\"").unwrap();
        assert_eq!(config.nsjail.runtime, PathBuf::from("/usr/bin/nsjail"));
        assert_eq!(config.nsjail.compiler_uid, 1500);
        assert!(config.settings().cgroup_v2);

        let config: GlobalConfig = toml::from_str("[nsjail]\ncgroup_v2 = false").unwrap();
        assert!(!config.settings().cgroup_v2);
    }

    #[test]
    fn unknown_field() {
        let config = toml::from_str::<GlobalConfig>("[runtime]\nbind = \"0.0.0.0:8080\"");
        assert!(config.is_err());
    }

    #[test]
    fn serialize_default() {
        let text = toml::to_string(&GlobalConfig::default()).unwrap();
        let config: GlobalConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.nsjail.runtime, PathBuf::from("./nsjail-3.1"));
    }
}
