use std::{
    env,
    fs::{self, File},
    io::{BufReader, Write},
    net::IpAddr,
    path::{Path, PathBuf},
};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::{
    defaults::{self, CONFIG_FILE_NAME, DEFAULT_CONFIG_DIR},
    error::ConfigError,
};

/// What the daemon does with a configured virtual router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// run the VRRP instance until interrupted
    #[default]
    Run,
    /// remove the virtual addresses from the interface and exit
    Teardown,
}

// for reading JSON config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    pub vrouters: Vec<VrrpConfig>,
}

/// Static configuration of one virtual router. Intervals are in
/// centiseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VrrpConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub vrid: u8,
    pub interface_name: String,
    pub ip_addresses: Vec<String>,

    #[serde(default = "defaults::priority")]
    pub priority: u8,
    #[serde(default = "defaults::advert_int")]
    pub advert_interval: u16,
    #[serde(default = "defaults::preempt_mode")]
    pub preempt_mode: bool,
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub source_address: Option<IpAddr>,
    #[serde(default)]
    pub action: Action,
}

#[derive(Parser, Debug)]
#[command(name = "failover", version, about = "VRRPv3 virtual router daemon")]
pub struct CliArgs {
    /// overrides the action of every configured virtual router
    #[arg(long, value_enum)]
    pub action: Option<Action>,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// read virtual routers from a JSON file
    File {
        /// defaults to /etc/failover/vrrp-config.json ($SNAP_COMMON when run as a snap)
        filename: Option<PathBuf>,
    },
    /// configure a single virtual router from the command line
    Cli(CliConfig),
}

#[derive(Args, Debug, Clone)]
pub struct CliConfig {
    /// name of the virtual router instance
    #[arg(long)]
    pub name: Option<String>,

    /// Virtual Router ID of the instance
    #[arg(long)]
    pub vrid: u8,

    /// interface the virtual addresses are attached to
    #[arg(long = "iface")]
    pub interface_name: String,

    /// a protected address, e.g. 192.168.100.5/24. Repeat for more
    #[arg(long = "ip-address", required = true)]
    pub ip_addresses: Vec<String>,

    #[arg(long, default_value_t = defaults::priority())]
    pub priority: u8,

    /// advertisement interval in centiseconds
    #[arg(long = "adv-interval", default_value_t = defaults::advert_int())]
    pub advert_interval: u16,

    #[arg(long = "preempt-mode", default_value_t = defaults::preempt_mode(), action = ArgAction::Set)]
    pub preempt_mode: bool,

    /// this node owns the virtual addresses (priority 255)
    #[arg(long)]
    pub owner: bool,

    /// source address of advertisements, discovered from the interface if absent
    #[arg(long = "source-address")]
    pub source_address: Option<IpAddr>,
}

impl From<CliConfig> for VrrpConfig {
    fn from(cli: CliConfig) -> Self {
        Self {
            name: cli.name,
            vrid: cli.vrid,
            interface_name: cli.interface_name,
            ip_addresses: cli.ip_addresses,
            priority: cli.priority,
            advert_interval: cli.advert_interval,
            preempt_mode: cli.preempt_mode,
            owner: cli.owner,
            source_address: cli.source_address,
            action: Action::Run,
        }
    }
}

const DEFAULT_JSON_CONFIG: &str = r#"{
    "vrouters": [
        {
            "name": "VR_1",
            "vrid": 51,
            "interface_name": "wlo1",
            "ip_addresses": [
                "192.168.100.100/24"
            ],
            "priority": 101,
            "advert_interval": 100,
            "preempt_mode": true
        }
    ]
}
"#;

/// Turns the command line into the list of virtual routers to act on.
pub fn parse_cli_opts(args: CliArgs) -> Result<Vec<VrrpConfig>, ConfigError> {
    let mut configs = match args.mode {
        Some(Mode::Cli(cli)) => vec![VrrpConfig::from(cli)],
        Some(Mode::File {
            filename: Some(filename),
        }) => read_config_from_json_file(filename)?.vrouters,
        Some(Mode::File { filename: None }) | None => {
            read_config_from_json_file(default_config_path()?)?.vrouters
        }
    };

    if let Some(action) = args.action {
        configs.iter_mut().for_each(|config| config.action = action);
    }
    Ok(configs)
}

/// Location of the default config file, created with a sample config when
/// missing.
fn default_config_path() -> Result<PathBuf, ConfigError> {
    // if app is running via snap, the SNAP_COMMON environment
    // variable will be used as the config directory
    let directory = match env::var("SNAP_COMMON") {
        Ok(path) => PathBuf::from(path),
        Err(_) => {
            fs::create_dir_all(DEFAULT_CONFIG_DIR)?;
            PathBuf::from(DEFAULT_CONFIG_DIR)
        }
    };

    let file_path = directory.join(CONFIG_FILE_NAME);
    if !file_path.exists() {
        log::info!("writing sample config to {}", file_path.display());
        let mut file = File::create(&file_path)?;
        file.write_all(DEFAULT_JSON_CONFIG.as_bytes())?;
    }
    Ok(file_path)
}

pub fn read_config_from_json_file<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
    log::info!("Reading from config file {:?}", path.as_ref().as_os_str());
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_defaults_filled_in() {
        let json = r#"{
            "vrouters": [
                { "vrid": 7, "interface_name": "eth0", "ip_addresses": ["10.0.0.1/24"] }
            ]
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        let vr = &config.vrouters[0];
        assert_eq!(vr.name, None);
        assert_eq!(vr.priority, 100);
        assert_eq!(vr.advert_interval, 100);
        assert!(vr.preempt_mode);
        assert!(!vr.owner);
        assert_eq!(vr.source_address, None);
        assert_eq!(vr.action, Action::Run);
    }

    #[test]
    fn test_full_entry() {
        let json = r#"{
            "vrouters": [{
                "name": "VR_6", "vrid": 9, "interface_name": "eth1",
                "ip_addresses": ["fe80::100/64"], "priority": 200,
                "advert_interval": 25, "preempt_mode": false, "owner": true,
                "source_address": "fe80::1", "action": "teardown"
            }]
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        let vr = &config.vrouters[0];
        assert_eq!(vr.name.as_deref(), Some("VR_6"));
        assert_eq!(vr.advert_interval, 25);
        assert!(vr.owner);
        assert_eq!(vr.source_address, Some("fe80::1".parse().unwrap()));
        assert_eq!(vr.action, Action::Teardown);
    }

    #[test]
    fn test_sample_config_parses() {
        let config: FileConfig = serde_json::from_str(DEFAULT_JSON_CONFIG).unwrap();
        assert_eq!(config.vrouters.len(), 1);
        assert_eq!(config.vrouters[0].vrid, 51);
    }

    #[test]
    fn test_cli_mode() {
        let args = CliArgs::try_parse_from([
            "failover",
            "--action",
            "teardown",
            "cli",
            "--vrid",
            "51",
            "--iface",
            "eth0",
            "--ip-address",
            "192.168.100.100/24",
            "--ip-address",
            "192.168.100.101/24",
            "--preempt-mode",
            "false",
        ])
        .unwrap();
        assert_eq!(args.log_level, "info");

        let configs = parse_cli_opts(args).unwrap();
        assert_eq!(configs.len(), 1);
        let vr = &configs[0];
        assert_eq!(vr.vrid, 51);
        assert_eq!(vr.interface_name, "eth0");
        assert_eq!(vr.ip_addresses.len(), 2);
        assert_eq!(vr.priority, 100);
        assert!(!vr.preempt_mode);
        assert_eq!(vr.action, Action::Teardown);
    }

    #[test]
    fn test_cli_requires_an_address() {
        let res = CliArgs::try_parse_from(["failover", "cli", "--vrid", "1", "--iface", "eth0"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_file_mode() {
        let path = env::temp_dir().join(format!("failover-test-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{ "vrouters": [
                { "vrid": 1, "interface_name": "eth0", "ip_addresses": ["10.0.0.1"], "action": "teardown" },
                { "vrid": 2, "interface_name": "eth0", "ip_addresses": ["10.0.0.2"] }
            ] }"#,
        )
        .unwrap();

        let args = CliArgs::try_parse_from([
            OsStr::new("failover"),
            OsStr::new("--action"),
            OsStr::new("run"),
            OsStr::new("file"),
            path.as_os_str(),
        ])
        .unwrap();
        let configs = parse_cli_opts(args).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(configs.len(), 2);
        assert!(configs.iter().all(|c| c.action == Action::Run));
    }

    #[test]
    fn test_unreadable_file() {
        let err = read_config_from_json_file("/nonexistent/failover.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
