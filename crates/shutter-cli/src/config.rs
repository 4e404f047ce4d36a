use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shutter_storage::{ObjectId, StoreConfig};

/// Root used when neither `--root` nor a config file names one
pub const DEFAULT_ROOT: &str = "./shutter-data";

#[derive(Debug, Parser)]
#[command(name = "shutter", version, about = "Encrypted photo artifact store")]
pub struct Cli {
    /// Storage root directory [default: ./shutter-data]
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML store configuration file (flags take precedence)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Human-readable logs instead of JSONL
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the storage key pair (or load it) and print its fingerprint
    Keygen,
    /// Encrypt a file into the store
    Ingest {
        /// Plaintext file to ingest
        file: PathBuf,
        /// Object id to store under (random when omitted)
        #[arg(long)]
        id: Option<ObjectId>,
    },
    /// Decrypt an object and write its plaintext
    Fetch {
        /// Object id
        id: ObjectId,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the artifact size of an object
    Stat {
        /// Object id
        id: ObjectId,
    },
    /// List stored object ids
    List,
    /// Delete an object
    Delete {
        /// Object id
        id: ObjectId,
    },
}

impl Cli {
    /// Store configuration from the config file (if any) with flag overrides
    pub fn store_config(&self) -> anyhow::Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::from_file(path)?,
            None => StoreConfig::with_root(DEFAULT_ROOT),
        };

        if let Some(root) = &self.root {
            config.root = root.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from([
            "shutter",
            "ingest",
            "photo.jpg",
            "--id",
            "6f9619ff-8b86-d011-b42d-00c04fc964ff",
            "--root",
            "/data",
        ])
        .unwrap();

        match cli.command {
            Command::Ingest { file, id } => {
                assert_eq!(file, PathBuf::from("photo.jpg"));
                assert_eq!(id.unwrap().to_string(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.root, Some(PathBuf::from("/data")));
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_rejects_bad_id() {
        let result = Cli::try_parse_from(["shutter", "fetch", "not-a-uuid"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_root() {
        let cli = Cli::try_parse_from(["shutter", "list"]).unwrap();
        let config = cli.store_config().unwrap();
        assert_eq!(config.root, PathBuf::from(DEFAULT_ROOT));
    }

    #[test]
    fn test_flag_overrides_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("shutter.toml");
        std::fs::write(&path, "root = \"/from/file\"\nchunk_size = 4096\n").unwrap();
        let path_arg = path.to_str().unwrap();

        let cli = Cli::try_parse_from(["shutter", "list", "--config", path_arg]).unwrap();
        let config = cli.store_config().unwrap();
        assert_eq!(config.root, PathBuf::from("/from/file"));
        assert_eq!(config.chunk_size, 4096);

        let cli =
            Cli::try_parse_from(["shutter", "list", "--config", path_arg, "--root", "/flag"]).unwrap();
        let config = cli.store_config().unwrap();
        assert_eq!(config.root, PathBuf::from("/flag"));
        assert_eq!(config.chunk_size, 4096);
    }
}
