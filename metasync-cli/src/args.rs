//! Command-line arguments and their merge onto [`SyncOptions`].

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use metasync_core::{Credentials, SyncOptions};

#[derive(Parser, Debug)]
#[command(
    name = "s3-meta-sync",
    version,
    about = "Sync a directory with an S3 folder using a manifest of MD5 digests",
    long_about = None,
)]
pub struct Cli {
    /// Local directory, `bucket:prefix`, or URL to read from.
    pub source: String,

    /// Local directory or `bucket:prefix` to write to.
    pub destination: String,

    /// Access key id.
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub key: Option<String>,

    /// Secret access key.
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret: Option<String>,

    /// Session token for temporary credentials.
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// S3-compatible endpoint, e.g. `http://localhost:9000`.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Number of parallel transfers.
    #[arg(long, short = 'p')]
    pub parallel: Option<usize>,

    /// Connect timeout in seconds.
    #[arg(long)]
    pub open_timeout: Option<u64>,

    /// Read timeout in seconds.
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Retries per request, for every kind of transient error.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Do not verify TLS certificates.
    #[arg(long)]
    pub ssl_none: bool,

    /// Gzip file bodies on upload.
    #[arg(long)]
    pub zip: bool,

    /// Trust the local manifest instead of hashing the destination.
    #[arg(long)]
    pub no_local_changes: bool,

    /// Canned ACL for uploaded objects.
    #[arg(long)]
    pub acl: Option<String>,

    /// Server-side encryption for uploaded objects, e.g. `AES256`.
    #[arg(long)]
    pub sse: Option<String>,

    /// Directory for download staging (defaults to the system temp dir).
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// YAML file with defaults; flags override it.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Log every transfer and retry.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Config file (if any) with flags applied on top.
    pub fn options(&self) -> Result<SyncOptions> {
        let mut options = match &self.config {
            Some(path) => SyncOptions::load(path)?,
            None => SyncOptions::default(),
        };

        if let Some(parallel) = self.parallel {
            options.parallel = parallel;
        }
        if let Some(secs) = self.open_timeout {
            options.open_timeout_secs = secs;
        }
        if let Some(secs) = self.read_timeout {
            options.read_timeout_secs = secs;
        }
        if self.max_retries.is_some() {
            options.max_retries = self.max_retries;
        }
        if self.ssl_none {
            options.ssl_verify = false;
        }
        if self.zip {
            options.zip = true;
        }
        if self.no_local_changes {
            options.no_local_changes = true;
        }
        if let Some(acl) = &self.acl {
            options.acl = acl.clone();
        }
        if self.sse.is_some() {
            options.server_side_encryption = self.sse.clone();
        }
        if self.region.is_some() {
            options.region = self.region.clone();
        }
        if self.endpoint.is_some() {
            options.endpoint = self.endpoint.clone();
        }
        if self.staging_dir.is_some() {
            options.staging_root = self.staging_dir.clone();
        }

        match (&self.key, &self.secret) {
            (Some(key), Some(secret)) => {
                options.credentials = Some(Credentials {
                    access_key_id: key.clone(),
                    secret_access_key: secret.clone(),
                    session_token: self.session_token.clone(),
                });
            }
            (None, None) => {}
            _ => bail!("--key and --secret must be given together"),
        }

        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["s3-meta-sync"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_without_flags() {
        let cli = parse(&["src", "bucket:dst", "--key", "k", "--secret", "s"]);
        let options = cli.options().unwrap();
        assert_eq!(options.parallel, 10);
        assert!(options.ssl_verify);
        assert_eq!(options.credentials.unwrap().access_key_id, "k");
    }

    #[test]
    fn flags_override_config_file() {
        let tmp = TempDir::new().unwrap();
        let config = tmp.path().join("sync.yml");
        fs::write(&config, "parallel: 3\nzip: true\nacl: private\n").unwrap();

        let cli = parse(&[
            "src",
            "bucket:dst",
            "--key",
            "k",
            "--secret",
            "s",
            "--config",
            config.to_str().unwrap(),
            "--parallel",
            "7",
            "--ssl-none",
        ]);
        let options = cli.options().unwrap();
        assert_eq!(options.parallel, 7);
        assert!(options.zip);
        assert_eq!(options.acl, "private");
        assert!(!options.ssl_verify);
    }

    #[test]
    fn half_a_credential_pair_is_rejected() {
        let cli = parse(&["src", "bucket:dst", "--key", "k", "--secret", "s"]);
        let partial = Cli { secret: None, ..cli };
        assert!(partial.options().is_err());
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let cli = parse(&["src", "bucket:dst", "--key", "k", "--secret", "s", "-p", "0"]);
        assert!(cli.options().is_err());
    }
}
