//! Store and service configuration layered from flags, files and env.

use camino::Utf8PathBuf;
use clap::Parser;
use handover_core::SqliteStore;
use handover_dispatch::{HandoverService, MAX_COMMITMENT_DAYS, MIN_COMMITMENT_DAYS, ServiceConfig};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::CliError;

pub(crate) const ARG_DB: &str = "db";
pub(crate) const ARG_PICKUP_SECRET: &str = "pickup-secret";
pub(crate) const ARG_COMMITMENT_DAYS: &str = "commitment-days";
pub(crate) const ENV_DB: &str = "HANDOVER_CMDS_STORE_DB";
pub(crate) const ENV_PICKUP_SECRET: &str = "HANDOVER_CMDS_STORE_PICKUP_SECRET";

/// Options shared by every subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "store")]
#[ortho_config(prefix = "HANDOVER")]
pub(crate) struct StoreArgs {
    /// Path to the SQLite database; created when missing.
    #[arg(long = ARG_DB, value_name = "path", global = true)]
    #[serde(default)]
    pub(crate) db: Option<Utf8PathBuf>,
    /// Key used to sign pickup codes.
    #[arg(long = ARG_PICKUP_SECRET, value_name = "secret", global = true)]
    #[serde(default)]
    pub(crate) pickup_secret: Option<String>,
    /// Operator used when a request names none and nothing is recommended.
    #[arg(long = "default-operator", value_name = "id", global = true)]
    #[serde(default)]
    pub(crate) default_operator: Option<String>,
    /// Length of commitments issued on onboarding, 1 to 30 days.
    #[arg(long = ARG_COMMITMENT_DAYS, value_name = "days", global = true)]
    #[serde(default)]
    pub(crate) commitment_days: Option<u32>,
}

impl StoreArgs {
    pub(crate) fn into_config(self) -> Result<StoreConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        StoreConfig::try_from(merged)
    }
}

/// Resolved store location and service tunables.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoreConfig {
    pub(crate) db: Utf8PathBuf,
    pub(crate) service: ServiceConfig,
}

impl StoreConfig {
    /// Create the database directory, open the store and wrap it in a
    /// service.
    pub(crate) fn open(self) -> Result<HandoverService, CliError> {
        handover_fs::ensure_parent_dir(&self.db).map_err(|source| {
            CliError::PrepareDatabase {
                path: self.db.clone(),
                source,
            }
        })?;
        let store = SqliteStore::open(self.db.as_std_path()).map_err(|source| {
            CliError::OpenStore {
                path: self.db.clone(),
                source: Box::new(source),
            }
        })?;
        Ok(HandoverService::new(store, self.service))
    }
}

impl TryFrom<StoreArgs> for StoreConfig {
    type Error = CliError;

    fn try_from(args: StoreArgs) -> Result<Self, Self::Error> {
        let db = args.db.ok_or(CliError::MissingArgument {
            field: ARG_DB,
            env: ENV_DB,
        })?;
        let pickup_secret = args.pickup_secret.ok_or(CliError::MissingArgument {
            field: ARG_PICKUP_SECRET,
            env: ENV_PICKUP_SECRET,
        })?;
        let defaults = ServiceConfig::default();
        let commitment_days = args.commitment_days.unwrap_or(defaults.commitment_days);
        if !(MIN_COMMITMENT_DAYS..=MAX_COMMITMENT_DAYS).contains(&commitment_days) {
            return Err(CliError::OutOfRange {
                field: ARG_COMMITMENT_DAYS,
                value: commitment_days,
                min: MIN_COMMITMENT_DAYS,
                max: MAX_COMMITMENT_DAYS,
            });
        }
        let service = ServiceConfig {
            pickup_secret,
            default_operator: args.default_operator,
            commitment_days,
            ..defaults
        };
        Ok(Self { db, service })
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<StoreConfig, CliError> {
    let merged = StoreArgs::merge_from_layers(layers).map_err(CliError::from)?;
    StoreConfig::try_from(merged)
}
