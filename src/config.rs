//! # Configuration
//!
//! Protocol constants for the annex covenant and the [`CovenantConfig`] value
//! that carries them into both `commit` and `reconstruct_spend`.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! environment variables (a `.env` file is honoured through `dotenv`).

use crate::error::{CovenantError, CovenantResult};
use bitcoin::{Address, Amount, Network, ScriptBuf};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, path::Path, str::FromStr};

/// Covenant protocol constants
pub mod covenant {
    /// Index of the placeholder output that becomes the commitment output.
    pub const DEFAULT_OUTPUT_INDEX: u32 = 0;

    /// Absolute fee in satoshis paid by the follow-on transaction.
    ///
    /// The fee is part of the pre-signed follow-on transaction, so it is fixed
    /// at commitment time and can never be bumped afterwards.
    pub const DEFAULT_FEE_SATS: u64 = 2_000;

    /// Regtest destination the follow-on transaction pays to.
    pub const DEFAULT_DESTINATION: &str =
        "bcrt1p2uu43ca9hzyjqjtvjl0xehx47rjj8szclsc2kg98utfq678z7n8qftt3gh";

    /// Auxiliary field key under which the follow-on signature is stored.
    pub const ANNEX_FIELD_KEY: &str = "annex";

    /// Placeholder output script: a v1 witness program of 32 zero bytes.
    ///
    /// Funding wallets pay to the matching address
    /// `bcrt1pqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqm3usuw`.
    pub const PLACEHOLDER_SCRIPT_HEX: &str =
        "51200000000000000000000000000000000000000000000000000000000000000000";

    /// BIP-340 Schnorr signature length with the default sighash type.
    pub const SIGNATURE_LEN: usize = 64;

    /// First byte of a taproot annex witness element (BIP-341).
    pub const ANNEX_TAG: u8 = 0x50;

    /// Amount requested from the funding wallet when none is given (0.01 BTC).
    pub const DEFAULT_FUNDING_SATS: u64 = 1_000_000;
}

/// Node RPC defaults
pub mod network {
    /// Default bitcoind RPC host
    pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";

    /// Default regtest RPC port
    pub const DEFAULT_RPC_PORT: &str = "18443";

    /// Default RPC username
    pub const DEFAULT_RPC_USER: &str = "user";

    /// Default RPC password
    pub const DEFAULT_RPC_PASSWORD: &str = "password";

    /// Default wallet name for funding and signing operations
    pub const DEFAULT_WALLET_NAME: &str = "covenant_wallet";
}

/// Environment variable names
pub mod env {
    /// Network override (`bitcoin`, `testnet`, `signet`, `regtest`)
    pub const COVENANT_NETWORK: &str = "COVENANT_NETWORK";

    /// Follow-on destination address override
    pub const COVENANT_DESTINATION: &str = "COVENANT_DESTINATION";

    /// Follow-on fee override in satoshis
    pub const COVENANT_FEE_SATS: &str = "COVENANT_FEE_SATS";

    /// Commitment output index override
    pub const COVENANT_OUTPUT_INDEX: &str = "COVENANT_OUTPUT_INDEX";

    /// RPC URL override
    pub const RPC_URL: &str = "RPC_URL";

    /// RPC port override
    pub const RPC_PORT: &str = "RPC_PORT";

    /// RPC username override
    pub const RPC_USER: &str = "RPC_USER";

    /// RPC password override
    pub const RPC_PASSWORD: &str = "RPC_PASSWORD";

    /// Wallet name override
    pub const RPC_WALLET: &str = "RPC_WALLET";
}

/// Policy values shared by the commit and reconstruct operations.
///
/// Both sides must agree on every field: a follow-on transaction rebuilt with
/// a different destination, fee or index no longer matches the digest the
/// embedded signature commits to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CovenantConfig {
    /// Network the destination address must belong to
    pub network: Network,

    /// Address the follow-on transaction pays to
    pub destination: String,

    /// Absolute follow-on fee in satoshis
    pub fee_sats: u64,

    /// Index of the commitment output in the committing transaction
    pub output_index: u32,

    /// Auxiliary field key carrying the signature
    pub field_key: String,

    /// Hex script the designated output must hold before commitment.
    /// `None` accepts any script.
    pub placeholder_script: Option<String>,
}

impl Default for CovenantConfig {
    fn default() -> Self {
        Self {
            network: Network::Regtest,
            destination: covenant::DEFAULT_DESTINATION.to_string(),
            fee_sats: covenant::DEFAULT_FEE_SATS,
            output_index: covenant::DEFAULT_OUTPUT_INDEX,
            field_key: covenant::ANNEX_FIELD_KEY.to_string(),
            placeholder_script: Some(covenant::PLACEHOLDER_SCRIPT_HEX.to_string()),
        }
    }
}

impl CovenantConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> CovenantResult<Self> {
        dotenv::dotenv().ok();
        Self::default().with_env_overrides()
    }

    /// Load a configuration from a JSON file, then apply environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> CovenantResult<Self> {
        dotenv::dotenv().ok();
        let json = std::fs::read_to_string(path)?;
        let config: CovenantConfig = serde_json::from_str(&json)?;
        config.with_env_overrides()
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> CovenantResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply `COVENANT_*` environment variables on top of this configuration.
    pub fn with_env_overrides(mut self) -> CovenantResult<Self> {
        if let Some(network) = env_override::<Network>(env::COVENANT_NETWORK)? {
            self.network = network;
        }
        if let Ok(destination) = std::env::var(env::COVENANT_DESTINATION) {
            self.destination = destination;
        }
        if let Some(fee_sats) = env_override::<u64>(env::COVENANT_FEE_SATS)? {
            self.fee_sats = fee_sats;
        }
        if let Some(output_index) = env_override::<u32>(env::COVENANT_OUTPUT_INDEX)? {
            self.output_index = output_index;
        }
        Ok(self)
    }

    /// Follow-on fee as an [`Amount`]
    pub fn fee(&self) -> Amount {
        Amount::from_sat(self.fee_sats)
    }

    /// Parse the destination and check it belongs to the configured network.
    pub fn destination_address(&self) -> CovenantResult<Address> {
        parse_address(&self.destination, self.network)
    }

    /// Locking script of the follow-on output
    pub fn destination_script(&self) -> CovenantResult<ScriptBuf> {
        Ok(self.destination_address()?.script_pubkey())
    }

    /// Decoded placeholder script, if one is required
    pub fn placeholder_script(&self) -> CovenantResult<Option<ScriptBuf>> {
        self.placeholder_script
            .as_deref()
            .map(|script_hex| {
                hex::decode(script_hex)
                    .map(ScriptBuf::from_bytes)
                    .map_err(|e| {
                        CovenantError::decode(format!("Invalid placeholder script hex: {}", e))
                    })
            })
            .transpose()
    }

    /// Address a funding wallet pays to so the placeholder lands in the PSBT.
    pub fn placeholder_address(&self) -> CovenantResult<Address> {
        let script = self
            .placeholder_script()?
            .ok_or_else(|| CovenantError::precondition("No placeholder script configured"))?;
        Address::from_script(&script, self.network).map_err(|_| CovenantError::InvalidAddress {
            address: script.to_hex_string(),
        })
    }
}

/// Validate and parse a Bitcoin address for the given network
pub fn parse_address(address_str: &str, network: Network) -> CovenantResult<Address> {
    let address = Address::from_str(address_str).map_err(|_| CovenantError::InvalidAddress {
        address: address_str.to_string(),
    })?;

    address
        .require_network(network)
        .map_err(|_| CovenantError::InvalidAddress {
            address: address_str.to_string(),
        })
}

fn env_override<T>(name: &str) -> CovenantResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| {
                CovenantError::precondition(format!("Invalid value for {}: {}", name, e))
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_destination_is_regtest_taproot() {
        let config = CovenantConfig::default();
        let script = config.destination_script().unwrap();

        assert!(script.is_p2tr());
        assert_eq!(script.len(), 34);
        assert_eq!(config.fee(), Amount::from_sat(2_000));
        assert_eq!(config.output_index, 0);
    }

    #[test]
    fn test_destination_network_mismatch() {
        let config = CovenantConfig {
            network: Network::Bitcoin,
            ..CovenantConfig::default()
        };

        assert!(matches!(
            config.destination_script(),
            Err(CovenantError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_placeholder_address() {
        let config = CovenantConfig::default();
        let address = config.placeholder_address().unwrap();

        assert_eq!(
            address.to_string(),
            "bcrt1pqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqm3usuw"
        );

        let unrestricted = CovenantConfig {
            placeholder_script: None,
            ..CovenantConfig::default()
        };
        assert!(unrestricted.placeholder_script().unwrap().is_none());
        assert!(unrestricted.placeholder_address().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CovenantConfig = serde_json::from_str(r#"{"fee_sats": 5000}"#).unwrap();

        assert_eq!(config.fee_sats, 5_000);
        assert_eq!(config.destination, covenant::DEFAULT_DESTINATION);
        assert_eq!(config.field_key, "annex");
    }

    #[test]
    fn test_file_round_trip() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "ephemeral_covenant_config_{}_{}.json",
            std::process::id(),
            nanos
        ));
        let config = CovenantConfig {
            fee_sats: 1_500,
            ..CovenantConfig::default()
        };

        config.save_to_file(&path).unwrap();
        let json = std::fs::read_to_string(&path).unwrap();
        let loaded: CovenantConfig = serde_json::from_str(&json).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_env_override_parsing() {
        let name = "EPHEMERAL_COVENANT_TEST_OVERRIDE";

        std::env::remove_var(name);
        assert_eq!(env_override::<u64>(name).unwrap(), None);

        std::env::set_var(name, "4500");
        assert_eq!(env_override::<u64>(name).unwrap(), Some(4_500));

        std::env::set_var(name, "not-a-number");
        let err = env_override::<u64>(name).unwrap_err();
        std::env::remove_var(name);

        assert!(matches!(err, CovenantError::Precondition { .. }));
        assert!(err
            .to_string()
            .contains("Invalid value for EPHEMERAL_COVENANT_TEST_OVERRIDE"));
    }

    #[test]
    fn test_covenant_env_overrides() {
        std::env::set_var(env::COVENANT_FEE_SATS, "3000");
        std::env::set_var(env::COVENANT_NETWORK, "testnet");
        let overridden = CovenantConfig::default().with_env_overrides();

        std::env::set_var(env::COVENANT_NETWORK, "regtest");
        std::env::set_var(env::COVENANT_FEE_SATS, "lots");
        let malformed = CovenantConfig::default().with_env_overrides();

        std::env::remove_var(env::COVENANT_FEE_SATS);
        std::env::remove_var(env::COVENANT_NETWORK);

        let overridden = overridden.unwrap();
        assert_eq!(overridden.fee_sats, 3_000);
        assert_eq!(overridden.network, Network::Testnet);
        assert_eq!(overridden.destination, covenant::DEFAULT_DESTINATION);

        let err = malformed.unwrap_err();
        assert!(matches!(err, CovenantError::Precondition { .. }));
        assert!(err.to_string().contains("Invalid value for COVENANT_FEE_SATS"));
    }
}
