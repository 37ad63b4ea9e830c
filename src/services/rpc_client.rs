use crate::config::{env as config_env, network, CovenantConfig};
use crate::error::{CovenantError, CovenantResult};
use bitcoin::{Address, Amount, Psbt, Transaction, Txid};
use bitcoincore_rpc::{Auth, Client, RpcApi};
use log::{debug, info};
use serde_json::{json, Map, Value};
use std::{env, str::FromStr};

/// Wallet-enabled bitcoind connection used for funding and relay
#[derive(Debug)]
pub struct NodeClient {
    client: Client,
    wallet_name: String,
}

impl NodeClient {
    /// Create a new RPC client with configuration from environment or defaults
    pub fn new() -> CovenantResult<Self> {
        // Load environment variables
        dotenv::dotenv().ok();

        let rpc_url = env::var(config_env::RPC_URL)
            .unwrap_or_else(|_| network::DEFAULT_RPC_HOST.to_string());
        let rpc_port = env::var(config_env::RPC_PORT)
            .unwrap_or_else(|_| network::DEFAULT_RPC_PORT.to_string());
        let rpc_user = env::var(config_env::RPC_USER)
            .unwrap_or_else(|_| network::DEFAULT_RPC_USER.to_string());
        let rpc_password = env::var(config_env::RPC_PASSWORD)
            .unwrap_or_else(|_| network::DEFAULT_RPC_PASSWORD.to_string());
        let wallet_name = env::var(config_env::RPC_WALLET)
            .unwrap_or_else(|_| network::DEFAULT_WALLET_NAME.to_string());

        let auth = Auth::UserPass(rpc_user, rpc_password);
        let url = format!("http://{}:{}/wallet/{}", rpc_url, rpc_port, wallet_name);
        debug!("Connecting to {}", url);

        let client = Client::new(&url, auth)?;

        Ok(NodeClient {
            client,
            wallet_name,
        })
    }

    /// Have the wallet fund a PSBT paying `amount` to `address`.
    pub fn create_funded_psbt(
        &self,
        address: &Address,
        amount: Amount,
        change_position: u32,
    ) -> CovenantResult<Psbt> {
        let mut output = Map::new();
        output.insert(address.to_string(), json!(amount.to_btc()));
        let options = json!({ "changePosition": change_position });

        let result: Value = self.client.call(
            "walletcreatefundedpsbt",
            &[json!([]), Value::Array(vec![Value::Object(output)]), json!(0), options],
        )?;

        let psbt_base64 = result["psbt"]
            .as_str()
            .ok_or_else(|| CovenantError::decode("walletcreatefundedpsbt returned no psbt"))?;
        Psbt::from_str(psbt_base64)
            .map_err(|e| CovenantError::decode(format!("Invalid PSBT from wallet: {}", e)))
    }

    /// Fund a PSBT whose commitment-index output is the configured placeholder.
    ///
    /// The wallet is asked for a single payment, so the placeholder can only
    /// land at index 0 with change after it.
    pub fn fund_placeholder(
        &self,
        config: &CovenantConfig,
        amount: Amount,
    ) -> CovenantResult<Psbt> {
        if config.output_index != 0 {
            return Err(CovenantError::precondition(format!(
                "Wallet funding places the placeholder at index 0, configured index is {}",
                config.output_index
            )));
        }

        let address = config.placeholder_address()?;
        let psbt = self.create_funded_psbt(&address, amount, 1)?;
        info!(
            "Wallet {} funded {} to placeholder {}",
            self.wallet_name, amount, address
        );
        Ok(psbt)
    }

    /// Broadcast a raw transaction
    pub fn send_raw_transaction(&self, tx: &Transaction) -> CovenantResult<Txid> {
        let txid = self.client.send_raw_transaction(tx)?;
        info!("Broadcast {}", txid);
        Ok(txid)
    }

    /// Fetch a transaction known to the node, e.g. a confirmed covenant transaction
    pub fn get_raw_transaction(&self, txid: &Txid) -> CovenantResult<Transaction> {
        Ok(self.client.get_raw_transaction(txid, None)?)
    }
}
