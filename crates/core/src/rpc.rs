//! Node JSON-RPC client implementing the distribution collaborators.
//!
//! Every call is an HTTP POST of a JSON object with an `action` field.
//! Failures are reported by the node as `{"error": "..."}`.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::account::{Account, Amount, BlockHash};
use crate::config::RpcConfig;
use crate::distribution::{LedgerError, LedgerSource, PaymentSubmitter, SubmissionError};

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum RpcRequest<'a> {
    AccountBalance {
        account: String,
    },
    Send {
        wallet: &'a str,
        source: String,
        destination: String,
        amount: String,
    },
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    block: Option<String>,
    error: Option<String>,
}

/// Talks to a node's RPC endpoint.
pub struct NodeRpcClient {
    client: reqwest::Client,
    url: String,
    wallet: String,
}

impl NodeRpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            wallet: config.wallet.clone(),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        request: &RpcRequest<'_>,
    ) -> Result<T, reqwest::Error> {
        self.client
            .post(&self.url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

fn parse_balance(response: BalanceResponse) -> Result<Amount, LedgerError> {
    if let Some(error) = response.error {
        return Err(LedgerError::Node(error));
    }
    let balance = response
        .balance
        .ok_or_else(|| LedgerError::Parse("missing `balance`".to_string()))?;
    balance
        .parse()
        .map_err(|e| LedgerError::Parse(format!("balance {balance:?}: {e}")))
}

fn parse_send(response: SendResponse) -> Result<BlockHash, SubmissionError> {
    if let Some(error) = response.error {
        return Err(SubmissionError::Rejected(error));
    }
    let block = response
        .block
        .ok_or_else(|| SubmissionError::Parse("missing `block`".to_string()))?;
    let hash: BlockHash = block
        .parse()
        .map_err(|e| SubmissionError::Parse(format!("block {block:?}: {e}")))?;
    // The node answers with a zero hash when it could not create the send.
    if hash.is_zero() {
        return Err(SubmissionError::Rejected("node returned an empty block".to_string()));
    }
    Ok(hash)
}

impl LedgerSource for NodeRpcClient {
    fn balance(
        &self,
        account: Account,
    ) -> Pin<Box<dyn Future<Output = Result<Amount, LedgerError>> + Send + '_>> {
        Box::pin(async move {
            let request = RpcRequest::AccountBalance {
                account: account.encode_account(),
            };
            let response: BalanceResponse = self.call(&request).await?;
            parse_balance(response)
        })
    }
}

impl PaymentSubmitter for NodeRpcClient {
    fn submit_payment(
        &self,
        source: Account,
        destination: Account,
        amount: Amount,
    ) -> Pin<Box<dyn Future<Output = Result<BlockHash, SubmissionError>> + Send + '_>> {
        Box::pin(async move {
            let request = RpcRequest::Send {
                wallet: &self.wallet,
                source: source.encode_account(),
                destination: destination.encode_account(),
                amount: amount.to_string(),
            };
            let response: SendResponse = match self.call(&request).await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => return Err(SubmissionError::Timeout),
                Err(e) => return Err(e.into()),
            };
            parse_send(response)
        })
    }
}
