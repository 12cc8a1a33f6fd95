//! Single-writer sequencer
//!
//! Owns the block height and feeds transactions to the [`Ledger`] one at a
//! time, so every operation sees a total order and a well-defined
//! `CallContext`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           SequencerHandle (Clone)            │
//! │      submit() / mine_block() / height()      │
//! └──────────────────────┬───────────────────────┘
//!                        │ mpsc::channel (bounded)
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │          SequencerActor (one task)           │
//! │ height ─► Ledger::execute_in_block ─► seal   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every committed transaction persists its block height in the same change
//! set, and every block is sealed once more after its last transaction, so a
//! restarted node resumes at the block after the last sealed one. A failed
//! seal never turns a committed transaction into an error.

use crate::{
    config::SequencerConfig,
    crypto::{to_hex, BlockHasher},
    error::{Error, Result},
    ledger::{Ledger, Operation, Outcome},
    store::KvStore,
    types::{CallContext, Height, Principal},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// A signed-off call waiting to be sequenced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Caller identity
    pub caller: Principal,

    /// Requested operation
    pub operation: Operation,
}

impl Transaction {
    /// Create new transaction
    pub fn new(caller: impl Into<Principal>, operation: Operation) -> Self {
        Self {
            caller: caller.into(),
            operation,
        }
    }
}

/// Result of mining one block
#[derive(Debug)]
pub struct BlockReceipt {
    /// Height the block was committed at
    pub height: Height,

    /// Per-transaction results, in submission order
    pub results: Vec<Result<Outcome>>,

    /// SHA-256 over the height and every committed change set
    pub digest: [u8; 32],

    /// False when the trailing seal write failed
    pub sealed: bool,
}

impl BlockReceipt {
    /// Number of transactions that committed
    pub fn committed(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }
}

/// Message sent to the sequencer actor
#[derive(Debug)]
pub enum SequencerMessage {
    /// Run one transaction as its own block
    Submit {
        /// Transaction to run
        transaction: Transaction,
        /// Result of the transaction
        response: oneshot::Sender<Result<Outcome>>,
    },

    /// Run a batch of transactions at one height
    MineBlock {
        /// Transactions, in execution order
        transactions: Vec<Transaction>,
        /// Receipt of the mined block
        response: oneshot::Sender<Result<BlockReceipt>>,
    },

    /// Height the next block will be committed at
    Height {
        /// Next block height
        response: oneshot::Sender<Height>,
    },

    /// Stop the actor
    Shutdown {
        /// Fired once the actor has released the ledger
        response: oneshot::Sender<()>,
    },
}

/// Actor that sequences ledger transactions
pub struct SequencerActor<S: ?Sized> {
    /// Ledger being driven
    ledger: Arc<Ledger<S>>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<SequencerMessage>,

    /// Height of the next block
    height: Height,
}

impl<S: ?Sized> std::fmt::Debug for SequencerActor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencerActor")
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl<S: KvStore + ?Sized> SequencerActor<S> {
    /// Create new actor, resuming after the last sealed block
    pub fn new(
        ledger: Arc<Ledger<S>>,
        mailbox: mpsc::Receiver<SequencerMessage>,
        config: &SequencerConfig,
    ) -> Result<Self> {
        let height = match ledger.chain_height()? {
            Some(sealed) => sealed
                .checked_add(1)
                .ok_or_else(|| Error::Overflow("chain height exhausted".to_string()))?,
            None => config.genesis_height,
        };

        Ok(Self {
            ledger,
            mailbox,
            height,
        })
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        tracing::info!(height = self.height, "Sequencer started");

        let mut ack = None;
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                SequencerMessage::Submit {
                    transaction,
                    response,
                } => {
                    let result = self.mine(vec![transaction]).and_then(|mut receipt| {
                        receipt.results.pop().unwrap_or_else(|| {
                            Err(Error::Concurrency("Empty block receipt".to_string()))
                        })
                    });
                    let _ = response.send(result);
                }

                SequencerMessage::MineBlock {
                    transactions,
                    response,
                } => {
                    let result = self.mine(transactions);
                    let _ = response.send(result);
                }

                SequencerMessage::Height { response } => {
                    let _ = response.send(self.height);
                }

                SequencerMessage::Shutdown { response } => {
                    ack = Some(response);
                    break;
                }
            }
        }

        let SequencerActor {
            ledger,
            mailbox,
            height,
        } = self;
        drop(mailbox);
        drop(ledger);
        tracing::info!(height, "Sequencer stopped");

        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    /// Execute a block and seal it
    fn mine(&mut self, transactions: Vec<Transaction>) -> Result<BlockReceipt> {
        let height = self.height;
        let next = height
            .checked_add(1)
            .ok_or_else(|| Error::Overflow("chain height exhausted".to_string()))?;
        let mut hasher = BlockHasher::new(height);
        let mut results = Vec::with_capacity(transactions.len());

        for transaction in transactions {
            let ctx = CallContext::new(transaction.caller, height);
            let result = self
                .ledger
                .execute_in_block(&ctx, &transaction.operation)
                .map(|committed| {
                    hasher.absorb(&committed.changes);
                    committed.value
                });
            results.push(result);
        }

        let sealed = match self.ledger.seal_block(height) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(height, code = err.code(), error = %err, "Failed to seal block");
                false
            }
        };
        self.height = next;

        let receipt = BlockReceipt {
            height,
            results,
            digest: hasher.finalize(),
            sealed,
        };

        tracing::debug!(
            height,
            transactions = receipt.results.len(),
            committed = receipt.committed(),
            digest = %to_hex(&receipt.digest),
            "Block mined"
        );

        Ok(receipt)
    }
}

/// Handle for sending messages to the sequencer
#[derive(Debug, Clone)]
pub struct SequencerHandle {
    sender: mpsc::Sender<SequencerMessage>,
}

impl SequencerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<SequencerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SequencerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Sequencer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Run one operation as its own block
    pub async fn submit(
        &self,
        caller: impl Into<Principal>,
        operation: Operation,
    ) -> Result<Outcome> {
        let transaction = Transaction::new(caller, operation);
        self.request(|response| SequencerMessage::Submit {
            transaction,
            response,
        })
        .await?
    }

    /// Run a batch of transactions at one height
    pub async fn mine_block(&self, transactions: Vec<Transaction>) -> Result<BlockReceipt> {
        self.request(|response| SequencerMessage::MineBlock {
            transactions,
            response,
        })
        .await?
    }

    /// Height the next block will be committed at
    pub async fn height(&self) -> Result<Height> {
        self.request(|response| SequencerMessage::Height { response })
            .await
    }

    /// Stop the actor and wait until it has released the ledger
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response| SequencerMessage::Shutdown { response })
            .await
    }
}

/// Spawn the sequencer actor on the current tokio runtime
pub fn spawn_sequencer<S: KvStore + ?Sized + 'static>(
    ledger: Arc<Ledger<S>>,
    config: &SequencerConfig,
) -> Result<SequencerHandle> {
    let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
    let actor = SequencerActor::new(ledger, rx, config)?;

    tokio::spawn(async move {
        actor.run().await;
    });

    Ok(SequencerHandle::new(tx))
}
