//! Wallet facade: one mutex, one logical writer.
//!
//! Every public operation serialises on a single internal mutex; the
//! exclusive file lock taken at open keeps other processes out entirely. The
//! in-memory root is wiped when the wallet drops.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use log::{debug, error};

use crate::hd::{self, HdRoot};
use crate::recovery::{self, FileRecoveryLog, RecoveryLog};
use crate::replace::{self, MintTransport, ReplaceError, ReplaceRequest, ReplacedOutput};
use crate::store::{self, OutputRecord, Store, StoredInput};
use crate::types::{Amount, Category, PublicWebcash, SecretWebcash, WalletSecret};
use crate::utils::unix_now;

/// Construction knobs. `change_category` selects the chain used for the
/// change secret reserved during [`Wallet::insert`]; `Mining` reproduces the
/// historical miner bucket, `Change` is the intended default.
#[derive(Clone, Copy, Debug)]
pub struct WalletOptions {
    pub change_category: Category,
}

impl Default for WalletOptions {
    fn default() -> Self {
        WalletOptions {
            change_category: Category::Change,
        }
    }
}

struct WalletInner {
    store: Store,
    log: Box<dyn RecoveryLog>,
    root: HdRoot,
    options: WalletOptions,
}

/// A live wallet: locked files on disk, loaded root in memory.
pub struct Wallet {
    inner: Mutex<WalletInner>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").finish_non_exhaustive()
    }
}

impl Wallet {
    /// Open or create the wallet at `path` (the shared basename of the `.db`
    /// and `.bak` files) with default options.
    pub fn open(path: &Path) -> Result<Wallet> {
        Self::open_with(path, WalletOptions::default())
    }

    /// Open with explicit options, logging recovery lines to the `.bak` file.
    pub fn open_with(path: &Path, options: WalletOptions) -> Result<Wallet> {
        let store = Store::open(path)?;
        let log = Box::new(FileRecoveryLog::open(store.log_path())?);
        Self::assemble(store, log, options)
    }

    /// Open against a caller-supplied recovery log. Lets tests observe or
    /// fail log writes without touching the filesystem contract.
    pub fn open_with_log(
        path: &Path,
        options: WalletOptions,
        log: Box<dyn RecoveryLog>,
    ) -> Result<Wallet> {
        let store = Store::open(path)?;
        Self::assemble(store, log, options)
    }

    fn assemble(
        store: Store,
        mut log: Box<dyn RecoveryLog>,
        options: WalletOptions,
    ) -> Result<Wallet> {
        if options.change_category.flags().is_none() {
            return Err(anyhow!("change category must name a derivation chain"));
        }
        let root = hd::get_or_create_root(store.conn(), log.as_mut(), unix_now())?;
        Ok(Wallet {
            inner: Mutex::new(WalletInner {
                store,
                log,
                root,
                options,
            }),
        })
    }

    fn locked<T>(&self, op: impl FnOnce(&mut WalletInner) -> T) -> Result<T> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("wallet mutex poisoned"))?;
        Ok(op(&mut inner))
    }

    /// Reserve the next secret on the `(mine, sweep)` chain and record it,
    /// recovery log first.
    pub fn reserve_secret(
        &self,
        timestamp: i64,
        amount: Amount,
        mine: bool,
        sweep: bool,
    ) -> Result<WalletSecret> {
        self.locked(|w| {
            hd::reserve_secret(
                w.store.conn(),
                &w.root,
                w.log.as_mut(),
                timestamp,
                amount,
                mine,
                sweep,
            )
        })?
    }

    /// Record a secret the wallet should track, recovery log first. A log
    /// write failure warns loudly but the database insert still runs; the
    /// returned id is the fresh or pre-existing row.
    pub fn add_secret(
        &self,
        timestamp: i64,
        webcash: &SecretWebcash,
        mine: bool,
        sweep: bool,
    ) -> Result<i64> {
        self.locked(|w| w.add_secret(timestamp, webcash, mine, sweep))?
    }

    /// Track an output hash. `secret_id` is `None` when the wallet does not
    /// hold the preimage.
    pub fn add_output(
        &self,
        timestamp: i64,
        public: &PublicWebcash,
        secret_id: Option<i64>,
        spent: bool,
    ) -> Result<i64> {
        self.locked(|w| {
            store::insert_output(
                w.store.conn(),
                timestamp,
                &public.hash,
                secret_id,
                public.amount,
                spent,
            )
        })?
    }

    /// Enumerate tracked outputs, optionally filtered by spent flag.
    pub fn outputs(&self, spent: Option<bool>) -> Result<Vec<OutputRecord>> {
        self.locked(|w| store::outputs(w.store.conn(), spent))?
    }

    /// Unspent value per category.
    pub fn balances(&self) -> Result<std::collections::HashMap<Category, Amount>> {
        self.locked(|w| store::balances(w.store.conn()))?
    }

    /// Total unspent value.
    pub fn unspent_total(&self) -> Result<Amount> {
        self.locked(|w| store::unspent_total(w.store.conn()))?
    }

    pub fn have_accepted_terms(&self) -> Result<bool> {
        self.locked(|w| store::have_accepted_terms(w.store.conn()))?
    }

    pub fn are_terms_accepted(&self, body: &str) -> Result<bool> {
        self.locked(|w| store::are_terms_accepted(w.store.conn(), body))?
    }

    /// Record acceptance of `body`. Idempotent.
    pub fn accept_terms(&self, timestamp: i64, body: &str) -> Result<()> {
        self.locked(|w| store::accept_terms(w.store.conn(), timestamp, body))?
    }

    /// Swap the outputs named by `input_ids` for `new_outputs` through the
    /// mint. On any failure before a 200 response the ledger is untouched;
    /// after a 200 the exchange is recorded row by row.
    pub fn replace(
        &self,
        transport: &dyn MintTransport,
        input_ids: &[i64],
        new_outputs: &[SecretWebcash],
    ) -> Result<Vec<ReplacedOutput>, ReplaceError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ReplaceError::Database(anyhow!("wallet mutex poisoned")))?;
        inner.replace(transport, input_ids, new_outputs)
    }

    /// Sweep a received (or self-mined) claim code into a wallet-controlled
    /// secret of equal value: track the incoming secret and output, reserve a
    /// change secret on the configured chain, and replace one for the other.
    /// Returns the claim code the wallet now exclusively controls.
    pub fn insert(
        &self,
        transport: &dyn MintTransport,
        incoming: &SecretWebcash,
        mining_income: bool,
    ) -> Result<SecretWebcash, ReplaceError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ReplaceError::Database(anyhow!("wallet mutex poisoned")))?;
        inner.insert(transport, incoming, mining_income)
    }
}

impl WalletInner {
    fn add_secret(
        &mut self,
        timestamp: i64,
        webcash: &SecretWebcash,
        mine: bool,
        sweep: bool,
    ) -> Result<i64> {
        let line = recovery::secret_line(timestamp, Category::from_flags(mine, sweep), webcash);
        recovery::append_or_warn(self.log.as_mut(), &line);
        store::insert_secret(self.store.conn(), timestamp, &webcash.sk, mine, sweep)
    }

    fn replace(
        &mut self,
        transport: &dyn MintTransport,
        input_ids: &[i64],
        new_outputs: &[SecretWebcash],
    ) -> Result<Vec<ReplacedOutput>, ReplaceError> {
        let conn = self.store.conn();

        let mut inputs: Vec<StoredInput> = Vec::with_capacity(input_ids.len());
        for &id in input_ids {
            let input = store::load_input(conn, id)
                .map_err(ReplaceError::Database)?
                .ok_or(ReplaceError::UnknownInput(id))?;
            inputs.push(input);
        }

        let input_webcash = replace::validate(&inputs, new_outputs)?;
        let request = ReplaceRequest::new(&input_webcash, new_outputs);
        debug!(
            "replacing {} inputs with {} outputs via the mint",
            inputs.len(),
            new_outputs.len()
        );
        replace::submit(transport, &request)?;

        // The mint has committed; from here every row change stands alone so
        // one failure leaves the wallet under-informed, not wrong-valued.
        let timestamp = unix_now();
        for input in &inputs {
            if let Err(err) = store::mark_output_spent(conn, input.output_id) {
                error!(
                    "replacement committed but output {} could not be marked spent: {err:#}",
                    input.output_id
                );
            }
        }

        let mut replaced = Vec::with_capacity(new_outputs.len());
        for output in new_outputs {
            let secret_id = match store::lookup_secret_id(conn, &output.sk) {
                Ok(id) => id,
                Err(err) => {
                    error!("unable to resolve secret for replacement output: {err:#}");
                    None
                }
            };
            let public = PublicWebcash::from_secret(output);
            match store::insert_output(conn, timestamp, &public.hash, secret_id, output.amount, false)
            {
                Ok(output_id) => replaced.push(ReplacedOutput {
                    secret: output.clone(),
                    output_id,
                }),
                Err(err) => {
                    error!("replacement committed but output {public} could not be recorded: {err:#}");
                }
            }
        }
        Ok(replaced)
    }

    fn insert(
        &mut self,
        transport: &dyn MintTransport,
        incoming: &SecretWebcash,
        mining_income: bool,
    ) -> Result<SecretWebcash, ReplaceError> {
        let timestamp = unix_now();

        // Track the incoming claim: sweepable, ours only if we minted it.
        let secret_id = self
            .add_secret(timestamp, incoming, mining_income, true)
            .map_err(ReplaceError::Database)?;
        let public = PublicWebcash::from_secret(incoming);
        let input_id = store::insert_output(
            self.store.conn(),
            timestamp,
            &public.hash,
            Some(secret_id),
            incoming.amount,
            false,
        )
        .map_err(ReplaceError::Database)?;

        // Checked at open: the change category always names a chain.
        let (mine, sweep) = self
            .options
            .change_category
            .flags()
            .ok_or_else(|| ReplaceError::Database(anyhow!("change category has no chain")))?;
        let change = hd::reserve_secret(
            self.store.conn(),
            &self.root,
            self.log.as_mut(),
            timestamp,
            incoming.amount,
            mine,
            sweep,
        )
        .map_err(ReplaceError::Database)?;
        let change_webcash = change.to_webcash(incoming.amount);

        self.replace(transport, &[input_id], std::slice::from_ref(&change_webcash))?;
        Ok(change_webcash)
    }
}
