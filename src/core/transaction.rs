// Value transfers under the UTXO model. A transaction consumes outputs recorded
// earlier on the ledger and creates new ones; a coinbase transaction consumes
// nothing and mints the fixed block reward.

use crate::core::{Ledger, BLOCK_REWARD};
use crate::error::{LedgerError, Result};
use crate::utils::{
    deserialize, ecdsa_sign, ecdsa_verify, hash_pub_key, public_key_xy, serialize, sha256_digest,
};
use crate::wallet::Wallet;
use data_encoding::{HEXLOWER, HEXUPPER};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Output index carried by the sentinel input of a coinbase transaction
pub const COINBASE_VOUT: i64 = -1;

/// Referenced transactions keyed by their hex encoded id
pub type PrevTransactions = HashMap<String, Transaction>;

/// A reference to an earlier output plus the proof that the spender owns it.
/// For a coinbase input `txid` is empty, `vout` is [`COINBASE_VOUT`] and
/// `pub_key` holds free-form data.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: i64,
    signature: Vec<u8>,
    pub_key: Vec<u8>,
}

impl TXInput {
    pub fn new(txid: &[u8], vout: usize, pub_key: &[u8]) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout: vout as i64,
            signature: vec![],
            pub_key: pub_key.to_vec(),
        }
    }

    /// The sentinel input of a coinbase transaction carrying `data`
    pub fn coinbase(data: &[u8]) -> TXInput {
        TXInput {
            txid: vec![],
            vout: COINBASE_VOUT,
            signature: vec![],
            pub_key: data.to_vec(),
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    /// The referenced output index, `None` for the coinbase sentinel
    pub fn output_index(&self) -> Option<usize> {
        usize::try_from(self.vout).ok()
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        hash_pub_key(self.pub_key.as_slice()) == pub_key_hash
    }
}

/// An amount locked to the hash of a public key
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXOutput {
    value: u64,
    pub_key_hash: Vec<u8>,
}

impl TXOutput {
    pub fn new(value: u64, pub_key_hash: &[u8]) -> TXOutput {
        TXOutput {
            value,
            pub_key_hash: pub_key_hash.to_vec(),
        }
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash == pub_key_hash
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Assembles an unsigned transaction and stamps its id
    pub fn new(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Result<Transaction> {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Mints [`BLOCK_REWARD`] to `miner_pub_key_hash`. `data` is stored in the
    /// sentinel input; when empty a random payload keeps the id unique.
    pub fn new_coinbase_tx(miner_pub_key_hash: &[u8], data: &[u8]) -> Result<Transaction> {
        let payload = if data.is_empty() {
            Uuid::new_v4().as_bytes().to_vec()
        } else {
            data.to_vec()
        };
        Transaction::new(
            vec![TXInput::coinbase(&payload)],
            vec![TXOutput::new(BLOCK_REWARD, miner_pub_key_hash)],
        )
    }

    /// Builds and signs a transfer of `amount` from the wallet's own outputs.
    /// Outputs are picked first-fit in ledger scan order; any surplus comes
    /// back to the sender as a change output.
    pub fn new_utxo_transaction(
        sender: &Wallet,
        to_pub_key_hash: &[u8],
        amount: u64,
        ledger: &Ledger,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::Transaction(
                "Amount must be positive".to_string(),
            ));
        }

        let from_pub_key_hash = sender.get_pub_key_hash();
        let (selected, accumulated) =
            ledger.find_spendable_outputs(&from_pub_key_hash, amount)?;
        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let inputs = selected
            .iter()
            .map(|utxo| TXInput::new(&utxo.txid, utxo.index, sender.get_public_key()))
            .collect();

        let mut outputs = vec![TXOutput::new(amount, to_pub_key_hash)];
        if accumulated > amount {
            outputs.push(TXOutput::new(accumulated - amount, &from_pub_key_hash));
        }

        let mut tx = Transaction::new(inputs, outputs)?;
        ledger.sign_transaction(&mut tx, sender.get_pkcs8())?;
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_empty() && self.vin[0].vout == COINBASE_VOUT
    }

    /// SHA-256 of the encoded transaction with the id field left out
    pub fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(&tx_copy.serialize()?))
    }

    fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .vin
            .iter()
            .map(|input| TXInput {
                txid: input.txid.clone(),
                vout: input.vout,
                signature: vec![],
                pub_key: vec![],
            })
            .collect();
        Transaction {
            id: vec![],
            vin: inputs,
            vout: self.vout.clone(),
        }
    }

    /// The digest input `index` is signed over: the trimmed transaction with
    /// only that input's key field holding the referenced output's key hash.
    pub fn signable_digest(&self, index: usize, prev_pub_key_hash: &[u8]) -> Result<Vec<u8>> {
        let mut trimmed = self.trimmed_copy();
        let input = trimmed.vin.get_mut(index).ok_or_else(|| {
            LedgerError::Transaction(format!("Input index {index} out of range"))
        })?;
        input.pub_key = prev_pub_key_hash.to_vec();
        trimmed.hash()
    }

    fn referenced_output<'a>(
        input: &TXInput,
        prev_txs: &'a PrevTransactions,
    ) -> Result<&'a TXOutput> {
        let txid_hex = HEXLOWER.encode(input.get_txid());
        let prev_tx = prev_txs
            .get(&txid_hex)
            .ok_or(LedgerError::UnresolvedReference(txid_hex))?;
        input
            .output_index()
            .and_then(|index| prev_tx.vout.get(index))
            .ok_or_else(|| {
                LedgerError::Transaction(format!(
                    "Invalid output index {} into {}",
                    input.vout,
                    HEXLOWER.encode(prev_tx.get_id())
                ))
            })
    }

    /// Signs every input and stores the signer's raw X||Y public key in it
    pub fn sign(&mut self, pkcs8: &[u8], prev_txs: &PrevTransactions) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        let public_key = public_key_xy(pkcs8)?;

        let mut signatures = Vec::with_capacity(self.vin.len());
        for (idx, vin) in self.vin.iter().enumerate() {
            let prev_output = Self::referenced_output(vin, prev_txs)?;
            let digest = self.signable_digest(idx, prev_output.get_pub_key_hash())?;
            debug!("Signing input {idx} over {}", HEXLOWER.encode(&digest));
            signatures.push(ecdsa_sign(pkcs8, &digest)?);
        }

        for (vin, signature) in self.vin.iter_mut().zip(signatures) {
            vin.signature = signature;
            vin.pub_key = public_key.clone();
        }
        Ok(())
    }

    /// A coinbase is valid as is. Any other transaction is valid when every
    /// input's signature checks out against its own signable digest.
    pub fn verify(&self, prev_txs: &PrevTransactions) -> bool {
        if self.is_coinbase() {
            return true;
        }

        for (idx, vin) in self.vin.iter().enumerate() {
            let prev_output = match Self::referenced_output(vin, prev_txs) {
                Ok(output) => output,
                Err(e) => {
                    error!(
                        "Cannot verify transaction {}: {e}",
                        HEXLOWER.encode(&self.id)
                    );
                    return false;
                }
            };
            let digest = match self.signable_digest(idx, prev_output.get_pub_key_hash()) {
                Ok(digest) => digest,
                Err(e) => {
                    error!("Cannot compute digest for input {idx}: {e}");
                    return false;
                }
            };
            if !ecdsa_verify(vin.get_pub_key(), vin.get_signature(), &digest) {
                return false;
            }
        }
        true
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn output_value(&self) -> Option<u64> {
        self.vout
            .iter()
            .try_fold(0u64, |total, out| total.checked_add(out.get_value()))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Transaction {}", HEXLOWER.encode(&self.id))?;
        for (i, input) in self.vin.iter().enumerate() {
            writeln!(f, "   Input {i}:")?;
            writeln!(f, "     TXID      {}", HEXLOWER.encode(&input.txid))?;
            writeln!(f, "     Out       {}", input.vout)?;
            writeln!(f, "     Signature {}", HEXUPPER.encode(&input.signature))?;
            writeln!(f, "     PubKey    {}", HEXLOWER.encode(&input.pub_key))?;
        }
        for (i, output) in self.vout.iter().enumerate() {
            writeln!(f, "   Output {i}:")?;
            writeln!(
                f,
                "     Value     {}",
                crate::core::monetary::units_to_coins(output.value)
            )?;
            write!(f, "     Script    {}", HEXUPPER.encode(&output.pub_key_hash))?;
            if i + 1 < self.vout.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funding_tx(owner: &Wallet, value: u64) -> Transaction {
        let mut tx = Transaction {
            id: vec![],
            vin: vec![TXInput::new(b"earlier", 0, b"")],
            vout: vec![
                TXOutput::new(1, &[0u8; 20]),
                TXOutput::new(value, &owner.get_pub_key_hash()),
            ],
        };
        tx.id = tx.hash().unwrap();
        tx
    }

    fn spend(owner: &Wallet, funding: &Transaction, to: &[u8]) -> (Transaction, PrevTransactions) {
        let mut tx = Transaction {
            id: vec![],
            vin: vec![TXInput::new(funding.get_id(), 1, owner.get_public_key())],
            vout: vec![TXOutput::new(40, to), TXOutput::new(60, &owner.get_pub_key_hash())],
        };
        tx.id = tx.hash().unwrap();

        let mut prev_txs = PrevTransactions::new();
        prev_txs.insert(HEXLOWER.encode(funding.get_id()), funding.clone());
        tx.sign(owner.get_pkcs8(), &prev_txs).unwrap();
        (tx, prev_txs)
    }

    #[test]
    fn test_coinbase_shape() {
        let miner = Wallet::new().unwrap();
        let tx = Transaction::new_coinbase_tx(&miner.get_pub_key_hash(), b"hello").unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.get_vin()[0].get_vout(), COINBASE_VOUT);
        assert!(tx.get_vin()[0].get_txid().is_empty());
        assert!(tx.get_vin()[0].get_signature().is_empty());
        assert_eq!(tx.get_vin()[0].get_pub_key(), b"hello");
        assert_eq!(tx.output_value(), Some(BLOCK_REWARD));
        assert!(tx.get_vout()[0].is_locked_with_key(&miner.get_pub_key_hash()));
        assert!(tx.verify(&PrevTransactions::new()));
    }

    #[test]
    fn test_coinbase_without_data_gets_unique_id() {
        let pkh = [1u8; 20];
        let first = Transaction::new_coinbase_tx(&pkh, b"").unwrap();
        let second = Transaction::new_coinbase_tx(&pkh, b"").unwrap();
        assert_ne!(first.get_id(), second.get_id());
    }

    #[test]
    fn test_id_is_deterministic_and_content_bound() {
        let tx = Transaction::new_coinbase_tx(&[2u8; 20], b"same").unwrap();
        assert_eq!(tx.hash().unwrap(), tx.get_id());
        assert_eq!(tx.hash().unwrap(), tx.hash().unwrap());

        let mut changed_output = tx.clone();
        changed_output.vout[0].value += 1;
        assert_ne!(changed_output.hash().unwrap(), tx.get_id());

        let mut changed_input = tx.clone();
        changed_input.vin[0].pub_key = b"different".to_vec();
        assert_ne!(changed_input.hash().unwrap(), tx.get_id());
    }

    #[test]
    fn test_id_ignores_the_id_field() {
        let tx = Transaction::new_coinbase_tx(&[3u8; 20], b"data").unwrap();
        let mut relabelled = tx.clone();
        relabelled.id = b"anything".to_vec();
        assert_eq!(relabelled.hash().unwrap(), tx.hash().unwrap());
    }

    #[test]
    fn test_sign_then_verify() {
        let owner = Wallet::new().unwrap();
        let funding = funding_tx(&owner, 100);
        let (tx, prev_txs) = spend(&owner, &funding, &[4u8; 20]);

        assert!(!tx.is_coinbase());
        assert_eq!(tx.get_vin()[0].get_pub_key(), owner.get_public_key());
        assert_eq!(tx.get_vin()[0].get_signature().len(), crate::utils::SIGNATURE_LEN);
        assert!(tx.verify(&prev_txs));
    }

    #[test]
    fn test_mutated_output_fails_verification() {
        let owner = Wallet::new().unwrap();
        let funding = funding_tx(&owner, 100);
        let (mut tx, prev_txs) = spend(&owner, &funding, &[4u8; 20]);

        tx.vout[0].value = 99;
        assert!(!tx.verify(&prev_txs));
    }

    #[test]
    fn test_foreign_key_fails_verification() {
        let owner = Wallet::new().unwrap();
        let thief = Wallet::new().unwrap();
        let funding = funding_tx(&owner, 100);
        let (mut tx, prev_txs) = spend(&owner, &funding, &[4u8; 20]);

        tx.vin[0].pub_key = thief.get_public_key().to_vec();
        assert!(!tx.verify(&prev_txs));
    }

    #[test]
    fn test_missing_previous_transaction_fails_verification() {
        let owner = Wallet::new().unwrap();
        let funding = funding_tx(&owner, 100);
        let (tx, _) = spend(&owner, &funding, &[4u8; 20]);
        assert!(!tx.verify(&PrevTransactions::new()));
    }

    #[test]
    fn test_sign_with_missing_reference_is_unresolved() {
        let owner = Wallet::new().unwrap();
        let mut tx = Transaction {
            id: vec![],
            vin: vec![TXInput::new(b"nowhere", 0, owner.get_public_key())],
            vout: vec![TXOutput::new(1, &[5u8; 20])],
        };
        tx.id = tx.hash().unwrap();

        assert!(matches!(
            tx.sign(owner.get_pkcs8(), &PrevTransactions::new()),
            Err(LedgerError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_signable_digests_isolate_inputs() {
        let owner = Wallet::new().unwrap();
        let funding = funding_tx(&owner, 100);
        let mut tx = Transaction {
            id: vec![],
            vin: vec![
                TXInput::new(funding.get_id(), 0, owner.get_public_key()),
                TXInput::new(funding.get_id(), 1, owner.get_public_key()),
            ],
            vout: vec![TXOutput::new(101, &[6u8; 20])],
        };
        tx.id = tx.hash().unwrap();
        let pkh = owner.get_pub_key_hash();

        let first = tx.signable_digest(0, &pkh).unwrap();
        let second = tx.signable_digest(1, &pkh).unwrap();
        assert_ne!(first, second);
        // Signatures already present do not feed into the digest
        let mut prev_txs = PrevTransactions::new();
        prev_txs.insert(HEXLOWER.encode(funding.get_id()), funding.clone());
        tx.sign(owner.get_pkcs8(), &prev_txs).unwrap();
        assert_eq!(tx.signable_digest(0, &pkh).unwrap(), first);
        assert!(tx.signable_digest(2, &pkh).is_err());
    }

    #[test]
    fn test_display_lists_inputs_and_outputs() {
        let tx = Transaction::new_coinbase_tx(&[7u8; 20], b"printer").unwrap();
        let rendered = tx.to_string();
        assert!(rendered.contains(&HEXLOWER.encode(tx.get_id())));
        assert!(rendered.contains("Input 0"));
        assert!(rendered.contains("Value     12.5"));
    }
}
