use crate::Transaction;

/// Submitted transactions waiting for the next mined block, in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingPool {
    txs: Vec<Transaction>,
}

impl PendingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx: Transaction) {
        self.txs.push(tx);
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.txs
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.txs.clone()
    }

    pub fn clear(&mut self) {
        self.txs = Vec::new();
    }
}
