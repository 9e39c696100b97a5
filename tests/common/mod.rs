pub(crate) mod logging;

pub(crate) mod mem_ledger;

pub(crate) mod network;

pub(crate) mod node;
