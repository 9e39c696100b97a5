/*
    Copyright © 2024, QuorumShard Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The static parameters of a node.

use ed25519_dalek::SigningKey;
use typed_builder::TypedBuilder;

use crate::types::basic::NodeAddress;

/// Stores the user-defined parameters required to start the node, that is:
/// 1. The node's keypair, used to sign votes. The node's wallet address is derived from
///    its public key.
/// 2. The node's own network address, as it appears in the shard topology's member lists.
/// 3. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Log Events
///
/// Logging goes through the [log](https://docs.rs/log/latest/log/) crate. To get these
/// messages printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.address(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the node's keypair, used to sign votes. Required."))]
    pub me: SigningKey,
    #[builder(setter(doc = "Set the node's own network address. Required."))]
    pub address: NodeAddress,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}
