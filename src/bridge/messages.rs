//! Signal types exchanged between the engine and the bridge relay

use serde::{Deserialize, Serialize};

use crate::token::TokenSettings;

/// Signals sent from the engine to the relay
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// Fetch the current token map and answer with `InitialOrder`
    RequestOrder,

    /// Persist the full updated token map (single write)
    OrderChanged(TokenSettings),

    /// The reset cooldown elapsed; another reset may now run
    ResetComplete,
}

/// Signals sent from the relay to the engine
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum BridgeSignal {
    /// Full current token map, answering `RequestOrder`
    InitialOrder(TokenSettings),
}
