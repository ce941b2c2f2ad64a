//! Common test utilities: serde round-trips, table fixtures and event draining.

/// Helpers shared across test modules.
pub mod serde {
    use std::fmt::Debug;

    /// Assert that a value survives a serde_json round-trip using structural equality.
    pub fn assert_round_trip_eq<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned + PartialEq + Debug,
    {
        let json = serde_json::to_string(value)
            .expect("serialization should succeed during round-trip testing");
        let restored: T = serde_json::from_str(&json)
            .expect("deserialization should succeed during round-trip testing");
        assert_eq!(restored, *value, "serde_json round-trip altered the value");
    }
}

/// Named accounts and amounts for lobby scenarios.
pub mod fixtures {
    use tokio::sync::broadcast;

    use crate::ledger::{Address, LedgerEvent, Wei, WEI_PER_ETHER};

    pub fn bob() -> Address {
        Address::from_low_u64(0xb0b)
    }

    pub fn alice() -> Address {
        Address::from_low_u64(0xa11ce)
    }

    pub fn carol() -> Address {
        Address::from_low_u64(0xca201)
    }

    /// `tenths / 10` ether.
    pub fn ether_tenths(tenths: u128) -> Wei {
        tenths * WEI_PER_ETHER / 10
    }

    /// Everything currently buffered on a subscription.
    pub fn drain(rx: &mut broadcast::Receiver<LedgerEvent>) -> Vec<LedgerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}
