//! Request/response gateway of a deterministic batch executor.
//!
//! A [`wire::ProcessBatchRequest`] is validated and normalized into a
//! [`request::BatchRequest`], handed to an [`executor::Executor`], and the
//! resulting [`executor::ExecutionResult`] is assembled into a
//! [`wire::ProcessBatchResponse`]. [`service::ExecutorService`] wires these
//! steps together for the unary and the streaming call, and reports the
//! store's flush status.

pub mod codec;
pub mod config;
pub mod env;
pub mod errors;
pub mod executor;
pub mod fs;
pub mod request;
pub mod response;
pub mod server;
pub mod service;
pub mod telemetry;
pub mod tracing;
pub mod transfer;
pub mod wire;

/// Common information for the `--version` CLI flags.
pub fn version() -> String {
    let pkg_name = env!("CARGO_PKG_NAME");
    let pkg_version = env!("CARGO_PKG_VERSION");
    format!("{pkg_name} {pkg_version}")
}

/// Like `#[serde(with = "::hex")]`, but tolerates and emits leading `0x`
/// prefixes
mod hex {
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer, T>(data: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: hex::ToHex,
    {
        let s = data.encode_hex::<String>();
        serializer.serialize_str(&format!("0x{}", s))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, T>(deserializer: D) -> Result<T, D::Error>
    where
        T: hex::FromHex,
        T::Error: std::fmt::Display,
    {
        let s = String::deserialize(deserializer)?;
        match s.strip_prefix("0x") {
            Some(rest) => T::from_hex(rest),
            None => T::from_hex(&*s),
        }
        .map_err(D::Error::custom)
    }

    /// Same as the parent module, for sequences of byte strings.
    pub mod seq {
        use serde::{
            de::Error as _, ser::SerializeSeq as _, Deserialize as _, Deserializer, Serializer,
        };

        pub fn serialize<S: Serializer>(
            data: &[Vec<u8>],
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(data.len()))?;
            for item in data {
                seq.serialize_element(&format!("0x{}", hex::encode(item)))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<Vec<u8>>, D::Error> {
            Vec::<String>::deserialize(deserializer)?
                .into_iter()
                .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom))
                .collect()
        }
    }
}
