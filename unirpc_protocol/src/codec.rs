use serde::de::DeserializeOwned;
use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString)]
pub enum SerializeType {
    JSON,
    MsgPack,
}

impl SerializeType {
    pub fn content_type(self) -> &'static str {
        match self {
            SerializeType::JSON => "application/json",
            SerializeType::MsgPack => "application/msgpack",
        }
    }

    /// maps a content type string back to a serialize type.
    ///
    /// parameters after `;` (charset etc.) are ignored.
    pub fn from_content_type(ct: &str) -> Option<SerializeType> {
        let essence = ct.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("application/json") {
            Some(SerializeType::JSON)
        } else if essence.eq_ignore_ascii_case("application/msgpack")
            || essence.eq_ignore_ascii_case("application/x-msgpack")
        {
            Some(SerializeType::MsgPack)
        } else {
            None
        }
    }
}

/// encodes a value with the given serialize type.
///
/// stateless and side effect free, safe to use from concurrent calls.
pub fn to_bytes<T>(st: SerializeType, value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    match st {
        SerializeType::JSON => {
            serde_json::to_vec(value).map_err(|err| Error::serialization(st.content_type(), err))
        }
        SerializeType::MsgPack => {
            rmp_serde::to_vec(value).map_err(|err| Error::serialization(st.content_type(), err))
        }
    }
}

/// decodes bytes into a value of the expected type.
pub fn from_slice<T>(st: SerializeType, data: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    match st {
        SerializeType::JSON => {
            serde_json::from_slice(data).map_err(|err| Error::deserialization(st.content_type(), err))
        }
        SerializeType::MsgPack => {
            rmp_serde::from_slice(data).map_err(|err| Error::deserialization(st.content_type(), err))
        }
    }
}
