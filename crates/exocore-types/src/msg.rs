//! Decoded transaction messages.
//!
//! Only a handful of message kinds matter to the indexer: parameter updates
//! that emit no event of their own. Everything else maps to [`Msg::Other`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const ASSETS_UPDATE_PARAMS: &str = "/exocore.assets.v1.MsgUpdateParams";
const DOGFOOD_UPDATE_PARAMS: &str = "/exocore.dogfood.v1.MsgUpdateParams";
const EXOMINT_UPDATE_PARAMS: &str = "/exocore.exomint.v1.MsgUpdateParams";

/// A transaction message, classified by its type URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// `x/assets` parameter update.
    AssetsUpdateParams,
    /// `x/dogfood` parameter update.
    DogfoodUpdateParams,
    /// `x/exomint` parameter update.
    ExomintUpdateParams,
    /// Any other message.
    Other {
        /// The message's type URL.
        type_url: String,
    },
}

impl Msg {
    /// Classify a message by its type URL.
    pub fn from_type_url(type_url: &str) -> Self {
        match type_url {
            ASSETS_UPDATE_PARAMS => Self::AssetsUpdateParams,
            DOGFOOD_UPDATE_PARAMS => Self::DogfoodUpdateParams,
            EXOMINT_UPDATE_PARAMS => Self::ExomintUpdateParams,
            other => Self::Other {
                type_url: other.to_owned(),
            },
        }
    }

    /// The type URL this message was decoded from.
    pub fn type_url(&self) -> &str {
        match self {
            Self::AssetsUpdateParams => ASSETS_UPDATE_PARAMS,
            Self::DogfoodUpdateParams => DOGFOOD_UPDATE_PARAMS,
            Self::ExomintUpdateParams => EXOMINT_UPDATE_PARAMS,
            Self::Other { type_url } => type_url,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawMsg {
    #[serde(rename = "@type")]
    type_url: String,
}

impl Serialize for Msg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawMsg {
            type_url: self.type_url().to_owned(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Msg {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawMsg::deserialize(deserializer)?;
        Ok(Self::from_type_url(&raw.type_url))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_type_url() {
        let msg: Msg =
            serde_json::from_str(r#"{"@type":"/exocore.exomint.v1.MsgUpdateParams","authority":"x"}"#)
                .unwrap();
        assert_eq!(msg, Msg::ExomintUpdateParams);

        let other: Msg = serde_json::from_str(r#"{"@type":"/cosmos.bank.v1beta1.MsgSend"}"#).unwrap();
        assert_eq!(other.type_url(), "/cosmos.bank.v1beta1.MsgSend");
    }
}
