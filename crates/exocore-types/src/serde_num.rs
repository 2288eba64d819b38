//! Deserializers for protobuf-JSON integers.
//!
//! Cosmos JSON encodes 64-bit integers as strings (`"42"`) while hand-written
//! fixtures often use plain numbers. These helpers accept both.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::Deserializer;
use serde::de::{self, Visitor};

struct StringOrNumber<T>(PhantomData<T>);

impl<T> Visitor<'_> for StringOrNumber<T>
where
    T: FromStr + TryFrom<i64> + TryFrom<u64>,
    <T as FromStr>::Err: fmt::Display,
{
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or a string holding an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        v.trim().parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<T, E> {
        T::try_from(v).map_err(|_err| E::custom(format!("integer {v} out of range")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<T, E> {
        T::try_from(v).map_err(|_err| E::custom(format!("integer {v} out of range")))
    }
}

/// Deserialize an `i64` from a JSON string or number.
pub fn i64_str<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(StringOrNumber::<i64>(PhantomData))
}

/// Deserialize a `u64` from a JSON string or number.
pub fn u64_str<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    deserializer.deserialize_any(StringOrNumber::<u64>(PhantomData))
}

/// Deserialize a `u32` from a JSON string or number.
pub fn u32_str<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    deserializer.deserialize_any(StringOrNumber::<u32>(PhantomData))
}
