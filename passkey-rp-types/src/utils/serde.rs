//! Utilities to be used in serde derives for more robust (de)serializations.

use serde::{Deserialize, Deserializer};

/// Many fields in the webauthn spec have the following wording.
///
/// > The values SHOULD be members of `T` but client platforms MUST ignore unknown values.
///
/// This method is a simple way of ignoring unknown values without failing deserialization.
pub(crate) fn ignore_unknown<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(T::deserialize(de).unwrap_or_default())
}

/// Deserialize an optional list, dropping the entries that are not members of `T`.
///
/// Relying parties SHOULD accept and store unknown transports, but keeping them typed is more
/// useful than failing the whole registration over a transport a newer browser invented.
pub(crate) fn ignore_unknown_opt_vec<'de, D, T>(de: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let values: Option<Vec<serde_json::Value>> = Option::deserialize(de)?;
    Ok(values.map(|values| {
        values
            .into_iter()
            .filter_map(|value| T::deserialize(value).ok())
            .collect()
    }))
}

/// Some clients stringify numbers such as `timeout`, accept both forms.
pub(crate) fn maybe_stringified<'de, D>(de: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    Ok(match Option::<NumberOrString>::deserialize(de)? {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::String(s)) => s.parse().ok(),
        None => None,
    })
}

/// Deserialize a list, dropping the entries that are not members of `T`.
pub(crate) fn ignore_unknown_vec<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(ignore_unknown_opt_vec(de)?.unwrap_or_default())
}

/// (De)serialize a COSE algorithm as its registered integer, which is what browsers expect in
/// `pubKeyCredParams`.
pub(crate) mod i64_to_iana {
    use coset::iana::EnumI64;

    pub fn serialize<S, T>(value: &T, ser: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: EnumI64,
    {
        ser.serialize_i64(value.to_i64())
    }

    pub fn deserialize<'de, D, T>(de: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: EnumI64,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum NumberOrString {
            Number(i64),
            String(String),
        }

        let value = match <NumberOrString as serde::Deserialize>::deserialize(de)? {
            NumberOrString::Number(n) => n,
            NumberOrString::String(s) => s.parse().map_err(|_| {
                <D::Error as serde::de::Error>::invalid_value(
                    serde::de::Unexpected::Str(&s),
                    &"A stringified COSE algorithm identifier",
                )
            })?,
        };

        T::from_i64(value).ok_or_else(|| {
            <D::Error as serde::de::Error>::invalid_value(
                serde::de::Unexpected::Signed(value),
                &"An iana::Algorithm value",
            )
        })
    }
}
