//! # Format Options
//!
//! Some [`System`]s accept additional configuration that changes how they pair or score. An
//! example would be including a match for the third place in a single elimination tournament,
//! or the number of points awarded for a bye in a swiss tournament.
//!
//! This module provides this kind of configuration via [`TournamentOption`] using a key-value map.
//! [`OptionValue`] contains all types supported. Every [`System`] describes the options it
//! accepts with a [`TournamentOptions`] list, user supplied [`TournamentOptionValues`] are
//! validated against that list with [`TournamentOptionValues::merge`].
//!
//! [`System`]: crate::System
#[cfg(feature = "serde")]
mod serde_impl;

use std::collections::{
    hash_map::{Iter, Keys},
    HashMap,
};

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unknown option {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: expected {expected}, found {found}")]
    InvalidValue {
        key: String,
        found: &'static str,
        expected: &'static str,
    },
    #[error("invalid value {value} for {key}")]
    UnknownValue { key: String, value: String },
}

/// A list of optional values for a tournament. `TournamentOptions` includes the names and should
/// be used to describe a list of options. [`TournamentOptionValues`] should be used when just
/// expecting a list of key-value pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TournamentOptions(HashMap<String, TournamentOption>);

impl TournamentOptions {
    /// Creates a new [`Builder`].
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns the option with the given `key`. Returns `None` if the given key does not exist
    pub fn get(&self, key: &str) -> Option<&TournamentOption> {
        self.0.get(key)
    }

    /// Inserts a new [`TournamentOption`] with the provided `key`, overwriting the previous value
    /// if it exists.
    pub fn insert<K>(&mut self, key: K, option: TournamentOption)
    where
        K: ToString,
    {
        self.0.insert(key.to_string(), option);
    }

    /// Returns an iterator over all keys.
    pub fn keys(&self) -> Keys<'_, String, TournamentOption> {
        self.0.keys()
    }

    /// Returns an iterator over all [`TournamentOption`]s.
    pub fn iter(&self) -> Iter<'_, String, TournamentOption> {
        self.0.iter()
    }

    /// Returns all options sorted by key.
    pub fn sorted(&self) -> Vec<(&str, &TournamentOption)> {
        let mut options: Vec<_> = self.0.iter().map(|(k, v)| (k.as_str(), v)).collect();
        options.sort_by_key(|(key, _)| *key);
        options
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<TournamentOptions> for TournamentOptionValues {
    fn from(this: TournamentOptions) -> Self {
        Self(
            this.0
                .into_iter()
                .map(|(key, option)| (key, option.value))
                .collect(),
        )
    }
}

/// A list of optional key-values for a tournament which only contains the values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TournamentOptionValues(HashMap<String, OptionValue>);

impl TournamentOptionValues {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the [`OptionValue`] with the given `key`. Returns `None` if no value exist for the
    /// given `key`.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: ToString,
        V: Into<OptionValue>,
    {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn iter(&self) -> Iter<'_, String, OptionValue> {
        self.0.iter()
    }

    /// Returns the `bool` stored under `key`, or `default` if the key is missing or holds a
    /// value of another type.
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(OptionValue::Bool(val)) => *val,
            _ => default,
        }
    }

    /// Returns the `u64` stored under `key`, or `default` if the key is missing or holds a
    /// value of another type.
    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        match self.0.get(key) {
            Some(OptionValue::U64(val)) => *val,
            _ => default,
        }
    }

    /// Validates `self` against the accepted `options` and fills every missing key with the
    /// option's default.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if `self` contains a key that `options` does not know, or a value
    /// whose type differs from the default value's type.
    pub fn merge(mut self, options: TournamentOptions) -> Result<Self, Error> {
        for (key, value) in self.0.iter() {
            let default_value = match options.0.get(key) {
                Some(option) => &option.value,
                None => return Err(Error::UnknownKey(key.to_owned())),
            };

            if default_value.value_type() != value.value_type() {
                return Err(Error::InvalidValue {
                    key: key.to_owned(),
                    found: value.value_type(),
                    expected: default_value.value_type(),
                });
            }
        }

        // Fill the unassigned fields with defaults.
        for (key, option) in options.0.into_iter() {
            self.0.entry(key).or_insert(option.value);
        }

        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TournamentOption {
    pub name: String,
    pub value: OptionValue,
}

/// The value of a [`TournamentOption`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    String(String),
}

impl OptionValue {
    /// Returns the name of the type of this value.
    pub fn value_type(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::String(_) => "string",
        }
    }

    /// Parses `input` into a value of the same type as `self`.
    ///
    /// Used when values come from a command line or an environment variable.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tourney_core::options::OptionValue;
    /// let default = OptionValue::U64(3);
    /// assert_eq!(default.parse_as("5"), Some(OptionValue::U64(5)));
    /// assert_eq!(default.parse_as("yes"), None);
    /// ```
    pub fn parse_as(&self, input: &str) -> Option<Self> {
        match self {
            Self::Bool(_) => input.parse().ok().map(Self::Bool),
            Self::I64(_) => input.parse().ok().map(Self::I64),
            Self::U64(_) => input.parse().ok().map(Self::U64),
            Self::String(_) => Some(Self::String(input.to_owned())),
        }
    }
}

impl From<bool> for OptionValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<u64> for OptionValue {
    #[inline]
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl<'a> From<&'a str> for OptionValue {
    #[inline]
    fn from(value: &'a str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for OptionValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A builder for [`TournamentOptions`].
#[derive(Clone, Debug, Default)]
pub struct Builder {
    options: TournamentOptions,
}

impl Builder {
    /// Inserts a new [`TournamentOption`]. If the `key` already exists, it is overwritten.
    pub fn option<T, V>(mut self, key: &'static str, name: T, value: V) -> Self
    where
        T: ToString,
        V: Into<OptionValue>,
    {
        self.options.insert(
            key,
            TournamentOption {
                name: name.to_string(),
                value: value.into(),
            },
        );
        self
    }

    /// Consumes the `Builder`, returning the collected [`TournamentOptions`].
    #[inline]
    pub fn build(self) -> TournamentOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use crate::option_values;

    use super::{Error, OptionValue, TournamentOptions};

    fn options() -> TournamentOptions {
        TournamentOptions::builder()
            .option("third_place_match", "Include a match for third place.", false)
            .option("score_win", "Points for a win.", 3u64)
            .build()
    }

    #[test]
    fn test_merge_fills_defaults() {
        let values = option_values!("third_place_match" => true)
            .merge(options())
            .unwrap();

        assert_eq!(values.get("third_place_match"), Some(&OptionValue::Bool(true)));
        assert_eq!(values.get("score_win"), Some(&OptionValue::U64(3)));
        assert!(values.bool_or("third_place_match", false));
        assert_eq!(values.u64_or("score_win", 0), 3);
    }

    #[test]
    fn test_merge_rejects_unknown_key() {
        let res = option_values!("rounds" => 5u64).merge(options());
        assert_eq!(res, Err(Error::UnknownKey(String::from("rounds"))));
    }

    #[test]
    fn test_merge_rejects_wrong_type() {
        let res = option_values!("score_win" => true).merge(options());
        assert_eq!(
            res,
            Err(Error::InvalidValue {
                key: String::from("score_win"),
                found: "bool",
                expected: "u64",
            })
        );
    }

    #[test]
    fn test_sorted() {
        let options = options();
        let keys: Vec<_> = options.sorted().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["score_win", "third_place_match"]);
    }
}
