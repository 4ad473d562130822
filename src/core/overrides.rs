// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line macro store.
//!
//! Holds `NAME` and `NAME=VALUE` entries from `-D` flags and the
//! environment. Definedness backs `%ifdef`; numeric values shadow symbol
//! resolution while a branch condition is evaluated.

use std::collections::HashMap;

use crate::core::macros::is_valid_name;
use crate::core::number::parse_number;

#[derive(Debug, Clone, Default)]
pub struct MacroOverrides {
    entries: HashMap<String, Option<String>>,
}

impl MacroOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw entry texts, validating each one.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        for entry in entries {
            store.add_entry(entry.as_ref())?;
        }
        Ok(store)
    }

    /// Add one `NAME` or `NAME=VALUE` entry. Later entries override
    /// earlier ones of the same name.
    pub fn add_entry(&mut self, entry: &str) -> Result<(), String> {
        let entry = entry.trim();
        let (name, value) = match entry.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
            None => (entry, None),
        };
        if !is_valid_name(name) {
            return Err(format!(
                "Invalid macro definition '{entry}': expected NAME or NAME=VALUE"
            ));
        }
        self.entries.insert(name.to_string(), value);
        Ok(())
    }

    pub fn insert(&mut self, name: &str, value: Option<String>) {
        self.entries.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The entry's value parsed as a number, when it has one and it
    /// parses. Value-less and non-numeric entries define the name only.
    pub fn numeric_value(&self, name: &str) -> Option<i64> {
        let value = self.entries.get(name)?.as_deref()?;
        parse_number(value).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
