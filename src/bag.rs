use serde::{Deserialize, Serialize};

use crate::error::NnError;
use crate::tensor::{handle, Tensor, TensorHandle};

/// Ordered, name-keyed collection of owned tensors held by a layer
/// (spec §3/§4.2, C2). Insertion order is preserved for serialization;
/// lookup is linear, which is fine for the handful of entries ("x", "y",
/// "W", "b", ...) any one bag ever holds.
#[derive(Clone, Debug)]
pub struct NamedTensorBag {
    display_name: String,
    entries: Vec<(String, TensorHandle)>,
}

impl NamedTensorBag {
    pub fn new(display_name: impl Into<String>) -> Self {
        NamedTensorBag {
            display_name: display_name.into(),
            entries: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == name)
    }

    /// Appends a zero-initialized `(rows, cols)` tensor under `name`.
    pub fn add(&mut self, name: &str, rows: usize, cols: usize) -> Result<TensorHandle, NnError> {
        if self.position(name).is_some() {
            return Err(NnError::DuplicateKey(name.to_string(), self.display_name.clone()));
        }
        let h = handle(Tensor::new(rows, cols));
        self.entries.push((name.to_string(), h.clone()));
        Ok(h)
    }

    /// Inserts an existing handle under `name` (used for inter-layer
    /// aliasing, where the handle, not a copy, must be shared).
    pub fn add_handle(&mut self, name: &str, h: TensorHandle) -> Result<(), NnError> {
        if self.position(name).is_some() {
            return Err(NnError::DuplicateKey(name.to_string(), self.display_name.clone()));
        }
        self.entries.push((name.to_string(), h));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<TensorHandle, NnError> {
        self.position(name)
            .map(|i| self.entries[i].1.clone())
            .ok_or_else(|| NnError::MissingKey(name.to_string(), self.display_name.clone()))
    }

    /// Replaces the handle stored under `name` (used to re-establish
    /// aliasing when the layer list changes), leaving insertion order
    /// intact.
    pub fn set(&mut self, name: &str, h: TensorHandle) -> Result<(), NnError> {
        let i = self
            .position(name)
            .ok_or_else(|| NnError::MissingKey(name.to_string(), self.display_name.clone()))?;
        self.entries[i].1 = h;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn set_zero_all(&self) {
        for (_, h) in &self.entries {
            h.borrow_mut().set_all(0.0);
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct BagArchive {
    display_name: String,
    count: usize,
    entries: Vec<(String, Tensor)>,
}

impl Serialize for NamedTensorBag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let archive = BagArchive {
            display_name: self.display_name.clone(),
            count: self.entries.len(),
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.borrow().clone()))
                .collect(),
        };
        archive.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NamedTensorBag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let archive = BagArchive::deserialize(deserializer)?;
        let entries = archive
            .entries
            .into_iter()
            .map(|(k, v)| (k, handle(v)))
            .collect();
        Ok(NamedTensorBag {
            display_name: archive.display_name,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_duplicate_keys() {
        let mut bag = NamedTensorBag::new("state");
        bag.add("x", 2, 2).unwrap();
        assert!(matches!(bag.add("x", 2, 2), Err(NnError::DuplicateKey(..))));
    }

    #[test]
    fn get_missing_key_fails() {
        let bag = NamedTensorBag::new("state");
        assert!(matches!(bag.get("x"), Err(NnError::MissingKey(..))));
    }

    #[test]
    fn keys_preserve_insertion_order() {
        let mut bag = NamedTensorBag::new("params");
        bag.add("W", 1, 1).unwrap();
        bag.add("b", 1, 1).unwrap();
        assert_eq!(bag.keys().collect::<Vec<_>>(), vec!["W", "b"]);
    }

    #[test]
    fn serialization_round_trip_preserves_order_and_values() {
        let mut bag = NamedTensorBag::new("params");
        let w = bag.add("W", 2, 2).unwrap();
        w.borrow_mut().enumerate();
        bag.add("b", 2, 1).unwrap();

        let json = serde_json::to_string(&bag).unwrap();
        let back: NamedTensorBag = serde_json::from_str(&json).unwrap();

        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["W", "b"]);
        assert_eq!(*back.get("W").unwrap().borrow(), *bag.get("W").unwrap().borrow());
    }
}
