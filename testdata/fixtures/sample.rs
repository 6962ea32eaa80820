use std::collections::HashMap;

/// A key-value store.
pub struct Store {
    items: HashMap<String, u32>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<u32> {
        if key.is_empty() {
            return None;
        }
        self.items.get(key).copied()
    }
}

fn helper(x: u32) -> u32 {
    match x {
        0 => 1,
        _ => x,
    }
}
