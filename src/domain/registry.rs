use crate::domain::models::PeripheralId;

/// Peripherals connected to before, most recently connected last.
///
/// Identifiers are never removed. Recording an identifier that is already
/// present moves it to the end instead of duplicating it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownPeripheralRegistry {
    ids: Vec<PeripheralId>,
}

impl KnownPeripheralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: &PeripheralId) {
        if let Some(pos) = self.ids.iter().position(|known| known == id) {
            let existing = self.ids.remove(pos);
            self.ids.push(existing);
        } else {
            self.ids.push(id.clone());
        }
    }

    /// Candidate for a direct reconnect.
    pub fn most_recent(&self) -> Option<&PeripheralId> {
        self.ids.last()
    }

    pub fn contains(&self, id: &PeripheralId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeripheralId> {
        self.ids.iter()
    }
}

impl<S: AsRef<str>> FromIterator<S> for KnownPeripheralRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut registry = Self::new();
        for id in iter {
            registry.record(&PeripheralId::new(id.as_ref()));
        }
        registry
    }
}
