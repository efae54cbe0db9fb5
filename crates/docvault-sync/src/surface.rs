use crate::patch::{PatchOp, Trackable};

/// A positional list a presentation layer renders
pub trait PresentationSurface<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key of the item at `position`, if any.
    fn key_at(&self, position: usize) -> Option<String>;

    fn remove(&mut self, position: usize);

    fn replace(&mut self, position: usize, item: T);

    fn push(&mut self, item: T);

    fn reset(&mut self, items: Vec<T>);

    /// Apply one patch operation.
    fn apply(&mut self, op: PatchOp<T>) {
        match op {
            PatchOp::Remove { position, .. } => self.remove(position),
            PatchOp::Update { position, item, .. } => self.replace(position, item),
            PatchOp::Insert { item, .. } => self.push(item),
            PatchOp::Reset { items } => self.reset(items),
        }
    }
}

/// In-memory surface; also what subscribers mirror patches onto.
#[derive(Debug, Clone, PartialEq)]
pub struct VecSurface<T> {
    items: Vec<T>,
}

impl<T> Default for VecSurface<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> VecSurface<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T: Trackable> PresentationSurface<T> for VecSurface<T> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn key_at(&self, position: usize) -> Option<String> {
        self.items.get(position).and_then(|item| item.key())
    }

    fn remove(&mut self, position: usize) {
        if position < self.items.len() {
            self.items.remove(position);
        }
    }

    fn replace(&mut self, position: usize, item: T) {
        if let Some(slot) = self.items.get_mut(position) {
            *slot = item;
        }
    }

    fn push(&mut self, item: T) {
        self.items.push(item);
    }

    fn reset(&mut self, items: Vec<T>) {
        self.items = items;
    }
}
