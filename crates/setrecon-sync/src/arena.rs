//! Owning element storage addressed by stable indices.

use setrecon_core::Element;

/// Slots freed by removal are reused by later insertions.
#[derive(Debug, Clone, Default)]
pub(crate) struct ElementArena {
    slots: Vec<Option<Element>>,
    free: Vec<usize>,
    len: usize,
}

impl ElementArena {
    pub fn insert(&mut self, element: Element) -> usize {
        self.len += 1;
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(element);
                idx
            }
            None => {
                self.slots.push(Some(element));
                self.slots.len() - 1
            }
        }
    }

    pub fn remove(&mut self, idx: usize) -> Option<Element> {
        let element = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        self.len -= 1;
        Some(element)
    }

    pub fn get(&self, idx: usize) -> Option<&Element> {
        self.slots.get(idx)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.len
    }
}
