use hashbrown::HashMap;

use crate::gl::GLuint;

/// Handle → descriptor map for one resource kind.
///
/// Lookups of unknown handles return `None`; callers treat that as "silently ignore the call".
/// Removing an entry hands the descriptor back so the caller can release the native objects it
/// owns before the handle is recycled.
#[derive(Debug)]
pub struct Registry<T> {
    entries: HashMap<GLuint, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: GLuint, value: T) -> &mut T {
        self.entries.entry(handle).insert(value).into_mut()
    }

    pub fn get(&self, handle: GLuint) -> Option<&T> {
        if handle == 0 {
            return None;
        }
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: GLuint) -> Option<&mut T> {
        if handle == 0 {
            return None;
        }
        self.entries.get_mut(&handle)
    }

    pub fn contains(&self, handle: GLuint) -> bool {
        handle != 0 && self.entries.contains_key(&handle)
    }

    pub fn remove(&mut self, handle: GLuint) -> Option<T> {
        self.entries.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GLuint, &T)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (GLuint, &mut T)> {
        self.entries.iter_mut().map(|(k, v)| (*k, v))
    }
}

impl<T: Default> Registry<T> {
    /// Register `handle` with a default descriptor, replacing any stale entry.
    pub fn create(&mut self, handle: GLuint) -> &mut T {
        self.insert(handle, T::default())
    }
}
