use std::fmt;

/// Recyclable integer handle pool.
///
/// Fresh handles come from a monotonically increasing counter starting at 1; released handles
/// are reused LIFO before the counter advances again. `0` is never handed out because GL
/// reserves it for "unbound".
#[derive(Clone, Default)]
pub struct IdPool {
    next: u32,
    free: Vec<u32>,
    live: Vec<bool>,
}

impl IdPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `n` handles.
    pub fn generate(&mut self, n: usize) -> Vec<u32> {
        (0..n).map(|_| self.allocate()).collect()
    }

    /// Allocate a single handle.
    pub fn allocate(&mut self) -> u32 {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.next += 1;
                self.next
            }
        };
        let idx = id as usize;
        if self.live.len() <= idx {
            self.live.resize(idx + 1, false);
        }
        self.live[idx] = true;
        id
    }

    /// Return `id` to the pool. Unknown, already-released and zero handles are ignored.
    ///
    /// The caller must already have freed any native objects owned by the handle.
    pub fn release(&mut self, id: u32) -> bool {
        if !self.is_live(id) {
            return false;
        }
        self.live[id as usize] = false;
        self.free.push(id);
        true
    }

    pub fn is_live(&self, id: u32) -> bool {
        id != 0 && self.live.get(id as usize).copied().unwrap_or(false)
    }

    /// Number of handles currently handed out.
    pub fn live_count(&self) -> usize {
        self.next as usize - self.free.len()
    }
}

impl fmt::Debug for IdPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdPool")
            .field("next", &self.next)
            .field("free", &self.free.len())
            .field("live", &self.live_count())
            .finish()
    }
}
