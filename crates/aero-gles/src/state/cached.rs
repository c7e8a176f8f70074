/// A descriptor paired with the native object built from it.
///
/// Mutations go through [`Cached::update`], which invalidates the native object only when the
/// descriptor really changed. [`Cached::ensure_built`] hands the stale object (if any) to the
/// build closure so it can be released before the replacement is created; there is exactly one
/// owner of each native object.
#[derive(Clone, Debug)]
pub struct Cached<D, H> {
    desc: D,
    native: Option<H>,
    stale: Option<H>,
}

impl<D: Default, H> Default for Cached<D, H> {
    fn default() -> Self {
        Self::new(D::default())
    }
}

impl<D, H> Cached<D, H> {
    pub fn new(desc: D) -> Self {
        Self {
            desc,
            native: None,
            stale: None,
        }
    }

    pub fn desc(&self) -> &D {
        &self.desc
    }

    /// The built object, if it is still current.
    pub fn native(&self) -> Option<&H> {
        self.native.as_ref()
    }

    pub fn is_built(&self) -> bool {
        self.native.is_some()
    }

    /// Mark the native object out of date; it is released by the next `ensure_built`.
    pub fn invalidate(&mut self) {
        if let Some(old) = self.native.take() {
            // An earlier stale object can only exist if it was never rebuilt in between, and
            // `native` is always `None` in that case.
            debug_assert!(self.stale.is_none());
            self.stale = Some(old);
        }
    }

    /// Release everything owned by this cell, for teardown.
    pub fn take_all(&mut self) -> impl Iterator<Item = H> {
        self.native.take().into_iter().chain(self.stale.take())
    }
}

impl<D: PartialEq, H> Cached<D, H> {
    /// Apply `f` to the descriptor, invalidating the native object if anything changed.
    ///
    /// Returns whether the descriptor changed.
    pub fn update(&mut self, f: impl FnOnce(&mut D)) -> bool
    where
        D: Clone,
    {
        let before = self.desc.clone();
        f(&mut self.desc);
        let changed = before != self.desc;
        if changed {
            self.invalidate();
        }
        changed
    }
}

impl<D, H: Clone> Cached<D, H> {
    /// Return the native object, building it first if it is missing or invalidated.
    ///
    /// `build` receives the descriptor and the stale object that must be released.
    pub fn ensure_built<E>(
        &mut self,
        build: impl FnOnce(&D, Option<H>) -> Result<H, E>,
    ) -> Result<H, E> {
        if let Some(native) = &self.native {
            return Ok(native.clone());
        }
        let stale = self.stale.take();
        let native = build(&self.desc, stale)?;
        self.native = Some(native.clone());
        Ok(native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_updates_keep_the_native_object() {
        let mut cell: Cached<u32, u32> = Cached::new(1);
        let built = cell.ensure_built::<()>(|d, stale| {
            assert!(stale.is_none());
            Ok(*d * 10)
        });
        assert_eq!(built, Ok(10));

        assert!(!cell.update(|d| *d = 1));
        assert_eq!(cell.native(), Some(&10));
    }

    #[test]
    fn changed_updates_hand_back_the_stale_object() {
        let mut cell: Cached<u32, u32> = Cached::new(1);
        cell.ensure_built::<()>(|d, _| Ok(*d)).unwrap();
        assert!(cell.update(|d| *d = 2));
        assert!(!cell.is_built());

        let mut released = None;
        let built = cell.ensure_built::<()>(|d, stale| {
            released = stale;
            Ok(*d + 100)
        });
        assert_eq!(built, Ok(102));
        assert_eq!(released, Some(1));
    }

    #[test]
    fn failed_builds_stay_invalidated() {
        let mut cell: Cached<u32, u32> = Cached::new(3);
        assert_eq!(cell.ensure_built(|_, _| Err("boom")), Err("boom"));
        assert!(!cell.is_built());
        assert_eq!(cell.ensure_built::<()>(|d, _| Ok(*d)), Ok(3));
    }

    #[test]
    fn take_all_drains_current_and_stale() {
        let mut cell: Cached<u32, u32> = Cached::new(0);
        cell.ensure_built::<()>(|_, _| Ok(7)).unwrap();
        cell.invalidate();
        let drained: Vec<u32> = cell.take_all().collect();
        assert_eq!(drained, vec![7]);
        assert!(cell.take_all().next().is_none());
    }
}
