use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::data_structures::{SharedData, UpdateFailure};

/// Mutex-protected counterpart of [`AtomicData`] with the same contract.
///
/// Used as a timing baseline and as a second implementation for the shared
/// test suites. Updates run on a clone which is stored back only when the
/// mutator returns `true`, so a declining or panicking mutator never leaves
/// a partial update behind. Lock poisoning is ignored for the same reason.
///
/// [`AtomicData`]: crate::data_structures::AtomicData
///
pub struct MutexData<T> {
    data: Mutex<T>,
}

impl<T> MutexData<T> {
    pub fn new(value: T) -> Self {
        MutexData {
            data: Mutex::new(value),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> SharedData<T> for MutexData<T> {
    fn read<R, F>(&self, visitor: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        visitor(&*self.lock())
    }

    fn try_update<F>(&self, mut mutator: F) -> Result<(), UpdateFailure>
    where
        F: FnMut(&mut T) -> bool,
    {
        let mut guard = self.lock();
        let mut copy = guard.clone();

        if !mutator(&mut copy) {
            return Err(UpdateFailure::Declined);
        }

        *guard = copy;
        Ok(())
    }
}

impl<T: Default> Default for MutexData<T> {
    fn default() -> Self {
        MutexData::new(T::default())
    }
}

impl<T> From<T> for MutexData<T> {
    fn from(value: T) -> Self {
        MutexData::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for MutexData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutexData").field(&*self.lock()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;

    #[test]
    fn test_declined_update_is_discarded() {
        let data = MutexData::new(vec![1]);

        let result = data.try_update(|value| {
            value.push(2);
            false
        });

        assert_eq!(result, Err(UpdateFailure::Declined));
        assert_eq!(data.load(), vec![1]);
    }

    #[test]
    fn test_panic_does_not_poison_value() {
        let data = MutexData::new(1u32);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            data.update(|value| {
                *value = 100;
                panic!("mutator failure");
            });
        }));
        assert!(result.is_err());

        data.update(|value| {
            *value += 1;
            true
        });
        assert_eq!(data.into_inner(), 2);
    }
}
