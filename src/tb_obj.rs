use std::sync::{Arc, Mutex, MutexGuard};

// TbObj lets test objects (scoreboard logs, coverage, mailboxes) be shared between Tasks.
// The simulation runs on a single thread, so a lock is never contended: a failing
// try_lock means a borrow is still alive across an await point, which is a bug.
pub struct TbObj<T>(Arc<Mutex<T>>);

impl<T> TbObj<T> {
    pub fn new(data: T) -> TbObj<T> {
        TbObj(Arc::new(Mutex::new(data)))
    }
    pub fn get(&self) -> MutexGuard<T> {
        match (*self.0).try_lock() {
            Ok(guard) => guard,
            Err(_) => panic!("TbObj is already borrowed"),
        }
    }
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.get())
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get())
    }
}

impl<T: Clone> TbObj<T> {
    pub fn snapshot(&self) -> T {
        self.get().clone()
    }
}

impl<T> Clone for TbObj<T> {
    fn clone(&self) -> Self {
        TbObj(self.0.clone())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for TbObj<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_lock() {
            Ok(inner) => f.debug_tuple("TbObj").field(&*inner).finish(),
            Err(_) => f.write_str("TbObj(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = TbObj::new(1u32);
        let b = a.clone();
        b.with_mut(|v| *v += 1);
        assert_eq!(a.snapshot(), 2);
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn nested_borrow_panics() {
        let a = TbObj::new(0u32);
        let _guard = a.get();
        let _again = a.get();
    }
}
