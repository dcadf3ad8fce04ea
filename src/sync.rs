pub type Mutex<T> = ::tokio::sync::Mutex<T>;
pub type MutexGuard<'a, T> = ::tokio::sync::MutexGuard<'a, T>;
