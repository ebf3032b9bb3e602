pub mod notify;

pub use notify::{LogNotifier, Notifier};
