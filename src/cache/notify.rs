//! Broadcast signals the cache raises on every mutation.

use tokio::sync::broadcast;

/// Signals emitted by the cache. They carry no payload beyond "something
/// changed"; listeners re-inspect the cache to decide what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSignal {
  /// Unsaved work appeared, or a save attempt failed and needs retrying.
  Dirty,
  /// The set of pending assets changed; views should refresh.
  AssetUpdate,
}

/// Fan-out notifier shared between the cache and its listeners.
///
/// `emit` is a sync call and drops signals when nobody is subscribed, so the
/// cache can notify unconditionally. Each subscriber gets an independent
/// receiver.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
  tx: broadcast::Sender<CacheSignal>,
}

impl ChangeNotifier {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(64);
    Self { tx }
  }

  /// Subscribe to all future cache signals.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheSignal> {
    self.tx.subscribe()
  }

  /// Broadcast a signal to every subscriber.
  pub fn emit(&self, signal: CacheSignal) {
    let _ = self.tx.send(signal);
  }
}

impl Default for ChangeNotifier {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn emit_without_subscribers_does_not_panic() {
    let notifier = ChangeNotifier::new();
    notifier.emit(CacheSignal::Dirty);
  }

  #[tokio::test]
  async fn subscribers_see_signals_in_order() {
    let notifier = ChangeNotifier::new();
    let mut rx = notifier.subscribe();

    notifier.emit(CacheSignal::Dirty);
    notifier.emit(CacheSignal::AssetUpdate);

    assert_eq!(rx.recv().await.unwrap(), CacheSignal::Dirty);
    assert_eq!(rx.recv().await.unwrap(), CacheSignal::AssetUpdate);
  }

  #[tokio::test]
  async fn clones_share_the_channel() {
    let notifier = ChangeNotifier::new();
    let clone = notifier.clone();
    let mut rx = notifier.subscribe();

    clone.emit(CacheSignal::AssetUpdate);

    assert_eq!(rx.recv().await.unwrap(), CacheSignal::AssetUpdate);
  }
}
