/// Token returned when subscribing; hand it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(pub(crate) u64);

/// Minimal typed publish/subscribe channel.
pub struct Emitter<A> {
    listeners: Vec<(Subscription, Box<dyn FnMut(&A)>)>,
}

impl<A> Default for Emitter<A> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<A> Emitter<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, id: Subscription, listener: impl FnMut(&A) + 'static) {
        self.listeners.push((id, Box::new(listener)));
    }

    pub fn unsubscribe(&mut self, id: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(candidate, _)| *candidate != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, arg: &A) {
        for (_, listener) in &mut self.listeners {
            listener(arg);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<A> std::fmt::Debug for Emitter<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
