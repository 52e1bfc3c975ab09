use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};

use super::{EventId, Transport, TransportEvent};
use crate::{Result, Ticks};

/// Where a child transport is mounted on its parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedOptions {
    pub time: Ticks,
    pub duration: Ticks,
    #[serde(default)]
    pub row: i32,
}

impl Transport {
    /// Mounts `child` on `parent` as a single event. While the event sounds,
    /// every parent tick drives the child with the tick translated into the
    /// child's own coordinates, so one pattern can be placed many times.
    ///
    /// The child's clock is never consulted; it only lends its schedule and
    /// tempo curve.
    pub fn embed_in(
        child: &Rc<RefCell<Transport>>,
        parent: &mut Transport,
        options: EmbedOptions,
    ) -> Result<EventId> {
        let on_start = Rc::clone(child);
        let on_mid_start = Rc::clone(child);
        let on_tick = Rc::clone(child);
        let on_end = Rc::clone(child);

        let event = TransportEvent::new(options.time, options.duration)
            .with_row(options.row)
            .on_start(move |_, _| with_child(&on_start, Transport::mark_first_tick))
            .on_mid_start(move |_, _| with_child(&on_mid_start, Transport::mark_first_tick))
            .on_tick(move |_, info| {
                let ticks = info.ticks.saturating_sub(info.event.time);
                with_child(&on_tick, |child| child.process_tick(info.seconds, ticks, true));
            })
            .on_end(move |_, info| with_child(&on_end, |child| child.flush_active(info.seconds)));

        let id = parent.schedule(event)?;
        tracing::debug!(?id, time = options.time, duration = options.duration, "transport embedded");
        Ok(id)
    }
}

fn with_child(child: &Rc<RefCell<Transport>>, f: impl FnOnce(&mut Transport)) {
    match child.try_borrow_mut() {
        Ok(mut child) => f(&mut child),
        Err(_) => tracing::warn!("embedded transport is already borrowed, skipping"),
    }
}
