use std::{cell::Cell, rc::Rc};

use crate::error::check_time;
use crate::{HostConfig, Result, Transport};

#[derive(Debug, Clone)]
pub struct Context {
    now: Rc<Cell<f64>>,
    sample_rate: u32,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(48_000)
    }
}

impl Context {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(0.0)),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Current host time in seconds.
    pub fn now(&self) -> f64 {
        self.now.get()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration of a single sample in seconds.
    pub fn sample_time(&self) -> f64 {
        1.0 / f64::from(self.sample_rate)
    }

    /// Moves the host time to `seconds`. Only the driver should call this.
    pub fn set_now(&self, seconds: f64) -> Result<()> {
        self.now.set(check_time("host time", seconds)?);
        Ok(())
    }

    /// Moves the host time forward by `delta` seconds and returns the new time.
    pub fn advance(&self, delta: f64) -> Result<f64> {
        let delta = check_time("time step", delta)?;
        let now = self.now() + delta;
        self.now.set(now);
        Ok(now)
    }
}

/// Offline stand-in for an audio renderer: advances time in fixed blocks
/// and lets the engine process after every block.
#[derive(Debug, Clone)]
pub struct OfflineHost {
    context: Context,
    block_size: usize,
}

impl OfflineHost {
    pub fn new(context: Context, block_size: usize) -> Self {
        Self {
            context,
            block_size: block_size.max(1),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(Context::new(config.sample_rate), config.block_size)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Seconds covered by one block.
    pub fn block_duration(&self) -> f64 {
        self.block_size as f64 * self.context.sample_time()
    }

    /// Renders blocks until `seconds` more have elapsed, invoking `render`
    /// after each block. Returns the number of blocks rendered.
    pub fn run_for(&mut self, seconds: f64, mut render: impl FnMut(&Context)) -> Result<usize> {
        let seconds = check_time("render duration", seconds)?;
        let block = self.block_duration();
        let target = self.context.now() + seconds;
        let mut blocks = 0;

        while self.context.now() < target {
            let step = block.min(target - self.context.now());
            self.context.advance(step)?;
            render(&self.context);
            blocks += 1;
        }

        tracing::debug!(blocks, now = self.context.now(), "offline render finished");
        Ok(blocks)
    }

    /// Drives `transport` for `seconds` of host time.
    pub fn drive(&mut self, transport: &mut Transport, seconds: f64) -> Result<usize> {
        self.run_for(seconds, |_| transport.process())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_time() {
        let context = Context::new(100);
        let observer = context.clone();

        context.set_now(1.5).unwrap();
        assert_eq!(observer.now(), 1.5);
        assert_eq!(observer.advance(0.5).unwrap(), 2.0);
        assert_eq!(context.now(), 2.0);
        assert!(context.set_now(-1.0).is_err());
        assert!((context.sample_time() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn offline_host_renders_whole_blocks_and_a_remainder() {
        let mut host = OfflineHost::new(Context::new(1_000), 100);
        let mut seen = Vec::new();

        let blocks = host.run_for(0.25, |ctx| seen.push(ctx.now())).unwrap();
        assert_eq!(blocks, 3);
        assert!((seen[2] - 0.25).abs() < 1e-12);
        assert!(host.run_for(f64::NAN, |_| ()).is_err());
    }
}
