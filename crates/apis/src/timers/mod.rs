use std::cell::RefCell;
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};
use jsbridge::{JSContextRef, JSValue};

use crate::{APIConfig, JSApiSet};

/// Global holding the callbacks and arguments of pending timers by id.
const REGISTRY: &str = "__jsbridge_timers";

/// Timer entry in the timer queue
#[derive(Debug)]
struct Timer {
    id: u32,
    deadline: u64, // milliseconds on the clock of the queue
}

impl Timer {
    fn key(&self) -> (u64, u32) {
        (self.deadline, self.id)
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse order for min-heap behavior; ids break ties in registration
        // order.
        other.key().cmp(&self.key())
    }
}

#[derive(Debug)]
struct TimerQueue {
    timers: BinaryHeap<Timer>,
    next_id: u32,
}

impl TimerQueue {
    fn new() -> Self {
        Self {
            timers: BinaryHeap::new(),
            next_id: 1,
        }
    }

    fn add_timer(&mut self, deadline: u64) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.push(Timer { id, deadline });
        id
    }

    fn remove_timer(&mut self, timer_id: u32) -> bool {
        let original_len = self.timers.len();
        self.timers.retain(|timer| timer.id != timer_id);
        self.timers.len() != original_len
    }

    /// Pops the earliest timer due at `now` that was registered before `before`.
    fn pop_expired(&mut self, now: u64, before: u32) -> Option<Timer> {
        let timer = self.timers.peek()?;
        if timer.deadline <= now && timer.id < before {
            self.timers.pop()
        } else {
            None
        }
    }
}

type Clock = dyn Fn() -> u64;

/// A scheduler backing `setTimeout`, `setImmediate` and `clearTimeout`.
///
/// Nothing fires on its own: the embedder drives the queue by calling
/// [`Timers::run_expired`]. Clones share the same queue, which serves the
/// single runtime it is registered with. The callbacks stay inside that
/// runtime; the queue only orders their ids.
///
/// ```
/// use jsbridge::{Config, Runtime};
/// use jsbridge_apis::{APIConfig, RuntimeExt, Timers};
///
/// let timers = Timers::new();
/// let mut api_config = APIConfig::default();
/// api_config.timers(timers.clone());
/// let runtime = Runtime::new_with_apis(Config::default(), api_config)?;
///
/// runtime.with(|cx| {
///     cx.eval("var ran = false; setImmediate(() => { ran = true; });")?;
///     assert!(timers.has_pending());
///     assert_eq!(1, timers.run_expired(&cx)?);
///     assert_eq!(Some(true), cx.eval("ran")?.as_bool());
///     Ok::<_, anyhow::Error>(())
/// })?;
/// assert!(!timers.has_pending());
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Clone)]
pub struct Timers {
    queue: Rc<RefCell<TimerQueue>>,
    clock: Rc<Clock>,
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("queue", &self.queue.borrow())
            .finish_non_exhaustive()
    }
}

impl Timers {
    /// A scheduler on the system clock, in milliseconds since the UNIX epoch.
    pub fn new() -> Self {
        Self::with_clock(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis() as u64)
                .unwrap_or_default()
        })
    }

    /// A scheduler reading the current time in milliseconds from `clock`.
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> u64 + 'static,
    {
        Self {
            queue: Rc::new(RefCell::new(TimerQueue::new())),
            clock: Rc::new(clock),
        }
    }

    /// Schedules `callback` to be called with `args` after `delay_ms`.
    pub fn set_timeout<'js>(
        &self,
        context: &JSContextRef<'js>,
        callback: JSValue<'js>,
        delay_ms: u64,
        args: Vec<JSValue<'js>>,
    ) -> Result<u32> {
        let registry = registry(context)?;
        let entry = context.array_value()?;
        entry.append_property(callback)?;
        for arg in args {
            entry.append_property(arg)?;
        }

        let deadline = (self.clock)().saturating_add(delay_ms);
        let id = self.queue.borrow_mut().add_timer(deadline);
        registry.set_property(&id.to_string(), entry)?;
        tracing::debug!(id, deadline, "timer scheduled");
        Ok(id)
    }

    /// Cancels a timer. Returns whether it was still pending.
    pub fn clear_timeout(&self, context: &JSContextRef<'_>, id: u32) -> Result<bool> {
        let removed = self.queue.borrow_mut().remove_timer(id);
        if removed {
            registry(context)?.delete_property(&id.to_string())?;
            tracing::debug!(id, "timer cleared");
        }
        Ok(removed)
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().timers.is_empty()
    }

    /// The deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.borrow().timers.peek().map(|timer| timer.deadline)
    }

    /// Calls every timer that is due, earliest deadline first, and returns
    /// how many ran.
    ///
    /// Timers scheduled by the callbacks wait for the next call. A failing
    /// callback stops the run; the timers after it stay queued.
    pub fn run_expired(&self, context: &JSContextRef<'_>) -> Result<usize> {
        let now = (self.clock)();
        let before = self.queue.borrow().next_id;
        let registry = registry(context)?;
        let mut fired = 0;

        loop {
            // The queue must not be borrowed while a callback runs.
            let Some(timer) = self.queue.borrow_mut().pop_expired(now, before) else {
                break;
            };
            let key = timer.id.to_string();
            let entry = registry.get_property(&key)?;
            registry.delete_property(&key)?;
            let Some(len) = entry.count() else {
                tracing::warn!(id = timer.id, "timer has no registered callback");
                continue;
            };

            tracing::debug!(id = timer.id, deadline = timer.deadline, "timer fired");
            let callback = entry.get_indexed_property(0)?;
            let args = (1..len)
                .map(|index| entry.get_indexed_property(index))
                .collect::<Result<Vec<_>>>()?;
            callback.call(context, &context.undefined_value(), &args)?;
            fired += 1;
        }

        Ok(fired)
    }

    fn install(&self, context: &JSContextRef<'_>) -> Result<()> {
        let global = context.global_object();
        if global.get_property(REGISTRY)?.is_undefined() {
            context.eval(&format!(
                "Object.defineProperty(globalThis, '{REGISTRY}', {{ value: {{}} }});"
            ))?;
        }

        let timers = self.clone();
        global.set_property(
            "setTimeout",
            context.wrap_callback(move |cx, _this, args| {
                let (callback, rest) = timer_callback("setTimeout", args)?;
                let (delay, rest) = match rest.split_first() {
                    Some((delay, rest)) => (delay_ms(delay), rest),
                    None => (0, rest),
                };
                let id = timers.set_timeout(cx, callback, delay, rest.to_vec())?;
                Ok(cx.value_from_f64(f64::from(id)))
            })?,
        )?;

        let timers = self.clone();
        global.set_property(
            "setImmediate",
            context.wrap_callback(move |cx, _this, args| {
                let (callback, rest) = timer_callback("setImmediate", args)?;
                let id = timers.set_timeout(cx, callback, 0, rest.to_vec())?;
                Ok(cx.value_from_f64(f64::from(id)))
            })?,
        )?;

        let timers = self.clone();
        global.set_property(
            "clearTimeout",
            context.wrap_callback(move |cx, _this, args| {
                if let Some(id) = args.first().and_then(JSValue::as_f64) {
                    if id.fract() == 0.0 && id >= 1.0 && id <= f64::from(u32::MAX) {
                        timers.clear_timeout(cx, id as u32)?;
                    }
                }
                Ok(cx.undefined_value())
            })?,
        )?;

        Ok(())
    }
}

impl JSApiSet for Timers {
    fn register<'js>(&self, context: &JSContextRef<'js>, _config: &APIConfig) -> Result<()> {
        self.install(context)
    }
}

fn registry<'js>(context: &JSContextRef<'js>) -> Result<JSValue<'js>> {
    let registry = context.global_object().get_property(REGISTRY)?;
    if !registry.is_object() {
        bail!("timers are not installed in this context");
    }
    Ok(registry)
}

fn timer_callback<'a, 'js>(
    name: &str,
    args: &'a [JSValue<'js>],
) -> Result<(JSValue<'js>, &'a [JSValue<'js>])> {
    match args.split_first() {
        Some((callback, rest)) if callback.is_function() => Ok((callback.clone(), rest)),
        Some(_) => bail!("{name} requires a function as its first argument"),
        None => bail!("{name} requires at least 1 argument"),
    }
}

// Negative, non-finite and non-numeric delays mean "as soon as possible".
fn delay_ms(delay: &JSValue<'_>) -> u64 {
    match delay.as_f64() {
        Some(ms) if ms.is_finite() && ms > 0.0 => ms as u64,
        _ => 0,
    }
}
