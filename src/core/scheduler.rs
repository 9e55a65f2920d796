/// Host-driven timers: the autoplay tick and the typewriter reveal.
///
/// Nothing here sleeps or spawns. The host passes its monotonic time in
/// milliseconds and each timer answers whether it is due.

/// Identifies one scheduled run of a timer. A cancelled or restarted timer
/// gets a new handle, so a stale handle never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
pub struct RepeatingTimer {
    interval_ms: u64,
    next_due: Option<u64>,
    handle: Option<TimerHandle>,
    generation: u64,
}

impl RepeatingTimer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            next_due: None,
            handle: None,
            generation: 0,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Start the timer. Returns `None` if it is already running.
    pub fn start(&mut self, now_ms: u64) -> Option<TimerHandle> {
        if self.handle.is_some() {
            return None;
        }
        self.generation += 1;
        let handle = TimerHandle(self.generation);
        self.handle = Some(handle);
        self.next_due = Some(now_ms.saturating_add(self.interval_ms));
        Some(handle)
    }

    pub fn cancel(&mut self) {
        self.handle = None;
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<TimerHandle> {
        self.handle
    }

    /// Whether the timer fires at `now_ms`. Missed intervals collapse into
    /// a single firing.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.next_due {
            Some(due) if now_ms >= due => {
                self.next_due = Some(now_ms.saturating_add(self.interval_ms));
                true
            }
            _ => false,
        }
    }
}

/// Reveals a line of text one character per `char_ms`.
#[derive(Debug, Clone)]
pub struct Typewriter {
    char_ms: u64,
    text: String,
    started_at: u64,
    done: bool,
}

impl Typewriter {
    pub fn new(char_ms: u64) -> Self {
        Self {
            char_ms: char_ms.max(1),
            text: String::new(),
            started_at: 0,
            done: true,
        }
    }

    /// Begin revealing `text`, replacing any line still in progress.
    pub fn start(&mut self, text: &str, now_ms: u64) {
        self.text = text.to_string();
        self.started_at = now_ms;
        self.done = text.is_empty();
    }

    /// The revealed prefix at `now_ms`, always cut on a char boundary.
    pub fn visible(&mut self, now_ms: u64) -> &str {
        if self.done {
            return &self.text;
        }
        let shown = (now_ms.saturating_sub(self.started_at) / self.char_ms) as usize;
        match self.text.char_indices().nth(shown) {
            Some((end, _)) => &self.text[..end],
            None => {
                self.done = true;
                &self.text
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Show the whole line at once.
    pub fn finish(&mut self) {
        self.done = true;
    }

    /// Drop the current line entirely.
    pub fn cancel(&mut self) {
        self.text.clear();
        self.done = true;
    }
}
