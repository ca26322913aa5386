//! Co-occurrence window and the two sliding structures that enforce it
//! while a phrase is streamed left to right.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::token::Token;

/// Maximum position distance (exclusive) at which two words co-occur.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowRepr", into = "WindowRepr")]
pub enum Window {
    Bounded(u32),
    #[default]
    Unbounded,
}

impl Window {
    /// Build a bounded window. A zero-width window could never admit a pair.
    pub fn bounded(size: u32) -> Result<Self, CoreError> {
        if size == 0 {
            return Err(CoreError::Config("window size must be at least 1".into()));
        }
        Ok(Window::Bounded(size))
    }

    /// Strict test: a word exactly `size` positions away is out of reach.
    pub fn contains(&self, distance: usize) -> bool {
        match self {
            Window::Bounded(size) => distance < *size as usize,
            Window::Unbounded => true,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Bounded(size) => write!(f, "{size}"),
            Window::Unbounded => write!(f, "inf"),
        }
    }
}

impl FromStr for Window {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "inf" | "unbounded" => Ok(Window::Unbounded),
            other => other
                .parse::<u32>()
                .map_err(|e| CoreError::Config(format!("invalid window '{other}': {e}")))
                .and_then(Window::bounded),
        }
    }
}

/// Accepts `window = 50` as well as `window = "inf"` in config files.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WindowRepr {
    Size(u32),
    Name(String),
}

impl TryFrom<WindowRepr> for Window {
    type Error = CoreError;

    fn try_from(repr: WindowRepr) -> Result<Self, Self::Error> {
        match repr {
            WindowRepr::Size(size) => Window::bounded(size),
            WindowRepr::Name(name) => name.parse(),
        }
    }
}

impl From<Window> for WindowRepr {
    fn from(window: Window) -> Self {
        match window {
            Window::Bounded(size) => WindowRepr::Size(size),
            Window::Unbounded => WindowRepr::Name("inf".into()),
        }
    }
}

/// FIFO of words already seen in the current phrase. A target found later
/// looks back over it to pick up the words that preceded it.
#[derive(Debug)]
pub struct RecentWords {
    window: Window,
    queue: VecDeque<Token>,
}

impl RecentWords {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            queue: VecDeque::new(),
        }
    }

    /// Drop words that are out of reach of `position`.
    pub fn prune(&mut self, position: usize) {
        while let Some(head) = self.queue.front() {
            if self.window.contains(position - head.position) {
                break;
            }
            self.queue.pop_front();
        }
    }

    pub fn push(&mut self, token: Token) {
        self.prune(token.position);
        self.queue.push_back(token);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Targets whose forward reach covers the next words of the phrase.
/// Each target keeps only its most recent position.
#[derive(Debug)]
pub struct ActiveTargets {
    window: Window,
    targets: HashMap<String, usize>,
}

impl ActiveTargets {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            targets: HashMap::new(),
        }
    }

    pub fn place(&mut self, target: &Token) {
        self.targets.insert(target.word.clone(), target.position);
    }

    /// Expire targets out of reach of `position` and return the rest.
    pub fn in_reach(&mut self, position: usize) -> impl Iterator<Item = &str> {
        let window = self.window;
        self.targets
            .retain(|_, placed| window.contains(position - *placed));
        self.targets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
