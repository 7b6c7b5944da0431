/// Longest digest the miner produces (SHA-256 as hex)
pub const MAX_LEADING: usize = 64;

/// Leading-character checker for hex block hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    leading: usize,
    ch: char,
}

impl Target {
    /// Create a target requiring `leading` copies of `ch` at the start of a hash.
    /// Lengths beyond a full digest are capped.
    pub fn new(leading: usize, ch: char) -> Self {
        Self {
            leading: leading.min(MAX_LEADING),
            ch,
        }
    }

    /// Target for a (possibly fractional or drifting) difficulty value.
    /// Only the integer part counts; negative or NaN difficulty means no requirement.
    pub fn from_difficulty(difficulty: f64) -> Self {
        let leading = if difficulty.is_finite() && difficulty > 0.0 {
            difficulty.floor() as usize
        } else if difficulty == f64::INFINITY {
            MAX_LEADING
        } else {
            0
        };
        Self::new(leading, '0')
    }

    /// Check if the given hex hash starts with the required characters
    #[inline(always)]
    pub fn matches(&self, hash: &str) -> bool {
        let mut chars = hash.chars();
        for _ in 0..self.leading {
            match chars.next() {
                Some(c) if c == self.ch => {}
                _ => return false,
            }
        }
        true
    }

    /// Get the difficulty (number of leading characters to match)
    pub fn difficulty(&self) -> usize {
        self.leading
    }

    pub fn target_char(&self) -> char {
        self.ch
    }

    /// Estimate attempts needed (average case)
    pub fn estimated_attempts(&self) -> u64 {
        // Each hex char = 16 possibilities
        16u64.saturating_pow(self.leading as u32)
    }
}
