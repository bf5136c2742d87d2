/// Number of categories tracked by [`CycleProfile`].
const CYCLE_CATEGORY_COUNT: usize = 6;

/// Instruction categories for cycle profiling.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum CycleCategory {
    /// `num`, `mov`
    DataMove = 0,
    /// Jumps, calls and returns.
    ControlFlow = 1,
    /// Stack frame and push/pop.
    Stack = 2,
    /// Direct and register-indirect memory access.
    Memory = 3,
    /// Arithmetic, shifts and 16-bit counters.
    Arithmetic = 4,
    Halt = 5,
}

impl CycleCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CycleCategory::DataMove => "Data Move",
            CycleCategory::ControlFlow => "Control Flow",
            CycleCategory::Stack => "Stack",
            CycleCategory::Memory => "Memory",
            CycleCategory::Arithmetic => "Arithmetic",
            CycleCategory::Halt => "Halt",
        }
    }

    /// All categories in discriminant order.
    const ALL: [CycleCategory; CYCLE_CATEGORY_COUNT] = [
        CycleCategory::DataMove,
        CycleCategory::ControlFlow,
        CycleCategory::Stack,
        CycleCategory::Memory,
        CycleCategory::Arithmetic,
        CycleCategory::Halt,
    ];
}

/// Executed-cycle counts per instruction category.
///
/// Backed by a flat array indexed by [`CycleCategory`] discriminant so the
/// fetch loop only pays for one add per instruction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CycleProfile {
    counts: [u64; CYCLE_CATEGORY_COUNT],
}

impl CycleProfile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn add(&mut self, category: CycleCategory, amount: u64) {
        let slot = &mut self.counts[category as usize];
        *slot = slot.saturating_add(amount);
    }

    pub fn get(&self, category: CycleCategory) -> u64 {
        self.counts[category as usize]
    }

    /// Total cycles across all categories.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    /// Iterates categories with their counts, in discriminant order.
    pub fn iter(&self) -> impl Iterator<Item = (CycleCategory, u64)> {
        CycleCategory::ALL.into_iter().zip(self.counts)
    }
}
