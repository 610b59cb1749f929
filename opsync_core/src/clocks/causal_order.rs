use std::cmp;

/// Establishes the causal order between two clocked values.
///
/// This is a form of partial order, but the incomparable case is named
/// "concurrent", since that is what it means for clocks: neither value has
/// observed the other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CausalOrdering {
    /// `a` was observed by `b`, i.e. `a` happened strictly before `b`.
    Before,
    /// `a == b` (the same causal history).
    Equal,
    /// `b` was observed by `a`, i.e. `a` happened strictly after `b`.
    After,
    /// Neither value has observed the other.
    Concurrent,
}
impl CausalOrdering {
    /// Reverses the ordering.
    ///
    /// - `Before` becomes `After`.
    /// - `After` becomes `Before`.
    /// - Everything else stays the same.
    pub const fn reverse(self) -> CausalOrdering {
        match self {
            CausalOrdering::Before => CausalOrdering::After,
            CausalOrdering::After => CausalOrdering::Before,
            _ => self,
        }
    }
}

impl From<cmp::Ordering> for CausalOrdering {
    fn from(value: cmp::Ordering) -> Self {
        match value {
            cmp::Ordering::Less => CausalOrdering::Before,
            cmp::Ordering::Equal => CausalOrdering::Equal,
            cmp::Ordering::Greater => CausalOrdering::After,
        }
    }
}

impl From<CausalOrdering> for Option<cmp::Ordering> {
    fn from(val: CausalOrdering) -> Self {
        match val {
            CausalOrdering::Before => Some(cmp::Ordering::Less),
            CausalOrdering::Equal => Some(cmp::Ordering::Equal),
            CausalOrdering::After => Some(cmp::Ordering::Greater),
            CausalOrdering::Concurrent => None,
        }
    }
}

/// Trait for types that can establish a [causal order](CausalOrdering).
///
/// This is a form of partial order, so the same rules as [[PartialOrd]] apply,
/// except that incomparable values are reported as concurrent.
pub trait CausalOrd<Rhs = Self>: PartialEq<Rhs>
where
    Rhs: ?Sized,
{
    fn causal_cmp(&self, other: &Rhs) -> CausalOrdering;

    /// Get something that can be used to compare using [[PartialOrd]] for this instance.
    fn ord(&self) -> CausalPartialOrdWrapper<Self> {
        CausalPartialOrdWrapper(self)
    }
}

/// A wrapper that allows [[CausalOrd]] types to be treated as [[PartialOrd]].
///
/// This is just a workaround for the orphan rules.
pub struct CausalPartialOrdWrapper<'a, T: ?Sized>(&'a T);

impl<T> PartialEq for CausalPartialOrdWrapper<'_, T>
where
    T: CausalOrd + ?Sized,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> PartialOrd for CausalPartialOrdWrapper<'_, T>
where
    T: CausalOrd + ?Sized,
{
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        self.0.causal_cmp(other.0).into()
    }
}
