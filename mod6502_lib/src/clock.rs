/*
 * Clock
 * capability view over the per-instruction cycle counter. The engine zeroes
 * the counter on every dispatch exit, so value() reports the cost of the
 * instruction currently executing, not a running total. Handlers call take()
 * to account for their own cost; implicit memory accesses add one each.
 */
pub trait Clock {
    fn value(&self) -> usize;
    fn take(&mut self, cycles: usize);
}
